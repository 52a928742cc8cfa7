//! Text rendering of the current snapshot.

use nowplaying_core::{format_clock, CurrentTrack};
use std::fmt::Write;

/// A change worth logging between two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Started,
    TrackChanged,
    Paused,
    Resumed,
    Stopped,
}

/// Remembers the last snapshot shown so only changes are reported.
#[derive(Debug, Default)]
pub struct StatusDisplay {
    last: CurrentTrack,
}

impl StatusDisplay {
    /// Replace the shown snapshot and report what changed.
    pub fn update(&mut self, track: CurrentTrack) -> Option<DisplayEvent> {
        let event = classify(&self.last, &track);
        self.last = track;
        event
    }

    pub fn current(&self) -> &CurrentTrack {
        &self.last
    }

    pub fn status_line(&self) -> String {
        status_line(&self.last)
    }
}

fn classify(previous: &CurrentTrack, next: &CurrentTrack) -> Option<DisplayEvent> {
    match (previous.is_none(), next.is_none()) {
        (true, true) => None,
        (true, false) => Some(DisplayEvent::Started),
        (false, true) => Some(DisplayEvent::Stopped),
        (false, false) => {
            if previous.track_id != next.track_id || previous.track_name != next.track_name {
                Some(DisplayEvent::TrackChanged)
            } else if previous.is_playing && !next.is_playing {
                Some(DisplayEvent::Paused)
            } else if !previous.is_playing && next.is_playing {
                Some(DisplayEvent::Resumed)
            } else {
                None
            }
        }
    }
}

/// One-line summary, e.g. `[playing] Artist - Title (Album) 1:02 / 3:45`.
pub fn status_line(track: &CurrentTrack) -> String {
    if track.is_none() {
        return "Nothing playing".into();
    }

    let marker = if track.is_playing { "playing" } else { "paused" };
    let mut line = format!("[{marker}] ");

    if !track.artists.is_empty() {
        line.push_str(&track.artists_line());
        line.push_str(" - ");
    }
    line.push_str(&track.track_name);
    if !track.album_name.is_empty() {
        let _ = write!(line, " ({})", track.album_name);
    }
    let _ = write!(
        line,
        " {} / {}",
        format_clock(track.track_position_ms),
        format_clock(track.track_length_ms)
    );

    line
}
