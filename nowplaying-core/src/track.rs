//! The display-facing snapshot of what is currently playing.

/// Album art reference.
///
/// Width and height are `-1` when the remote did not report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackImage {
    pub url: String,
    pub width: i32,
    pub height: i32,
}

impl TrackImage {
    /// Placeholder used when a track has no album art.
    pub const NONE: Self = Self {
        url: String::new(),
        width: -1,
        height: -1,
    };
}

impl Default for TrackImage {
    fn default() -> Self {
        Self::NONE
    }
}

/// Snapshot of the track shown on screen.
///
/// Every poll produces a complete, independent value. Consumers branch on
/// [`CurrentTrack::is_none`] (`track_length_ms == -1`) to pick between the
/// track view and the idle view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTrack {
    pub album_name: String,
    pub track_name: String,
    /// Artist names in credit order
    pub artists: Vec<String>,
    pub image: TrackImage,
    /// Track length in milliseconds, `-1` for "no track"
    pub track_length_ms: i64,
    /// Playback position in milliseconds, `-1` when unknown
    pub track_position_ms: i64,
    pub is_playing: bool,
    pub track_id: String,
    pub track_url: String,
}

impl CurrentTrack {
    /// The canonical "nothing to show" snapshot.
    pub const NONE: Self = Self {
        album_name: String::new(),
        track_name: String::new(),
        artists: Vec::new(),
        image: TrackImage::NONE,
        track_length_ms: -1,
        track_position_ms: -1,
        is_playing: false,
        track_id: String::new(),
        track_url: String::new(),
    };

    /// Whether this is the idle snapshot.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.track_length_ms == -1
    }

    /// Artist names joined for a single text line.
    #[must_use]
    pub fn artists_line(&self) -> String {
        self.artists.join(", ")
    }
}

impl Default for CurrentTrack {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_idle() {
        let track = CurrentTrack::NONE;
        assert!(track.is_none());
        assert_eq!(track.track_length_ms, -1);
        assert_eq!(track.track_position_ms, -1);
        assert!(!track.is_playing);
        assert!(track.artists.is_empty());
        assert_eq!(track.image, TrackImage::NONE);
    }

    #[test]
    fn test_default_matches_none() {
        assert_eq!(CurrentTrack::default(), CurrentTrack::NONE);
        assert_eq!(TrackImage::default().width, -1);
    }

    #[test]
    fn test_populated_track_is_not_none() {
        let track = CurrentTrack {
            track_name: "Windowlicker".into(),
            artists: vec!["Aphex Twin".into()],
            track_length_ms: 367_000,
            track_position_ms: 1_000,
            is_playing: true,
            ..CurrentTrack::NONE
        };
        assert!(!track.is_none());
    }

    #[test]
    fn test_artists_line() {
        let track = CurrentTrack {
            artists: vec!["Daft Punk".into(), "Pharrell Williams".into()],
            ..CurrentTrack::NONE
        };
        assert_eq!(track.artists_line(), "Daft Punk, Pharrell Williams");
        assert_eq!(CurrentTrack::NONE.artists_line(), "");
    }
}
