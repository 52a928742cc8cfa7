//! Projection of the raw player response onto [`CurrentTrack`].

use crate::api::{ImageRef, PlaybackItem, PlaybackResponse, TrackItem};
use nowplaying_core::{CurrentTrack, TrackImage};

/// Map a player response to the display snapshot.
///
/// Anything that is not a track (nothing playing, episodes, ads, unknown
/// item types) becomes [`CurrentTrack::NONE`].
#[must_use]
pub fn project(playback: Option<&PlaybackResponse>) -> CurrentTrack {
    let Some(playback) = playback else {
        return CurrentTrack::NONE;
    };

    match &playback.item {
        Some(PlaybackItem::Track(track)) => project_track(playback, track),
        Some(PlaybackItem::Episode(_) | PlaybackItem::Unsupported) | None => CurrentTrack::NONE,
    }
}

fn project_track(playback: &PlaybackResponse, track: &TrackItem) -> CurrentTrack {
    let (album_name, image) = track.album.as_ref().map_or_else(
        || (String::new(), TrackImage::NONE),
        |album| {
            (
                album.name.clone(),
                album.images.first().map_or(TrackImage::NONE, project_image),
            )
        },
    );

    CurrentTrack {
        album_name,
        track_name: track.name.clone(),
        artists: track.artists.iter().map(|a| a.name.clone()).collect(),
        image,
        // A negative length would read as the idle snapshot
        track_length_ms: track.duration_ms.max(0),
        track_position_ms: playback.progress_ms.unwrap_or(-1),
        is_playing: playback.is_playing,
        track_id: track.id.clone().unwrap_or_default(),
        track_url: track
            .external_urls
            .get("spotify")
            .cloned()
            .unwrap_or_default(),
    }
}

fn project_image(image: &ImageRef) -> TrackImage {
    TrackImage {
        url: image.url.clone(),
        width: image.width.unwrap_or(-1),
        height: image.height.unwrap_or(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::TRACK_JSON;

    fn parse(json: &str) -> PlaybackResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_absent_snapshot_is_default() {
        assert_eq!(project(None), CurrentTrack::NONE);
    }

    #[test]
    fn test_track_projection() {
        let track = project(Some(&parse(TRACK_JSON)));

        assert_eq!(track.track_name, "Never Gonna Give You Up");
        assert_eq!(track.album_name, "Whenever You Need Somebody");
        assert_eq!(track.artists, vec!["Rick Astley".to_string()]);
        assert_eq!(track.track_length_ms, 213_573);
        assert_eq!(track.track_position_ms, 42_000);
        assert!(track.is_playing);
        assert_eq!(track.track_id, "4uLU6hMCjMI75M1A2tKUQC");
        assert_eq!(
            track.track_url,
            "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC"
        );
        assert_eq!(
            track.image,
            TrackImage {
                url: "https://i.scdn.co/image/large".into(),
                width: 640,
                height: 640,
            }
        );
        assert!(!track.is_none());
    }

    #[test]
    fn test_episode_is_default() {
        let track = project(Some(&parse(
            r#"{"is_playing":true,"progress_ms":1000,"currently_playing_type":"episode",
                "item":{"type":"episode","id":"e1","name":"Some Podcast","duration_ms":3600000}}"#,
        )));
        assert_eq!(track, CurrentTrack::NONE);
        assert_eq!(track.track_length_ms, -1);
    }

    #[test]
    fn test_missing_item_is_default() {
        let track = project(Some(&parse(
            r#"{"is_playing":true,"currently_playing_type":"ad","item":null}"#,
        )));
        assert!(track.is_none());
    }

    #[test]
    fn test_empty_image_set_uses_placeholder() {
        let track = project(Some(&parse(
            r#"{"is_playing":false,"progress_ms":0,
                "item":{"type":"track","id":"t1","name":"Local File","duration_ms":120000,
                        "album":{"name":"","images":[]},"artists":[]}}"#,
        )));
        assert_eq!(track.image, TrackImage::NONE);
        assert_eq!(track.image.url, "");
        assert_eq!(track.image.width, -1);
        assert_eq!(track.track_length_ms, 120_000);
        assert!(track.artists.is_empty());
        assert_eq!(track.track_url, "");
    }

    #[test]
    fn test_unknown_position_and_dimensions() {
        let track = project(Some(&parse(
            r#"{"is_playing":true,
                "item":{"type":"track","name":"T","duration_ms":1000,
                        "album":{"name":"A","images":[{"url":"u"}]}}}"#,
        )));
        assert_eq!(track.track_position_ms, -1);
        assert_eq!(track.image.width, -1);
        assert_eq!(track.image.height, -1);
        assert_eq!(track.track_id, "");
    }

    #[test]
    fn test_projections_are_independent() {
        let playing = project(Some(&parse(TRACK_JSON)));
        let idle = project(None);
        assert!(!playing.is_none());
        assert_eq!(idle, CurrentTrack::NONE);
        assert!(idle.track_name.is_empty());
    }
}
