use serde::{Deserialize, Serialize};

/// Placeholder the host reports when a track has no title
pub const UNKNOWN_SONG: &str = "Unknown Song";
/// Placeholder the host reports when a track has no artist
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Shown when the host player has no now-playing item at all
pub const NO_SONG_PLAYING: &str = "No song playing";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
}

impl TrackInfo {
    /// Build a track from whatever the host surfaced, falling back to the
    /// unknown placeholders for missing fields
    pub fn from_host(title: Option<String>, artist: Option<String>) -> Self {
        Self {
            title: title.unwrap_or_else(|| UNKNOWN_SONG.to_string()),
            artist: artist.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        }
    }

    /// True when either field is still the host's placeholder
    pub fn is_placeholder(&self) -> bool {
        self.title == UNKNOWN_SONG || self.artist == UNKNOWN_ARTIST
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Interrupted,
    SeekingForward,
    SeekingBackward,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }
}

/// Body of the outbound report. Field order is part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub song: String,
    pub artist: String,
}

impl ReportPayload {
    pub fn new(song: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            song: song.into(),
            artist: artist.into(),
        }
    }
}

impl From<&TrackInfo> for ReportPayload {
    fn from(track: &TrackInfo) -> Self {
        Self::new(track.title.clone(), track.artist.clone())
    }
}

/// Messages emitted by the media source, one JSON object per line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceMessage {
    NowPlaying {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        artist: Option<String>,
    },
    NothingPlaying,
    PlaybackState {
        state: PlaybackState,
    },
    Status {
        state: String,
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        message: String,
    },
}
