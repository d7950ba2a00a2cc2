use std::fmt;

use crate::types::NO_SONG_PLAYING;

/// What the user would see on screen: the last accepted track and whether
/// the host player is currently playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub current_song: String,
    pub current_artist: String,
    pub is_playing: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            current_song: NO_SONG_PLAYING.to_string(),
            current_artist: String::new(),
            is_playing: false,
        }
    }
}

impl DisplayState {
    pub fn show_track(&mut self, song: &str, artist: &str) {
        self.current_song = song.to_string();
        self.current_artist = artist.to_string();
    }

    pub fn clear_track(&mut self) {
        self.current_song = NO_SONG_PLAYING.to_string();
        self.current_artist.clear();
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_playing { "Playing" } else { "Not Playing" };
        if self.current_artist.is_empty() {
            write!(f, "{} [{}]", self.current_song, status)
        } else {
            write!(f, "{} - {} [{}]", self.current_song, self.current_artist, status)
        }
    }
}
