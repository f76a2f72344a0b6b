use regex::Regex;

/// The canonical shape of a shared Spotify track link
pub const SPOTIFY_TRACK_PREFIX: &str = "https://open.spotify.com/track/";

/// A reference to a single track found in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    /// The provider's identifier of the track
    pub id: String,
}

impl TrackRef {
    /// Returns the URI form the provider expects when adding tracks
    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.id)
    }
}

/// A playlist key as it was sent, without the leading `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistKey {
    literal: String,
    normalized: String,
}

impl PlaylistKey {
    pub fn new(literal: &str) -> Self {
        Self {
            literal: literal.to_string(),
            normalized: literal.to_lowercase(),
        }
    }

    /// The lowercased key, used for lookups
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// The key exactly as the sender typed it
    pub fn literal(&self) -> &str {
        &self.literal
    }
}

/// Everything of interest in an inbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// In order of appearance, duplicates included
    pub track_refs: Vec<TrackRef>,
    pub playlist_key: Option<PlaylistKey>,
}

impl ParsedMessage {
    /// Returns true if the message has nothing to act upon
    pub fn is_empty(&self) -> bool {
        self.track_refs.is_empty() && self.playlist_key.is_none()
    }
}

/// Extracts track links and playlist keys from text messages
#[derive(Debug, Clone)]
pub struct MessageParser {
    track_link: Regex,
}

impl MessageParser {
    /// Creates a parser for track links starting with the given prefix
    pub fn new(track_prefix: &str) -> Self {
        let pattern = format!(r"{}([^\s?]+)", regex::escape(track_prefix));

        Self {
            track_link: Regex::new(&pattern).expect("escaped prefix is a valid pattern"),
        }
    }

    pub fn parse(&self, text: &str) -> ParsedMessage {
        ParsedMessage {
            track_refs: self.track_refs(text),
            playlist_key: Self::playlist_key(text),
        }
    }

    fn track_refs(&self, text: &str) -> Vec<TrackRef> {
        self.track_link
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| TrackRef {
                id: m.as_str().to_string(),
            })
            .collect()
    }

    /// Only the first `#token` counts
    fn playlist_key(text: &str) -> Option<PlaylistKey> {
        text.split_whitespace()
            .filter_map(|word| word.strip_prefix('#'))
            .find(|key| !key.is_empty())
            .map(PlaylistKey::new)
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(SPOTIFY_TRACK_PREFIX)
    }
}
