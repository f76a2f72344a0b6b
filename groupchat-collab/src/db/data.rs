use chrono::{DateTime, Utc};

/// The provider's identifier of a playlist, used as its primary key.
pub type PlaylistId = String;

/// The provider's account identifier of a host, used as its primary key.
pub type HostId = String;

/// Anyone who has texted the shared number.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GuestData {
    pub phone_number: String,
    /// The playlist that tracks from this number are added to
    pub active_playlist_id: Option<PlaylistId>,
}

/// A person who authorized their music account and owns playlists
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct HostData {
    pub id: HostId,
    pub display_name: String,
    pub email: Option<String>,
    /// Link to the host's profile on the provider
    pub url: String,
    /// Hosts register their phone after authorizing, so this starts out empty
    pub phone_number: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub active_playlist_id: Option<PlaylistId>,
}

/// Whoever is behind a phone number.
/// Hosts and guests share the phone number namespace, a host is a guest with extra capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Guest(GuestData),
    Host(HostData),
}

impl Identity {
    pub fn active_playlist_id(&self) -> Option<&str> {
        match self {
            Identity::Guest(guest) => guest.active_playlist_id.as_deref(),
            Identity::Host(host) => host.active_playlist_id.as_deref(),
        }
    }

    pub fn set_active_playlist_id(&mut self, playlist_id: Option<PlaylistId>) {
        match self {
            Identity::Guest(guest) => guest.active_playlist_id = playlist_id,
            Identity::Host(host) => host.active_playlist_id = playlist_id,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Identity::Host(_))
    }
}

/// A playlist on the provider that guests can add tracks to
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PlaylistData {
    pub id: PlaylistId,
    pub title: String,
    /// Lowercased, unique across all playlists
    pub key: String,
    /// Public link to the playlist
    pub url: String,
    /// Where tracks are submitted to
    pub endpoint: String,
    pub owner_id: HostId,
}

/// Who caused a track to be added to which playlist
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TrackAttributionData {
    pub id: i32,
    pub playlist_id: PlaylistId,
    pub track_id: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

/// Login session data for a host
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: i32,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The host that is logged in
    pub host: HostData,
}
