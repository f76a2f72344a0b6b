use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;
pub type SharedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    /// Turns a unique violation into a conflict error
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult<T> {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;

    /// Turns a not found error into None
    fn optional(self) -> Result<Option<T>>;
}

impl<T> DatabaseResult<T> for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(DatabaseError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can fetch groupchat data from a database
#[async_trait]
pub trait Database: Send + Sync {
    /// Finds whoever owns a phone number, hosts take precedence over guests
    async fn identity_by_phone(&self, phone_number: &str) -> Result<Identity>;
    async fn create_guest(&self, phone_number: &str) -> Result<GuestData>;
    async fn update_active_playlist(
        &self,
        identity: &Identity,
        playlist_id: Option<&str>,
    ) -> Result<()>;

    async fn host_by_id(&self, host_id: &str) -> Result<HostData>;
    /// Creates the host, or refreshes its profile and tokens if it already exists
    async fn upsert_host(&self, new_host: NewHost) -> Result<HostData>;
    async fn update_host_tokens(&self, updated_tokens: UpdatedTokens) -> Result<()>;
    /// Gives a host a phone number, absorbing any guest that already had it
    async fn link_host_phone(&self, host_id: &str, phone_number: &str) -> Result<HostData>;

    async fn playlist_by_id(&self, playlist_id: &str) -> Result<PlaylistData>;
    async fn playlist_by_key(&self, key: &str) -> Result<PlaylistData>;
    /// Lists the playlists of a host, most recent first
    async fn list_playlists(&self, owner_id: &str) -> Result<Vec<PlaylistData>>;
    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData>;
    /// Deletes a playlist and clears it as the active playlist of every guest and host
    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;

    async fn record_attribution(&self, new_attribution: NewTrackAttribution) -> Result<()>;
    async fn list_attributions(&self, playlist_id: &str) -> Result<Vec<TrackAttributionData>>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;
}

#[derive(Debug)]
pub struct NewHost {
    pub id: HostId,
    pub display_name: String,
    pub email: Option<String>,
    pub url: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug)]
pub struct UpdatedTokens {
    pub host_id: HostId,
    pub access_token: String,
    /// Only replaces the stored refresh token if the provider rotated it
    pub refresh_token: Option<String>,
}

#[derive(Debug)]
pub struct NewPlaylist {
    pub id: PlaylistId,
    pub title: String,
    /// Must already be lowercased
    pub key: String,
    pub url: String,
    pub endpoint: String,
    pub owner_id: HostId,
}

#[derive(Debug)]
pub struct NewTrackAttribution {
    pub playlist_id: PlaylistId,
    pub track_id: String,
    /// The phone number that sent the track
    pub added_by: String,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub host_id: HostId,
    pub expires_at: DateTime<Utc>,
}
