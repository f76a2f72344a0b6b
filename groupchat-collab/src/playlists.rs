use log::{info, warn};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::PLAYLIST_KEY_REGEX, DatabaseError, DatabaseResult, ExternalUrls, GatewayError, HostData,
    Identity, NewPlaylist, Notification, PlaylistData, SharedDatabase, SharedNotifier,
    TokenGateway,
};

/// Lets hosts manage the playlists guests add tracks to
pub struct PlaylistManager {
    db: SharedDatabase,
    gateway: Arc<TokenGateway>,
    notifier: SharedNotifier,
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("Key must be 3 to 12 letters, digits or one of . @ + - _ without spaces")]
    InvalidKey(String),
    #[error("Title cannot be empty")]
    InvalidTitle,
    #[error("Key #{0} is already taken")]
    KeyTaken(String),
    #[error("You cannot change that playlist")]
    NotOwner,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// The parts of a newly created provider playlist groupchat stores
#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
    href: String,
    external_urls: ExternalUrls,
}

impl PlaylistManager {
    pub fn new(
        db: &SharedDatabase,
        gateway: &Arc<TokenGateway>,
        notifier: &SharedNotifier,
    ) -> Self {
        Self {
            db: db.clone(),
            gateway: gateway.clone(),
            notifier: notifier.clone(),
        }
    }

    /// Lists the host's playlists, most recent first
    pub async fn list(&self, host_id: &str) -> Result<Vec<PlaylistData>, DatabaseError> {
        self.db.list_playlists(host_id).await
    }

    /// Creates a playlist on the host's account and makes it reachable by its key
    pub async fn create(
        &self,
        host: &mut HostData,
        title: &str,
        key: &str,
    ) -> Result<PlaylistData, PlaylistError> {
        let title = title.trim();
        let key = key.trim().to_lowercase();

        if title.is_empty() {
            return Err(PlaylistError::InvalidTitle);
        }

        if !PLAYLIST_KEY_REGEX.is_match(&key) {
            return Err(PlaylistError::InvalidKey(key));
        }

        // Check before the provider call so a taken key leaves no orphan playlist behind
        self.db
            .playlist_by_key(&key)
            .await
            .conflict_or_ok("playlist", "key", &key)
            .map_err(|e| key_taken_or(e, &key))?;

        let endpoint = format!(
            "{}/users/{}/playlists",
            self.gateway.config().api_base,
            host.id
        );
        let body = json!({ "name": title });

        let response = self
            .gateway
            .call(host, Method::POST, &endpoint, Some(&body))
            .await?;

        let created: CreatedPlaylist = serde_json::from_value(response)
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        let playlist = self
            .db
            .create_playlist(NewPlaylist {
                id: created.id,
                title: title.to_string(),
                key: key.clone(),
                url: created.external_urls.spotify,
                endpoint: format!("{}/tracks", created.href),
                owner_id: host.id.clone(),
            })
            .await
            .map_err(|e| key_taken_or(e, &key))?;

        info!("Host {} created playlist #{}", host.id, playlist.key);
        Ok(playlist)
    }

    /// Deletes one of the host's playlists. It stays on the provider, but can no longer be texted to.
    pub async fn delete(&self, host_id: &str, playlist_id: &str) -> Result<(), PlaylistError> {
        let playlist = self.db.playlist_by_id(playlist_id).await?;

        if playlist.owner_id != host_id {
            return Err(PlaylistError::NotOwner);
        }

        self.db.delete_playlist(playlist_id).await?;

        info!("Host {} deleted playlist #{}", host_id, playlist.key);
        Ok(())
    }

    /// Makes a playlist the host's active playlist, and lets them know by text if they have a phone number
    pub async fn activate(
        &self,
        host: &HostData,
        playlist_id: &str,
    ) -> Result<PlaylistData, PlaylistError> {
        let playlist = self.db.playlist_by_id(playlist_id).await?;

        self.db
            .update_active_playlist(&Identity::Host(host.clone()), Some(&playlist.id))
            .await?;

        if let Some(phone_number) = &host.phone_number {
            let text = Notification::key_accepted(&playlist).to_string();

            if let Err(error) = self.notifier.send(phone_number, &text).await {
                warn!("Failed to notify host {}: {}", host.id, error);
            }
        }

        Ok(playlist)
    }
}

fn key_taken_or(error: DatabaseError, key: &str) -> PlaylistError {
    match error {
        DatabaseError::Conflict { field: "key", .. } => PlaylistError::KeyTaken(key.to_string()),
        e => PlaylistError::Db(e),
    }
}
