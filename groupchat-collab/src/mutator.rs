use log::{info, warn};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

use crate::{
    DatabaseError, GatewayError, NewTrackAttribution, PlaylistData, SharedDatabase, TokenGateway,
    TrackRef,
};

/// Adds tracks to playlists on the provider, using the owner's credentials
pub struct PlaylistMutator {
    db: SharedDatabase,
    gateway: Arc<TokenGateway>,
}

impl PlaylistMutator {
    pub fn new(db: &SharedDatabase, gateway: &Arc<TokenGateway>) -> Self {
        Self {
            db: db.clone(),
            gateway: gateway.clone(),
        }
    }

    /// Submits every track to the playlist, returning how many were added.
    /// A track that fails does not stop the ones after it, unless the owner's token cannot be refreshed.
    /// Failing to persist a refreshed token is an error.
    pub async fn add_tracks(
        &self,
        playlist: &PlaylistData,
        track_refs: &[TrackRef],
        attributed_to: &str,
    ) -> Result<usize, DatabaseError> {
        let mut owner = self.db.host_by_id(&playlist.owner_id).await?;
        let mut added = 0;

        for track in track_refs {
            let body = json!({ "uris": [track.uri()] });

            let result = self
                .gateway
                .call(&mut owner, Method::POST, &playlist.endpoint, Some(&body))
                .await;

            match result {
                Ok(_) => {}
                Err(GatewayError::Db(error)) => return Err(error),
                // The owner's credentials are unusable, so every remaining track would fail too
                Err(error @ (GatewayError::Refresh(_) | GatewayError::MissingRefreshToken)) => {
                    warn!(
                        "Giving up on playlist {} after track {}: {}",
                        playlist.id, track.id, error
                    );
                    break;
                }
                Err(error) => {
                    warn!(
                        "Failed to add track {} to playlist {}: {}",
                        track.id, playlist.id, error
                    );
                    continue;
                }
            }

            added += 1;

            let attribution = NewTrackAttribution {
                playlist_id: playlist.id.clone(),
                track_id: track.id.clone(),
                added_by: attributed_to.to_string(),
            };

            if let Err(error) = self.db.record_attribution(attribution).await {
                warn!("Failed to record attribution of track {}: {}", track.id, error);
            }
        }

        info!(
            "Added {}/{} tracks to playlist {}",
            added,
            track_refs.len(),
            playlist.id
        );

        Ok(added)
    }
}
