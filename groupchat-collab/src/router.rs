use log::{debug, info, warn};
use std::sync::Arc;

use crate::{
    DatabaseError, DatabaseResult, Identity, MessageParser, Notification, PlaylistId,
    PlaylistMutator, SharedDatabase, SharedNotifier, TrackRef,
};

/// What happened to the key in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The sender's active playlist is now this one
    Accepted { playlist_id: PlaylistId },
    /// No playlist has the key, the active playlist was left alone
    Unknown { literal: String },
}

/// What happened to the tracks in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Submitted {
        playlist_id: PlaylistId,
        added: usize,
        attempted: usize,
    },
    /// The sender was asked for a key instead
    NoActivePlaylist,
}

/// The result of routing one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The message had no key and no tracks
    Ignored,
    Handled {
        key: Option<KeyOutcome>,
        tracks: Option<TrackOutcome>,
        /// Replies that could not be delivered
        undelivered: usize,
    },
}

/// Routes inbound text messages to playlists.
///
/// A sender is either without an active playlist, or has one. Sending a valid
/// key selects a playlist, sending tracks adds them to the selected one. Both
/// can happen in a single message, in that order.
pub struct SessionRouter {
    db: SharedDatabase,
    notifier: SharedNotifier,
    parser: MessageParser,
    mutator: Arc<PlaylistMutator>,
}

impl SessionRouter {
    pub fn new(
        db: &SharedDatabase,
        notifier: &SharedNotifier,
        parser: MessageParser,
        mutator: &Arc<PlaylistMutator>,
    ) -> Self {
        Self {
            db: db.clone(),
            notifier: notifier.clone(),
            parser,
            mutator: mutator.clone(),
        }
    }

    /// Handles a message from a phone number.
    /// Only persistence failures are errors, everything else is answered with a reply.
    pub async fn handle(
        &self,
        phone_number: &str,
        text: &str,
    ) -> Result<RouteOutcome, DatabaseError> {
        let parsed = self.parser.parse(text);

        if parsed.is_empty() {
            debug!("Ignoring message from {}", phone_number);
            return Ok(RouteOutcome::Ignored);
        }

        let mut identity = self.resolve_identity(phone_number).await?;
        let mut undelivered = 0;

        let key = match &parsed.playlist_key {
            Some(key) => {
                let playlist = self.db.playlist_by_key(key.as_str()).await.optional()?;

                let (outcome, notification) = match playlist {
                    Some(playlist) => {
                        self.db
                            .update_active_playlist(&identity, Some(&playlist.id))
                            .await?;
                        identity.set_active_playlist_id(Some(playlist.id.clone()));

                        let role = match identity.is_host() {
                            true => "Host",
                            false => "Guest",
                        };
                        info!("{} {} selected playlist {}", role, phone_number, playlist.id);

                        (
                            KeyOutcome::Accepted {
                                playlist_id: playlist.id.clone(),
                            },
                            Notification::key_accepted(&playlist),
                        )
                    }
                    None => (
                        KeyOutcome::Unknown {
                            literal: key.literal().to_string(),
                        },
                        Notification::InvalidKey {
                            literal: key.literal().to_string(),
                        },
                    ),
                };

                undelivered += self.notify(phone_number, notification).await;
                Some(outcome)
            }
            None => None,
        };

        let tracks = match parsed.track_refs.is_empty() {
            true => None,
            false => {
                let (outcome, failed) = self
                    .submit_tracks(&identity, phone_number, &parsed.track_refs)
                    .await?;

                undelivered += failed;
                Some(outcome)
            }
        };

        Ok(RouteOutcome::Handled {
            key,
            tracks,
            undelivered,
        })
    }

    /// Finds the host or guest behind the number, creating a guest if there is none
    async fn resolve_identity(&self, phone_number: &str) -> Result<Identity, DatabaseError> {
        if let Some(identity) = self.db.identity_by_phone(phone_number).await.optional()? {
            return Ok(identity);
        }

        info!("New guest {}", phone_number);

        match self.db.create_guest(phone_number).await {
            Ok(guest) => Ok(Identity::Guest(guest)),
            // Another message from the same number got there first
            Err(DatabaseError::Conflict { .. }) => self.db.identity_by_phone(phone_number).await,
            Err(e) => Err(e),
        }
    }

    async fn submit_tracks(
        &self,
        identity: &Identity,
        phone_number: &str,
        track_refs: &[TrackRef],
    ) -> Result<(TrackOutcome, usize), DatabaseError> {
        let playlist = match identity.active_playlist_id() {
            Some(id) => self.db.playlist_by_id(id).await.optional()?,
            None => None,
        };

        let Some(playlist) = playlist else {
            let failed = self.notify(phone_number, Notification::AskForKey).await;
            return Ok((TrackOutcome::NoActivePlaylist, failed));
        };

        let added = self
            .mutator
            .add_tracks(&playlist, track_refs, phone_number)
            .await?;

        let outcome = TrackOutcome::Submitted {
            playlist_id: playlist.id,
            added,
            attempted: track_refs.len(),
        };

        Ok((outcome, 0))
    }

    /// Sends a reply, returning 1 if it could not be delivered
    async fn notify(&self, phone_number: &str, notification: Notification) -> usize {
        match self
            .notifier
            .send(phone_number, &notification.to_string())
            .await
        {
            Ok(_) => 0,
            Err(error) => {
                warn!("Failed to notify {}: {}", phone_number, error);
                1
            }
        }
    }
}
