use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    Database, DatabaseError, GuestData, HostData, Identity, NewHost, NewPlaylist,
    NewSession, NewTrackAttribution, PlaylistData, Result, SessionData, TrackAttributionData,
    UpdatedTokens,
};

/// An in-memory database, used when no database url is configured and in tests.
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    hosts: HashMap<String, HostData>,
    guests: HashMap<String, GuestData>,
    /// Kept in insertion order
    playlists: Vec<PlaylistData>,
    attributions: Vec<TrackAttributionData>,
    sessions: Vec<SessionRecord>,
    next_id: i32,
}

struct SessionRecord {
    id: i32,
    new_session: NewSession,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn host(&self, host_id: &str) -> Result<&HostData> {
        self.hosts.get(host_id).ok_or(DatabaseError::NotFound {
            resource: "host",
            identifier: "id",
        })
    }

    fn host_mut(&mut self, host_id: &str) -> Result<&mut HostData> {
        self.hosts.get_mut(host_id).ok_or(DatabaseError::NotFound {
            resource: "host",
            identifier: "id",
        })
    }

    fn playlist(&self, predicate: impl Fn(&PlaylistData) -> bool) -> Option<&PlaylistData> {
        self.playlists.iter().find(|p| predicate(p))
    }

    /// The session with its host joined in, if the token exists
    fn session(&self, token: &str) -> Option<Result<SessionData>> {
        let record = self.sessions.iter().find(|s| s.new_session.token == token)?;

        let session = self.host(&record.new_session.host_id).map(|host| SessionData {
            id: record.id,
            token: record.new_session.token.clone(),
            expires_at: record.new_session.expires_at,
            host: host.clone(),
        });

        Some(session)
    }
}

fn conflict(resource: &'static str, field: &'static str, value: &str) -> DatabaseError {
    DatabaseError::Conflict {
        resource,
        field,
        value: value.to_string(),
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with an internal error, simulating an outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst)
    }

    fn state(&self) -> Result<parking_lot::MutexGuard<'_, MemoryState>> {
        if self.unavailable.load(Ordering::SeqCst) {
            let error = io::Error::new(io::ErrorKind::NotConnected, "database is unavailable");
            return Err(DatabaseError::Internal(Box::new(error)));
        }

        Ok(self.state.lock())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn identity_by_phone(&self, phone_number: &str) -> Result<Identity> {
        let state = self.state()?;

        let host = state
            .hosts
            .values()
            .find(|h| h.phone_number.as_deref() == Some(phone_number));

        if let Some(host) = host {
            return Ok(Identity::Host(host.clone()));
        }

        state
            .guests
            .get(phone_number)
            .cloned()
            .map(Identity::Guest)
            .ok_or(DatabaseError::NotFound {
                resource: "guest",
                identifier: "phone_number",
            })
    }

    async fn create_guest(&self, phone_number: &str) -> Result<GuestData> {
        let mut state = self.state()?;

        if state.guests.contains_key(phone_number) {
            return Err(conflict("guest", "phone_number", phone_number));
        }

        let guest = GuestData {
            phone_number: phone_number.to_string(),
            active_playlist_id: None,
        };

        state.guests.insert(phone_number.to_string(), guest.clone());
        Ok(guest)
    }

    async fn update_active_playlist(
        &self,
        identity: &Identity,
        playlist_id: Option<&str>,
    ) -> Result<()> {
        let mut state = self.state()?;
        let playlist_id = playlist_id.map(str::to_string);

        match identity {
            Identity::Guest(guest) => {
                let stored = state.guests.get_mut(&guest.phone_number).ok_or(
                    DatabaseError::NotFound {
                        resource: "guest",
                        identifier: "phone_number",
                    },
                )?;
                stored.active_playlist_id = playlist_id;
            }
            Identity::Host(host) => {
                state.host_mut(&host.id)?.active_playlist_id = playlist_id;
            }
        }

        Ok(())
    }

    async fn host_by_id(&self, host_id: &str) -> Result<HostData> {
        self.state()?.host(host_id).cloned()
    }

    async fn upsert_host(&self, new_host: NewHost) -> Result<HostData> {
        let mut state = self.state()?;

        let host = match state.hosts.get_mut(&new_host.id) {
            Some(existing) => {
                existing.display_name = new_host.display_name;
                existing.email = new_host.email;
                existing.url = new_host.url;
                existing.access_token = new_host.access_token;
                if new_host.refresh_token.is_some() {
                    existing.refresh_token = new_host.refresh_token;
                }
                existing.clone()
            }
            None => {
                let host = HostData {
                    id: new_host.id,
                    display_name: new_host.display_name,
                    email: new_host.email,
                    url: new_host.url,
                    phone_number: None,
                    access_token: new_host.access_token,
                    refresh_token: new_host.refresh_token,
                    active_playlist_id: None,
                };
                state.hosts.insert(host.id.clone(), host.clone());
                host
            }
        };

        Ok(host)
    }

    async fn update_host_tokens(&self, updated_tokens: UpdatedTokens) -> Result<()> {
        let mut state = self.state()?;
        let host = state.host_mut(&updated_tokens.host_id)?;

        host.access_token = updated_tokens.access_token;
        if updated_tokens.refresh_token.is_some() {
            host.refresh_token = updated_tokens.refresh_token;
        }

        Ok(())
    }

    async fn link_host_phone(&self, host_id: &str, phone_number: &str) -> Result<HostData> {
        let mut state = self.state()?;
        state.host(host_id)?;

        let taken = state
            .hosts
            .values()
            .any(|h| h.id != host_id && h.phone_number.as_deref() == Some(phone_number));

        if taken {
            return Err(DatabaseError::Conflict {
                resource: "host",
                field: "phone_number",
                value: phone_number.to_string(),
            });
        }

        let guest = state.guests.remove(phone_number);
        let host = state.host_mut(host_id)?;

        if let Some(guest) = guest {
            host.active_playlist_id = guest.active_playlist_id;
        }

        host.phone_number = Some(phone_number.to_string());
        Ok(host.clone())
    }

    async fn playlist_by_id(&self, playlist_id: &str) -> Result<PlaylistData> {
        self.state()?
            .playlist(|p| p.id == playlist_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "id",
            })
    }

    async fn playlist_by_key(&self, key: &str) -> Result<PlaylistData> {
        let key = key.to_lowercase();

        self.state()?
            .playlist(|p| p.key == key)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "key",
            })
    }

    async fn list_playlists(&self, owner_id: &str) -> Result<Vec<PlaylistData>> {
        let state = self.state()?;

        Ok(state
            .playlists
            .iter()
            .rev()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData> {
        let key = new_playlist.key.to_lowercase();
        let mut state = self.state()?;

        if state.playlist(|p| p.key == key).is_some() {
            return Err(conflict("playlist", "key", &key));
        }

        if state.playlist(|p| p.id == new_playlist.id).is_some() {
            return Err(conflict("playlist", "id", &new_playlist.id));
        }

        state.host(&new_playlist.owner_id)?;

        let playlist = PlaylistData {
            id: new_playlist.id,
            title: new_playlist.title,
            key,
            url: new_playlist.url,
            endpoint: new_playlist.endpoint,
            owner_id: new_playlist.owner_id,
        };

        state.playlists.push(playlist.clone());
        Ok(playlist)
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let mut state = self.state()?;

        let index = state
            .playlists
            .iter()
            .position(|p| p.id == playlist_id)
            .ok_or(DatabaseError::NotFound {
                resource: "playlist",
                identifier: "id",
            })?;

        for guest in state.guests.values_mut() {
            if guest.active_playlist_id.as_deref() == Some(playlist_id) {
                guest.active_playlist_id = None;
            }
        }

        for host in state.hosts.values_mut() {
            if host.active_playlist_id.as_deref() == Some(playlist_id) {
                host.active_playlist_id = None;
            }
        }

        state.playlists.remove(index);
        Ok(())
    }

    async fn record_attribution(&self, new_attribution: NewTrackAttribution) -> Result<()> {
        let mut state = self.state()?;
        let id = state.next_id();

        state.attributions.push(TrackAttributionData {
            id,
            playlist_id: new_attribution.playlist_id,
            track_id: new_attribution.track_id,
            added_by: new_attribution.added_by,
            added_at: Utc::now(),
        });

        Ok(())
    }

    async fn list_attributions(&self, playlist_id: &str) -> Result<Vec<TrackAttributionData>> {
        let state = self.state()?;

        Ok(state
            .attributions
            .iter()
            .filter(|a| a.playlist_id == playlist_id)
            .cloned()
            .collect())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.state()?
            .session(token)
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })?
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut state = self.state()?;

        if state.session(&new_session.token).is_some() {
            return Err(conflict("session", "token", &new_session.token));
        }

        state.host(&new_session.host_id)?;

        let token = new_session.token.clone();
        let id = state.next_id();
        state.sessions.push(SessionRecord { id, new_session });

        state.session(&token).ok_or(DatabaseError::NotFound {
            resource: "session",
            identifier: "token",
        })?
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state()?;
        let before = state.sessions.len();

        state.sessions.retain(|s| s.new_session.token != token);

        match state.sessions.len() == before {
            true => Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            }),
            false => Ok(()),
        }
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state()?
            .sessions
            .retain(|s| s.new_session.expires_at > now);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_host(id: &str) -> NewHost {
        NewHost {
            id: id.to_string(),
            display_name: "djobrad".to_string(),
            email: None,
            url: format!("https://open.spotify.com/user/{id}"),
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
        }
    }

    fn new_playlist(id: &str, key: &str, owner_id: &str) -> NewPlaylist {
        NewPlaylist {
            id: id.to_string(),
            title: "Road Trip".to_string(),
            key: key.to_string(),
            url: format!("https://open.spotify.com/playlist/{id}"),
            endpoint: format!("https://api.spotify.com/v1/playlists/{id}/tracks"),
            owner_id: owner_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_host_takes_precedence_over_guest() {
        let db = MemoryDatabase::new();
        db.upsert_host(new_host("host")).await.unwrap();
        db.create_guest("+15550001").await.unwrap();

        assert!(matches!(
            db.identity_by_phone("+15550001").await.unwrap(),
            Identity::Guest(_)
        ));

        db.link_host_phone("host", "+15550001").await.unwrap();

        assert!(db.identity_by_phone("+15550001").await.unwrap().is_host());
    }

    #[tokio::test]
    async fn test_linking_phone_absorbs_guest() {
        let db = MemoryDatabase::new();
        db.upsert_host(new_host("host")).await.unwrap();
        db.create_playlist(new_playlist("p1", "bops", "host"))
            .await
            .unwrap();

        let guest = db.create_guest("+15550001").await.unwrap();
        db.update_active_playlist(&Identity::Guest(guest), Some("p1"))
            .await
            .unwrap();

        let host = db.link_host_phone("host", "+15550001").await.unwrap();

        assert_eq!(host.active_playlist_id.as_deref(), Some("p1"));
        assert_eq!(host.phone_number.as_deref(), Some("+15550001"));

        // The guest record is gone, a new guest with that number would be a duplicate
        let identity = db.identity_by_phone("+15550001").await.unwrap();
        assert!(identity.is_host());
    }

    #[tokio::test]
    async fn test_phone_already_linked_to_other_host() {
        let db = MemoryDatabase::new();
        db.upsert_host(new_host("a")).await.unwrap();
        db.upsert_host(new_host("b")).await.unwrap();
        db.link_host_phone("a", "+15550001").await.unwrap();

        let result = db.link_host_phone("b", "+15550001").await;
        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_keys_are_unique_and_case_insensitive() {
        let db = MemoryDatabase::new();
        db.upsert_host(new_host("host")).await.unwrap();
        db.create_playlist(new_playlist("p1", "Bops", "host"))
            .await
            .unwrap();

        let found = db.playlist_by_key("BOPS").await.unwrap();
        assert_eq!(found.id, "p1");
        assert_eq!(found.key, "bops");

        let result = db.create_playlist(new_playlist("p2", "bops", "host")).await;
        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_deleting_playlist_clears_references() {
        let db = MemoryDatabase::new();
        db.upsert_host(new_host("host")).await.unwrap();
        db.create_playlist(new_playlist("p1", "bops", "host"))
            .await
            .unwrap();
        db.link_host_phone("host", "+15550000").await.unwrap();

        let guest = db.create_guest("+15550001").await.unwrap();
        db.update_active_playlist(&Identity::Guest(guest), Some("p1"))
            .await
            .unwrap();

        let host = db.host_by_id("host").await.unwrap();
        db.update_active_playlist(&Identity::Host(host), Some("p1"))
            .await
            .unwrap();

        db.delete_playlist("p1").await.unwrap();

        let guest = db.identity_by_phone("+15550001").await.unwrap();
        let host = db.identity_by_phone("+15550000").await.unwrap();

        assert_eq!(guest.active_playlist_id(), None);
        assert_eq!(host.active_playlist_id(), None);
        assert!(db.playlist_by_id("p1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_playlists_are_listed_most_recent_first() {
        let db = MemoryDatabase::new();
        db.upsert_host(new_host("host")).await.unwrap();
        db.upsert_host(new_host("other")).await.unwrap();

        for (id, key, owner) in [("p1", "one", "host"), ("p2", "two", "other"), ("p3", "three", "host")] {
            db.create_playlist(new_playlist(id, key, owner)).await.unwrap();
        }

        let ids: Vec<_> = db
            .list_playlists("host")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();

        assert_eq!(ids, vec!["p3", "p1"]);
    }

    #[tokio::test]
    async fn test_unavailable_database_fails() {
        let db = MemoryDatabase::new();
        db.set_unavailable(true);

        let result = db.create_guest("+15550001").await;
        assert!(matches!(result, Err(DatabaseError::Internal(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_claim_key_once() {
        let db = std::sync::Arc::new(MemoryDatabase::new());
        db.upsert_host(new_host("host")).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = db.clone();
                let id = format!("p{}", i);
                tokio::spawn(async move {
                    db.create_playlist(new_playlist(&id, "bops", "host")).await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(error) => {
                    assert!(matches!(error, DatabaseError::Conflict { field: "key", .. }))
                }
            }
        }

        assert_eq!(created, 1);
        assert_eq!(db.list_playlists("host").await.unwrap().len(), 1);
    }
}
