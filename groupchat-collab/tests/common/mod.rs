//! Shared fixtures for the collab integration tests.
//!
//! The music provider is a wiremock server, the database and notifier live in memory.

#![allow(dead_code)]

use std::sync::Arc;

use groupchat_collab::{
    Collab, Database, HostData, MemoryDatabase, MemoryNotifier, NewHost, NewPlaylist,
    PlaylistData, ProviderConfig,
};
use wiremock::MockServer;

pub const HOST_PHONE: &str = "+12702900802";
pub const GUEST_PHONE: &str = "+4791234567";

pub struct Harness {
    pub server: MockServer,
    pub db: Arc<MemoryDatabase>,
    pub notifier: Arc<MemoryNotifier>,
    pub collab: Collab,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_notifier(MemoryNotifier::new()).await
    }

    pub async fn with_notifier(notifier: MemoryNotifier) -> Self {
        let server = MockServer::start().await;
        let db = Arc::new(MemoryDatabase::new());
        let notifier = Arc::new(notifier);

        let collab = Collab::new(provider_config(&server), db.clone(), notifier.clone())
            .expect("Failed to create collab");

        Self {
            server,
            db,
            notifier,
            collab,
        }
    }

    pub async fn add_host(&self, id: &str) -> HostData {
        self.db
            .upsert_host(NewHost {
                id: id.to_string(),
                display_name: format!("Host {}", id),
                email: None,
                url: format!("https://open.spotify.com/user/{}", id),
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
            })
            .await
            .expect("Failed to create host")
    }

    pub async fn add_playlist(&self, id: &str, key: &str, owner_id: &str) -> PlaylistData {
        self.db
            .create_playlist(NewPlaylist {
                id: id.to_string(),
                title: format!("Playlist {}", id),
                key: key.to_string(),
                url: format!("https://open.spotify.com/playlist/{}", id),
                endpoint: format!("{}/playlists/{}/tracks", self.server.uri(), id),
                owner_id: owner_id.to_string(),
            })
            .await
            .expect("Failed to create playlist")
    }

    /// Every text sent to a phone number so far, oldest first
    pub fn texts_to(&self, phone_number: &str) -> Vec<String> {
        self.notifier
            .sent()
            .into_iter()
            .filter(|m| m.phone_number == phone_number)
            .map(|m| m.text)
            .collect()
    }
}

pub fn provider_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new("client", "secret", "http://localhost:9050/v1/auth/login")
        .with_bases(&server.uri(), &server.uri())
}
