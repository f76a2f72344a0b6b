//! Builds a groupchat server backed by an in-memory database and notifier,
//! with a wiremock server standing in for the music provider.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use groupchat_collab::{
    Collab, Database, HostData, MemoryDatabase, MemoryNotifier, NewHost, NewPlaylist,
    NewSession, ProviderConfig,
};
use groupchat_server::{app, ServerContext};
use tower::util::ServiceExt;
use wiremock::MockServer;

pub const TOKEN: &str = "let-me-in";

pub struct TestApp {
    pub server: MockServer,
    pub db: Arc<MemoryDatabase>,
    pub notifier: Arc<MemoryNotifier>,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let db = Arc::new(MemoryDatabase::new());
        let notifier = Arc::new(MemoryNotifier::new());

        let config = ProviderConfig::new("client", "secret", "http://localhost:9050/v1/auth/login")
            .with_bases(&server.uri(), &server.uri());

        let collab = Collab::new(config, db.clone(), notifier.clone())
            .expect("Failed to create collab");

        Self {
            server,
            db,
            notifier,
            router: app(ServerContext::new(collab)),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Creates a host with a session for [TOKEN]
    pub async fn login(&self, host_id: &str) -> HostData {
        let host = self.add_host(host_id).await;

        self.db
            .create_session(NewSession {
                token: TOKEN.to_string(),
                host_id: host.id.clone(),
                expires_at: Utc::now() + Duration::days(1),
            })
            .await
            .expect("Failed to create session");

        host
    }

    pub async fn add_host(&self, host_id: &str) -> HostData {
        self.db
            .upsert_host(NewHost {
                id: host_id.to_string(),
                display_name: format!("Host {}", host_id),
                email: None,
                url: format!("https://open.spotify.com/user/{}", host_id),
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
            })
            .await
            .expect("Failed to create host")
    }

    pub async fn add_playlist(&self, id: &str, key: &str, owner_id: &str) {
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
            .expect("Failed to create playlist");
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
