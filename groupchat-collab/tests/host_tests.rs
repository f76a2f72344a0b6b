//! Tests for everything a host does outside of text messages.

mod common;

use common::{Harness, GUEST_PHONE, HOST_PHONE};
use groupchat_collab::{AuthError, Database, DatabaseError, Identity, PlaylistError};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod auth {
    use super::*;

    async fn mount_login(harness: &Harness) {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=let-me-in"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh",
                "refresh_token": "r1",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&harness.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "dj",
                "display_name": "DJ",
                "email": "dj@example.com",
                "external_urls": { "spotify": "https://open.spotify.com/user/dj" }
            })))
            .mount(&harness.server)
            .await;
    }

    #[tokio::test]
    async fn test_login_creates_host_and_session() {
        let harness = Harness::new().await;
        mount_login(&harness).await;

        let session = harness.collab.auth.login("let-me-in").await.unwrap();

        assert_eq!(session.token.len(), 32);
        assert_eq!(session.host.id, "dj");
        assert_eq!(session.host.display_name, "DJ");

        let host = harness.db.host_by_id("dj").await.unwrap();
        assert_eq!(host.access_token, "fresh");
        assert_eq!(host.refresh_token.as_deref(), Some("r1"));

        let found = harness.collab.auth.session(&session.token).await.unwrap();
        assert_eq!(found.host.id, "dj");
    }

    #[tokio::test]
    async fn test_rejected_code() {
        let harness = Harness::new().await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
            .mount(&harness.server)
            .await;

        let result = harness.collab.auth.login("bogus").await;
        assert!(matches!(result, Err(AuthError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let harness = Harness::new().await;
        mount_login(&harness).await;

        let session = harness.collab.auth.login("let-me-in").await.unwrap();
        harness.collab.auth.logout(&session.token).await.unwrap();

        let result = harness.collab.auth.session(&session.token).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_invalid_phone_number() {
        let harness = Harness::new().await;
        harness.add_host("host").await;

        let result = harness.collab.auth.link_phone("host", "555-1234").await;
        assert!(matches!(result, Err(AuthError::InvalidPhoneNumber(_))));
    }

    #[tokio::test]
    async fn test_linking_promotes_guest() {
        let harness = Harness::new().await;
        harness.add_host("host").await;
        harness.add_playlist("p1", "bops", "host").await;

        harness.collab.router.handle(HOST_PHONE, "#bops").await.unwrap();

        let host = harness
            .collab
            .auth
            .link_phone("host", &format!(" {} ", HOST_PHONE))
            .await
            .unwrap();

        assert_eq!(host.phone_number.as_deref(), Some(HOST_PHONE));
        assert_eq!(host.active_playlist_id.as_deref(), Some("p1"));

        let identity = harness.db.identity_by_phone(HOST_PHONE).await.unwrap();
        assert!(identity.is_host());
    }

    #[tokio::test]
    async fn test_number_held_by_another_host() {
        let harness = Harness::new().await;
        harness.add_host("one").await;
        harness.add_host("two").await;

        harness.collab.auth.link_phone("one", HOST_PHONE).await.unwrap();
        let result = harness.collab.auth.link_phone("two", HOST_PHONE).await;

        assert!(matches!(
            result,
            Err(AuthError::Db(DatabaseError::Conflict { .. }))
        ));
    }
}

mod playlists {
    use super::*;

    async fn mount_create(harness: &Harness, expected_calls: u64) {
        let href = format!("{}/playlists/p9", harness.server.uri());

        Mock::given(method("POST"))
            .and(path("/users/host/playlists"))
            .and(header("authorization", "Bearer access"))
            .and(body_string_contains("Road trip"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p9",
                "href": href,
                "external_urls": { "spotify": "https://open.spotify.com/playlist/p9" }
            })))
            .expect(expected_calls)
            .mount(&harness.server)
            .await;
    }

    #[tokio::test]
    async fn test_create_playlist() {
        let harness = Harness::new().await;
        let mut host = harness.add_host("host").await;
        mount_create(&harness, 1).await;

        let playlist = harness
            .collab
            .playlists
            .create(&mut host, "Road trip", "Road.Trip")
            .await
            .unwrap();

        assert_eq!(playlist.id, "p9");
        assert_eq!(playlist.key, "road.trip");
        assert_eq!(playlist.owner_id, "host");
        assert_eq!(
            playlist.endpoint,
            format!("{}/playlists/p9/tracks", harness.server.uri())
        );

        // Guests can now reach it by key
        let found = harness.db.playlist_by_key("ROAD.TRIP").await.unwrap();
        assert_eq!(found.id, "p9");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_key() {
        let harness = Harness::new().await;
        let mut host = harness.add_host("host").await;
        mount_create(&harness, 0).await;

        for key in ["ab", "road trip", "waytoolongkey"] {
            let result = harness
                .collab
                .playlists
                .create(&mut host, "Road trip", key)
                .await;

            assert!(matches!(result, Err(PlaylistError::InvalidKey(_))), "{}", key);
        }
    }

    #[tokio::test]
    async fn test_create_rejects_taken_key() {
        let harness = Harness::new().await;
        let mut host = harness.add_host("host").await;
        harness.add_playlist("p1", "bops", "host").await;
        mount_create(&harness, 0).await;

        let result = harness
            .collab
            .playlists
            .create(&mut host, "Road trip", "BOPS")
            .await;

        assert!(matches!(result, Err(PlaylistError::KeyTaken(key)) if key == "bops"));
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        let harness = Harness::new().await;
        harness.add_host("host").await;
        harness.add_host("other").await;
        harness.add_playlist("p1", "first", "host").await;
        harness.add_playlist("p2", "second", "host").await;
        harness.add_playlist("p3", "theirs", "other").await;

        let playlists = harness.collab.playlists.list("host").await.unwrap();
        let ids: Vec<_> = playlists.iter().map(|p| p.id.as_str()).collect();

        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_delete_own_playlist_only() {
        let harness = Harness::new().await;
        harness.add_host("host").await;
        harness.add_host("other").await;
        harness.add_playlist("p1", "bops", "host").await;

        let result = harness.collab.playlists.delete("other", "p1").await;
        assert!(matches!(result, Err(PlaylistError::NotOwner)));

        harness.collab.router.handle(GUEST_PHONE, "#bops").await.unwrap();
        harness.collab.playlists.delete("host", "p1").await.unwrap();

        assert!(harness.collab.playlists.list("host").await.unwrap().is_empty());

        let identity = harness.db.identity_by_phone(GUEST_PHONE).await.unwrap();
        assert_eq!(identity.active_playlist_id(), None);
    }

    #[tokio::test]
    async fn test_activate_notifies_host() {
        let harness = Harness::new().await;
        harness.add_host("host").await;
        harness.add_playlist("p1", "bops", "host").await;
        let host = harness.db.link_host_phone("host", HOST_PHONE).await.unwrap();

        let playlist = harness.collab.playlists.activate(&host, "p1").await.unwrap();
        assert_eq!(playlist.id, "p1");

        let identity = harness.db.identity_by_phone(HOST_PHONE).await.unwrap();
        assert!(matches!(identity, Identity::Host(ref h) if h.active_playlist_id.as_deref() == Some("p1")));

        assert_eq!(
            harness.texts_to(HOST_PHONE),
            vec!["Success! Songs received from you will be added to #bops https://open.spotify.com/playlist/p1"]
        );
    }

    #[tokio::test]
    async fn test_activate_without_phone_is_silent() {
        let harness = Harness::new().await;
        let host = harness.add_host("host").await;
        harness.add_playlist("p1", "bops", "host").await;

        harness.collab.playlists.activate(&host, "p1").await.unwrap();

        assert!(harness.notifier.sent().is_empty());
        let stored = harness.db.host_by_id("host").await.unwrap();
        assert_eq!(stored.active_playlist_id.as_deref(), Some("p1"));
    }

    #[tokio::test]
    async fn test_activate_missing_playlist() {
        let harness = Harness::new().await;
        let host = harness.add_host("host").await;

        let result = harness.collab.playlists.activate(&host, "nope").await;
        assert!(matches!(
            result,
            Err(PlaylistError::Db(DatabaseError::NotFound { .. }))
        ));
    }
}
