use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{postgres::PgPoolOptions, query, query_as, Error as SqlxError, PgPool};

use crate::{
    Database, DatabaseError, DatabaseResult, GuestData, HostData, Identity, IntoDatabaseError,
    NewHost, NewPlaylist, NewSession, NewTrackAttribution, PlaylistData, Result, SessionData,
    TrackAttributionData, UpdatedTokens,
};

/// A postgres database implementation for groupchat
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: i32,
    token: String,
    host_id: String,
    expires_at: DateTime<Utc>,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        info!("Database migrations are up to date");

        Ok(Self { pool })
    }

    async fn guest_by_phone(&self, phone_number: &str) -> Result<GuestData> {
        query_as::<_, GuestData>("SELECT * FROM guests WHERE phone_number = $1")
            .bind(phone_number)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("guest", "phone_number"))
    }

    async fn host_by_phone(&self, phone_number: &str) -> Result<HostData> {
        query_as::<_, HostData>("SELECT * FROM hosts WHERE phone_number = $1")
            .bind(phone_number)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("host", "phone_number"))
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn identity_by_phone(&self, phone_number: &str) -> Result<Identity> {
        if let Some(host) = self.host_by_phone(phone_number).await.optional()? {
            return Ok(Identity::Host(host));
        }

        self.guest_by_phone(phone_number).await.map(Identity::Guest)
    }

    async fn create_guest(&self, phone_number: &str) -> Result<GuestData> {
        self.guest_by_phone(phone_number)
            .await
            .conflict_or_ok("guest", "phone_number", phone_number)?;

        query_as::<_, GuestData>("INSERT INTO guests (phone_number) VALUES ($1) RETURNING *")
            .bind(phone_number)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.conflict_or("guest", "phone_number", phone_number))
    }

    async fn update_active_playlist(
        &self,
        identity: &Identity,
        playlist_id: Option<&str>,
    ) -> Result<()> {
        let (result, resource) = match identity {
            Identity::Guest(guest) => (
                query("UPDATE guests SET active_playlist_id = $1 WHERE phone_number = $2")
                    .bind(playlist_id)
                    .bind(&guest.phone_number)
                    .execute(&self.pool)
                    .await,
                "guest",
            ),
            Identity::Host(host) => (
                query("UPDATE hosts SET active_playlist_id = $1 WHERE id = $2")
                    .bind(playlist_id)
                    .bind(&host.id)
                    .execute(&self.pool)
                    .await,
                "host",
            ),
        };

        match result.map_err(|e| e.any())?.rows_affected() {
            0 => Err(DatabaseError::NotFound {
                resource,
                identifier: "id",
            }),
            _ => Ok(()),
        }
    }

    async fn host_by_id(&self, host_id: &str) -> Result<HostData> {
        query_as::<_, HostData>("SELECT * FROM hosts WHERE id = $1")
            .bind(host_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("host", "id"))
    }

    async fn upsert_host(&self, new_host: NewHost) -> Result<HostData> {
        query_as::<_, HostData>(
            "
            INSERT INTO hosts (id, display_name, email, url, access_token, refresh_token)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                email = EXCLUDED.email,
                url = EXCLUDED.url,
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, hosts.refresh_token)
            RETURNING *",
        )
        .bind(&new_host.id)
        .bind(&new_host.display_name)
        .bind(&new_host.email)
        .bind(&new_host.url)
        .bind(&new_host.access_token)
        .bind(&new_host.refresh_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_host_tokens(&self, updated_tokens: UpdatedTokens) -> Result<()> {
        let result = query(
            "UPDATE hosts SET
                access_token = $1,
                refresh_token = COALESCE($2, refresh_token)
            WHERE id = $3",
        )
        .bind(&updated_tokens.access_token)
        .bind(&updated_tokens.refresh_token)
        .bind(&updated_tokens.host_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        match result.rows_affected() {
            0 => Err(DatabaseError::NotFound {
                resource: "host",
                identifier: "id",
            }),
            _ => Ok(()),
        }
    }

    async fn link_host_phone(&self, host_id: &str, phone_number: &str) -> Result<HostData> {
        // Ensure host exists
        let _ = self.host_by_id(host_id).await?;

        let other_host = self.host_by_phone(phone_number).await.optional()?;
        if other_host.is_some_and(|h| h.id != host_id) {
            return Err(DatabaseError::Conflict {
                resource: "host",
                field: "phone_number",
                value: phone_number.to_string(),
            });
        }

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let guest = query_as::<_, GuestData>(
            "DELETE FROM guests WHERE phone_number = $1 RETURNING *",
        )
        .bind(phone_number)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        if let Some(guest) = guest {
            query("UPDATE hosts SET active_playlist_id = $1 WHERE id = $2")
                .bind(&guest.active_playlist_id)
                .bind(host_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        query("UPDATE hosts SET phone_number = $1 WHERE id = $2")
            .bind(phone_number)
            .bind(host_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        self.host_by_id(host_id).await
    }

    async fn playlist_by_id(&self, playlist_id: &str) -> Result<PlaylistData> {
        query_as::<_, PlaylistData>("SELECT * FROM playlists WHERE id = $1")
            .bind(playlist_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("playlist", "id"))
    }

    async fn playlist_by_key(&self, key: &str) -> Result<PlaylistData> {
        query_as::<_, PlaylistData>(r#"SELECT * FROM playlists WHERE "key" = $1"#)
            .bind(key.to_lowercase())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("playlist", "key"))
    }

    async fn list_playlists(&self, owner_id: &str) -> Result<Vec<PlaylistData>> {
        query_as::<_, PlaylistData>(
            "SELECT * FROM playlists WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_playlist(&self, new_playlist: NewPlaylist) -> Result<PlaylistData> {
        self.playlist_by_key(&new_playlist.key)
            .await
            .conflict_or_ok("playlist", "key", &new_playlist.key)?;

        self.playlist_by_id(&new_playlist.id)
            .await
            .conflict_or_ok("playlist", "id", &new_playlist.id)?;

        // Ensure owner exists
        let _ = self.host_by_id(&new_playlist.owner_id).await?;

        query_as::<_, PlaylistData>(
            r#"
            INSERT INTO playlists (id, title, "key", url, endpoint, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *"#,
        )
        .bind(&new_playlist.id)
        .bind(&new_playlist.title)
        .bind(new_playlist.key.to_lowercase())
        .bind(&new_playlist.url)
        .bind(&new_playlist.endpoint)
        .bind(&new_playlist.owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some(PLAYLIST_ID_CONSTRAINT) => e.conflict_or("playlist", "id", &new_playlist.id),
            _ => e.conflict_or("playlist", "key", &new_playlist.key.to_lowercase()),
        })
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        // Ensure playlist exists
        let _ = self.playlist_by_id(playlist_id).await?;

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query("UPDATE guests SET active_playlist_id = NULL WHERE active_playlist_id = $1")
            .bind(playlist_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("UPDATE hosts SET active_playlist_id = NULL WHERE active_playlist_id = $1")
            .bind(playlist_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        query("DELETE FROM playlists WHERE id = $1")
            .bind(playlist_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn record_attribution(&self, new_attribution: NewTrackAttribution) -> Result<()> {
        query("INSERT INTO track_attributions (playlist_id, track_id, added_by) VALUES ($1, $2, $3)")
            .bind(&new_attribution.playlist_id)
            .bind(&new_attribution.track_id)
            .bind(&new_attribution.added_by)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_attributions(&self, playlist_id: &str) -> Result<Vec<TrackAttributionData>> {
        query_as::<_, TrackAttributionData>(
            "SELECT * FROM track_attributions WHERE playlist_id = $1 ORDER BY id",
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = query_as::<_, SessionRow>("SELECT * FROM sessions WHERE token = $1")
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("session", "token"))?;

        let host = self.host_by_id(&row.host_id).await?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            host,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query("INSERT INTO sessions (token, host_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&new_session.token)
            .bind(&new_session.host_id)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }
}

const PLAYLIST_ID_CONSTRAINT: &str = "playlists_pkey";

fn violated_constraint(error: &SqlxError) -> Option<&str> {
    match error {
        SqlxError::Database(db) => db.constraint(),
        _ => None,
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn conflict_or(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        match self {
            SqlxError::Database(db) if db.is_unique_violation() => DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            e => Self::any(e),
        }
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
