use chrono::{Duration, Utc};
use log::info;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::{random_string, PHONE_NUMBER_REGEX},
    DatabaseError, GatewayError, HostData, NewHost, NewSession, SessionData, SharedDatabase,
    TokenGateway,
};

/// Connects hosts' music accounts and keeps track of their sessions
pub struct Auth {
    db: SharedDatabase,
    gateway: Arc<TokenGateway>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider refused the authorization code, or could not be reached
    #[error("Authorization failed: {0}")]
    Authorization(GatewayError),
    #[error("{0} is not a valid phone number")]
    InvalidPhoneNumber(String),
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: usize = 7;
    const TOKEN_LENGTH: usize = 32;

    pub fn new(db: &SharedDatabase, gateway: &Arc<TokenGateway>) -> Self {
        Self {
            db: db.clone(),
            gateway: gateway.clone(),
        }
    }

    /// Returns the url of the provider's consent page
    pub fn authorization_url(&self) -> String {
        self.gateway.authorization_url()
    }

    /// Finishes authorization with the code the provider redirected with, returning a new session
    pub async fn login(&self, code: &str) -> Result<SessionData, AuthError> {
        self.clear_expired().await?;

        let grant = self
            .gateway
            .exchange_code(code)
            .await
            .map_err(AuthError::Authorization)?;

        let profile = self
            .gateway
            .fetch_profile(&grant.access_token)
            .await
            .map_err(AuthError::Authorization)?;

        let host = self
            .db
            .upsert_host(NewHost {
                display_name: profile.display_name.unwrap_or_else(|| profile.id.clone()),
                id: profile.id,
                email: profile.email,
                url: profile.external_urls.spotify,
                access_token: grant.access_token,
                refresh_token: grant.refresh_token,
            })
            .await
            .map_err(AuthError::Db)?;

        info!("Host {} authorized", host.id);

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let new_session = NewSession {
            token: random_string(Self::TOKEN_LENGTH),
            host_id: host.id,
            expires_at,
        };

        self.db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Returns a session if it exists and has not expired
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        let session = self.db.session_by_token(token).await?;

        if session.expires_at < Utc::now() {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(session)
    }

    /// Registers the phone number a host texts from.
    /// A guest already using the number becomes the host, keeping its active playlist.
    pub async fn link_phone(&self, host_id: &str, phone_number: &str) -> Result<HostData, AuthError> {
        let phone_number = phone_number.trim();

        if !PHONE_NUMBER_REGEX.is_match(phone_number) {
            return Err(AuthError::InvalidPhoneNumber(phone_number.to_string()));
        }

        let host = self
            .db
            .link_host_phone(host_id, phone_number)
            .await
            .map_err(AuthError::Db)?;

        info!("Host {} linked phone number {}", host.id, phone_number);
        Ok(host)
    }

    async fn clear_expired(&self) -> Result<(), AuthError> {
        self.db.clear_expired_sessions().await.map_err(AuthError::Db)
    }
}
