use log::{debug, warn};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::{DatabaseError, HostData, SharedDatabase, UpdatedTokens, SPOTIFY_TRACK_PREFIX};

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const API_BASE: &str = "https://api.spotify.com/v1";
const SCOPE: &str =
    "user-read-private user-read-email playlist-modify-public playlist-modify-private";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider answered with something other than success
    #[error("Provider responded with {status}: {body}")]
    Status { status: u16, body: String },
    /// The access token expired and could not be renewed
    #[error("Failed to refresh access token: {0}")]
    Refresh(String),
    #[error("Host has no refresh token")]
    MissingRefreshToken,
    #[error("Failed to reach provider: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to parse provider response: {0}")]
    Parse(String),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// Everything needed to talk to the music provider on behalf of hosts
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Where the provider sends hosts back to after authorizing
    pub redirect_uri: String,
    pub scope: String,
    pub accounts_base: String,
    pub api_base: String,
    /// Track links in messages start with this
    pub track_prefix: String,
}

impl ProviderConfig {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: SCOPE.to_string(),
            accounts_base: ACCOUNTS_BASE.to_string(),
            api_base: API_BASE.to_string(),
            track_prefix: SPOTIFY_TRACK_PREFIX.to_string(),
        }
    }

    /// Points both the accounts and the api endpoints at another server
    pub fn with_bases(mut self, accounts_base: &str, api_base: &str) -> Self {
        self.accounts_base = accounts_base.trim_end_matches('/').to_string();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }
}

/// Tokens handed out by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Only present on code exchange, or when the provider rotates it
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// The parts of a provider profile groupchat cares about
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExternalUrls {
    pub spotify: String,
}

/// Performs calls to the music provider with a host's credentials.
/// An expired access token is refreshed once, and the call retried once.
pub struct TokenGateway {
    http: Client,
    config: ProviderConfig,
    db: SharedDatabase,
}

impl TokenGateway {
    pub fn new(config: ProviderConfig, db: &SharedDatabase) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("groupchat/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            db: db.clone(),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Calls an endpoint of the provider as the host.
    /// On success the host carries the latest access token, so it can be reused for further calls.
    pub async fn call(
        &self,
        host: &mut HostData,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let response = self.send(host, method.clone(), endpoint, body).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return read_json(response).await;
        }

        warn!("Access token of host {} expired, refreshing", host.id);
        self.refresh(host).await?;

        let response = self.send(host, method, endpoint, body).await?;
        read_json(response).await
    }

    /// Returns the url hosts visit to authorize groupchat
    pub fn authorization_url(&self) -> String {
        let base = format!("{}/authorize", self.config.accounts_base);
        let params = [
            ("response_type", "code"),
            ("client_id", self.config.client_id.as_str()),
            ("scope", self.config.scope.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        match Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            Err(_) => base,
        }
    }

    /// Exchanges the code from an authorization redirect for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GatewayError> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    /// Fetches the profile belonging to an access token
    pub async fn fetch_profile(&self, access_token: &str) -> Result<Profile, GatewayError> {
        let response = self
            .http
            .get(format!("{}/me", self.config.api_base))
            .bearer_auth(access_token)
            .send()
            .await?;

        parse(read_json(response).await?)
    }

    async fn send(
        &self,
        host: &HostData,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Response, GatewayError> {
        debug!("{} {} as host {}", method, endpoint, host.id);

        let mut request = self
            .http
            .request(method, endpoint)
            .bearer_auth(&host.access_token);

        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    async fn refresh(&self, host: &mut HostData) -> Result<(), GatewayError> {
        let refresh_token = host
            .refresh_token
            .clone()
            .ok_or(GatewayError::MissingRefreshToken)?;

        let grant = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .await
            .map_err(|e| GatewayError::Refresh(e.to_string()))?;

        self.db
            .update_host_tokens(UpdatedTokens {
                host_id: host.id.clone(),
                access_token: grant.access_token.clone(),
                refresh_token: grant.refresh_token.clone(),
            })
            .await?;

        host.access_token = grant.access_token;
        if grant.refresh_token.is_some() {
            host.refresh_token = grant.refresh_token;
        }

        Ok(())
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenGrant, GatewayError> {
        let response = self
            .http
            .post(format!("{}/api/token", self.config.accounts_base))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await?;

        parse(read_json(response).await?)
    }
}

async fn read_json(response: Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(GatewayError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| GatewayError::Parse(e.to_string()))
}

fn parse<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| GatewayError::Parse(e.to_string()))
}
