use std::env;

use groupchat_collab::{ProviderConfig, TwilioConfig};
use groupchat_server::DEFAULT_PORT;

use crate::StartupError;

/// Everything groupchat reads from the environment at startup
pub struct Config {
    pub port: u16,
    /// Without one, everything is kept in memory
    pub database_url: Option<String>,
    pub provider: ProviderConfig,
    /// Without one, text messages are only logged
    pub twilio: Option<TwilioConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, StartupError> {
        let port = match optional("GROUPCHAT_SERVER_PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| StartupError::Config(format!("Port must be a number, got {}", port)))?,
            None => DEFAULT_PORT,
        };

        let mut provider = ProviderConfig::new(
            &required("SPOTIFY_CLIENT_ID")?,
            &required("SPOTIFY_CLIENT_SECRET")?,
            &required("SPOTIFY_REDIRECT_URI")?,
        );

        if let (Some(accounts), Some(api)) =
            (optional("SPOTIFY_ACCOUNTS_URL"), optional("SPOTIFY_API_URL"))
        {
            provider = provider.with_bases(&accounts, &api);
        }

        let twilio = match (
            optional("TWILIO_ACCOUNT_SID"),
            optional("TWILIO_AUTH_TOKEN"),
            optional("TWILIO_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Ok(Self {
            port,
            database_url: optional("GROUPCHAT_DATABASE_URL"),
            provider,
            twilio,
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, StartupError> {
    optional(name).ok_or(StartupError::MissingVariable(name))
}
