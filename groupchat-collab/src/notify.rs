use async_trait::async_trait;
use log::{info, warn};
use parking_lot::Mutex;
use reqwest::Client;
use std::{fmt::Display, sync::Arc};
use thiserror::Error;

use crate::PlaylistData;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

pub type SharedNotifier = Arc<dyn Notifier>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to reach the messaging service: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Messaging service rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Represents a type that can deliver a text message to a phone number
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivery is best-effort, an Ok only means the message was handed off
    async fn send(&self, phone_number: &str, text: &str) -> Result<(), NotifyError>;
}

/// The replies groupchat sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The sender has no active playlist to add tracks to
    AskForKey,
    /// No playlist has the key, which is quoted as it was sent
    InvalidKey { literal: String },
    /// The sender's tracks will now go to this playlist
    KeyAccepted { key: String, url: String },
}

impl Notification {
    pub fn key_accepted(playlist: &PlaylistData) -> Self {
        Self::KeyAccepted {
            key: playlist.key.clone(),
            url: playlist.url.clone(),
        }
    }
}

impl Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::AskForKey => write!(
                f,
                "Which playlist do you want to add songs to? Ask the playlist's host for the #key."
            ),
            Notification::InvalidKey { literal } => write!(
                f,
                "Sorry, I couldn't find a playlist with a #key of #{}",
                literal
            ),
            Notification::KeyAccepted { key, url } => write!(
                f,
                "Success! Songs received from you will be added to #{} {}",
                key, url
            ),
        }
    }
}

/// Credentials for sending messages through Twilio
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// The shared number guests text, messages are sent from it
    pub from_number: String,
}

/// Sends text messages through the Twilio REST API
pub struct TwilioNotifier {
    http: Client,
    config: TwilioConfig,
    api_base: String,
}

impl TwilioNotifier {
    pub fn new(config: TwilioConfig) -> Self {
        Self::with_api_base(config, TWILIO_API_BASE)
    }

    pub fn with_api_base(config: TwilioConfig, api_base: &str) -> Self {
        Self {
            http: Client::new(),
            config,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, phone_number: &str, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, self.config.account_sid
        );

        let response = self
            .http
            .post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", phone_number),
                ("From", self.config.from_number.as_str()),
                ("Body", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// A message that was handed to a [MemoryNotifier]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub phone_number: String,
    pub text: String,
}

/// Keeps messages in an outbox instead of sending them.
/// Used when no messaging credentials are configured, and in tests.
#[derive(Default)]
pub struct MemoryNotifier {
    outbox: Mutex<Vec<SentMessage>>,
    failing: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that rejects every message
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Returns every message sent so far
    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox.lock().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, phone_number: &str, text: &str) -> Result<(), NotifyError> {
        if self.failing {
            warn!("Dropping message to {}", phone_number);

            return Err(NotifyError::Rejected {
                status: 503,
                body: "notifier is failing".to_string(),
            });
        }

        info!("Message to {}: {}", phone_number, text);

        self.outbox.lock().push(SentMessage {
            phone_number: phone_number.to_string(),
            text: text.to_string(),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_number: "+12702900802".to_string(),
        }
    }

    #[test]
    fn test_notification_texts() {
        assert_eq!(
            Notification::InvalidKey {
                literal: "MyKey".to_string()
            }
            .to_string(),
            "Sorry, I couldn't find a playlist with a #key of #MyKey"
        );

        assert_eq!(
            Notification::KeyAccepted {
                key: "bops".to_string(),
                url: "https://open.spotify.com/playlist/p1".to_string()
            }
            .to_string(),
            "Success! Songs received from you will be added to #bops https://open.spotify.com/playlist/p1"
        );

        assert!(Notification::AskForKey.to_string().contains("#key"));
    }

    #[tokio::test]
    async fn test_twilio_sends_form() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("Body=hello"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TwilioNotifier::with_api_base(config(), &server.uri());
        notifier.send("+17087700438", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_twilio_rejection_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid To"))
            .mount(&server)
            .await;

        let notifier = TwilioNotifier::with_api_base(config(), &server.uri());
        let result = notifier.send("nope", "hello").await;

        assert!(matches!(
            result,
            Err(NotifyError::Rejected { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_notifier_records() {
        let notifier = MemoryNotifier::new();
        notifier.send("+1555", "hi").await.unwrap();

        assert_eq!(
            notifier.sent(),
            vec![SentMessage {
                phone_number: "+1555".to_string(),
                text: "hi".to_string()
            }]
        );

        assert!(MemoryNotifier::failing().send("+1555", "hi").await.is_err());
    }
}
