use std::sync::Arc;

use colored::Colorize;
use groupchat_collab::{
    Collab, DatabaseError, GatewayError, MemoryDatabase, MemoryNotifier, PgDatabase,
    SharedDatabase, SharedNotifier, TwilioNotifier,
};
use groupchat_server::{run_server, ServerContext};
use log::{error, info, warn};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

use crate::{config::Config, logging::LogColor};

mod config;
mod logging;

pub struct Groupchat {
    context: ServerContext,
    port: u16,
    runtime: Runtime,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Environment variable {0} is not set")]
    MissingVariable(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Could not set up the music provider client: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Groupchat {
    fn new() -> Result<Self, StartupError> {
        let config = Config::from_env()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("groupchat-async")
            .build()
            .map_err(|e| StartupError::Fatal(e.to_string()))?;

        let database: SharedDatabase = match &config.database_url {
            Some(url) => {
                info!("Connecting to database...");
                Arc::new(runtime.block_on(PgDatabase::new(url))?)
            }
            None => {
                warn!("GROUPCHAT_DATABASE_URL is not set, nothing will be kept after a restart");
                Arc::new(MemoryDatabase::new())
            }
        };

        let notifier: SharedNotifier = match config.twilio {
            Some(twilio) => Arc::new(TwilioNotifier::new(twilio)),
            None => {
                warn!("Twilio is not configured, replies will only be logged");
                Arc::new(MemoryNotifier::new())
            }
        };

        let collab = Collab::new(config.provider, database, notifier)?;

        Ok(Self {
            context: ServerContext::new(collab),
            port: config.port,
            runtime,
        })
    }

    fn run(self) -> Result<(), StartupError> {
        self.runtime
            .block_on(run_server(self.context, self.port))
            .map_err(|e| StartupError::Fatal(e.to_string()))
    }
}

impl StartupError {
    fn hint(&self) -> String {
        match self {
            StartupError::MissingVariable(_) | StartupError::Config(_) => "Check the environment variables groupchat is started with, then try again.".to_string(),
            StartupError::Database(_) => "This is a database error. Make sure the Postgres instance is running and GROUPCHAT_DATABASE_URL points to it, then try again.".to_string(),
            StartupError::Gateway(_) => "The HTTP client for the music provider could not be built. Check the TLS setup of this machine.".to_string(),
            StartupError::Fatal(_) => "This error is fatal, and should not happen. If it happened while serving, the port may already be in use.".to_string(),
        }
    }
}

fn main() {
    if let Err(e) = logging::init_logger() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let result = Groupchat::new().and_then(|groupchat| {
        info!("Initialized successfully.");
        groupchat.run()
    });

    if let Err(error) = result {
        error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "groupchat failed to start!".bold().color(LogColor::Red));
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint())
                .color(LogColor::Dimmed)
                .italic()
        );
    }
}
