mod auth;
mod db;
mod gateway;
mod mutator;
mod notify;
mod parser;
mod playlists;
mod router;
pub mod util;

use std::sync::Arc;

pub use auth::*;
pub use db::*;
pub use gateway::*;
pub use mutator::*;
pub use notify::*;
pub use parser::*;
pub use playlists::*;
pub use router::*;

/// The groupchat collab system, routing text messages to playlists, authenticating hosts, and more.
pub struct Collab {
    pub database: SharedDatabase,
    pub gateway: Arc<TokenGateway>,

    pub auth: Auth,
    pub router: SessionRouter,
    pub playlists: PlaylistManager,
}

impl Collab {
    pub fn new(
        config: ProviderConfig,
        database: SharedDatabase,
        notifier: SharedNotifier,
    ) -> Result<Self, GatewayError> {
        let parser = MessageParser::new(&config.track_prefix);

        let gateway = Arc::new(TokenGateway::new(config, &database)?);
        let mutator = Arc::new(PlaylistMutator::new(&database, &gateway));

        let auth = Auth::new(&database, &gateway);
        let router = SessionRouter::new(&database, &notifier, parser, &mutator);
        let playlists = PlaylistManager::new(&database, &gateway, &notifier);

        Ok(Self {
            database,
            gateway,
            auth,
            router,
            playlists,
        })
    }
}
