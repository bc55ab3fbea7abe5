// Library entry point for the relay
pub mod atlassian;
pub mod config;
pub mod scan;
pub mod server;
pub mod ticket;

use atlassian::{AtlassianClient, AtlassianError, OAuthStateStore};
use config::RelayConfig;
use scan::ScanOptions;

pub struct AppState {
    pub config: RelayConfig,
    pub client: AtlassianClient,
    pub oauth_states: OAuthStateStore,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Result<Self, AtlassianError> {
        let client = AtlassianClient::new(&config)?;
        let oauth_states = OAuthStateStore::new(config.oauth_state_ttl_secs);

        Ok(Self {
            config,
            client,
            oauth_states,
        })
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            target_extension: self.config.target_extension.clone(),
            zip_concurrency: self.config.zip_concurrency,
        }
    }
}
