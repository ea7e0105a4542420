use std::sync::Arc;

use anyhow::Error;
use bank::{foods::Bank, get_bank};
use tracing::{error, info, warn};

use super::{
    config::{Config, ProviderKind},
    provider::{Provider, memory::MemoryProvider, rest::RestProvider},
};

pub struct AppState {
    pub bank: Bank,
    pub config: Config,
    pub provider: Option<Arc<dyn Provider>>,
}

impl AppState {
    pub fn load() -> Result<Arc<Self>, Error> {
        let config = Config::load()?;
        let provider = init_provider(&config);

        Self::new(config, provider)
    }

    pub fn new(config: Config, provider: Option<Arc<dyn Provider>>) -> Result<Arc<Self>, Error> {
        let bank = get_bank()?;
        info!("Loaded {} food categories", bank.categories.len());

        Ok(Arc::new(Self {
            bank,
            config,
            provider,
        }))
    }

    /// `None` when the collaborator could not be configured at startup.
    pub fn provider(&self) -> Option<&dyn Provider> {
        self.provider.as_deref()
    }
}

fn init_provider(config: &Config) -> Option<Arc<dyn Provider>> {
    match config.provider {
        ProviderKind::Memory => {
            warn!("Using the in-memory collaborator, nothing will be persisted");

            Some(Arc::new(MemoryProvider::new(
                &config.public_base_url,
                &config.storage_bucket,
            )))
        }
        ProviderKind::Rest => {
            let (Some(url), Some(anon_key)) = (&config.supabase_url, &config.supabase_anon_key)
            else {
                warn!("SUPABASE_URL or SUPABASE_ANON_KEY missing, collaborator disabled");
                return None;
            };

            match RestProvider::new(url, anon_key, &config.storage_bucket) {
                Ok(provider) => {
                    info!("Collaborator at {url}");
                    Some(Arc::new(provider))
                }
                Err(e) => {
                    error!("Failed to build collaborator client: {e}");
                    None
                }
            }
        }
    }
}
