use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    mongodb::MongoStore,
    store::{MemoryStore, Stores},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and is passed
/// by reference to whatever needs it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_batch_size")]
    max_batch_size: u32,
    #[serde(default = "default_accept_inline_keys")]
    accept_inline_keys: bool,
}

fn default_max_batch_size() -> u32 {
    256
}

fn default_accept_inline_keys() -> bool {
    true
}

impl Config {
    pub fn new(max_batch_size: u32, accept_inline_keys: bool) -> Self {
        Self {
            max_batch_size,
            accept_inline_keys,
        }
    }

    /// Largest number of ballots accepted in one submission.
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size as usize
    }

    /// Whether a submission may carry its own key instead of relying on the
    /// registered one.
    pub fn accept_inline_keys(&self) -> bool {
        self.accept_inline_keys
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the storage fairing and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!(
            "Accepting batches of up to {} ballots, inline keys {}",
            config.max_batch_size,
            if config.accept_inline_keys { "allowed" } else { "refused" }
        );

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which storage backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StorageKind {
    Mongodb,
    Memory,
}

/// Configuration for the storage backend.
#[derive(Deserialize)]
struct StorageConfig {
    storage: StorageKind,
    // secrets
    db_uri: Option<String>,
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "ssi_ballots".to_string()
}

/// A fairing that loads the storage config, connects to the configured
/// backend, performs any setup necessary, and places the resulting [`Stores`]
/// into managed state.
pub struct StorageFairing;

#[rocket::async_trait]
impl Fairing for StorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StorageConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load storage config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let stores = match config.storage {
            StorageKind::Memory => {
                warn!("Using in-memory storage; admitted ballots will not survive a restart");
                Stores::shared(MemoryStore::default())
            }
            StorageKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when `storage` is \"mongodb\"");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                // Ensures indexes and the ballot sequence counter.
                let store = match MongoStore::open(client, &config.db_name).await {
                    Ok(store) => store,
                    Err(e) => {
                        error!("Failed to set up database {}: {e}", config.db_name);
                        return Err(rocket);
                    }
                };
                info!("...database connection online!");
                Stores::shared(store)
            }
        };

        rocket = rocket.manage(stores);
        Ok(rocket)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self::new(default_max_batch_size(), default_accept_inline_keys())
        }
    }
}
