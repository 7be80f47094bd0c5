#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::{
    config::{ConfigFairing, StorageFairing},
    logging::LoggerFairing,
    model::store::Stores,
};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

/// Assemble the server. Configuration and storage are loaded from the
/// figment when the server ignites.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StorageFairing)
        .mount("/", api::routes())
}

/// Assemble the server around an existing config and storage backend.
pub fn rocket_for_stores(config: Config, stores: Stores) -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .manage(config)
        .manage(stores)
        .mount("/", api::routes())
}
