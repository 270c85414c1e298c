#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{figment::Figment, Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, LedgerFairing};
use logging::LoggerFairing;
use model::ledger::Ledger;

/// Build the server from the default figment, with a fresh ledger on
/// wall-clock time.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(LedgerFairing)
}

/// Build the server around an existing ledger.
pub fn rocket_for_ledger(figment: Figment, ledger: Ledger) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(ledger)
}

/// Default figment with the example admin and signing secret.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    use model::common::Identity;

    rocket::Config::figment()
        .merge(("admin", Identity::admin_example().to_string()))
        .merge(("jwt_secret", config::JWT_SECRET))
}
