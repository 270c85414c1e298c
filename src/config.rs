use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{clock::SystemClock, common::Identity, ledger::Ledger};

fn default_token_leeway() -> u64 {
    30
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    admin: Identity,
    #[serde(default = "default_token_leeway")]
    token_leeway: u64,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// The administrator, fixed for the lifetime of the ledger.
    pub fn admin(&self) -> &Identity {
        &self.admin
    }

    /// Seconds of clock skew tolerated when checking token expiry.
    pub fn token_leeway(&self) -> u64 {
        self.token_leeway
    }

    /// Secret key shared with the identity provider to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
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
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that creates an empty ledger, administered by the configured
/// admin and running on wall-clock time, and places it in managed state.
/// Must be attached after [`ConfigFairing`].
pub struct LedgerFairing;

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledger",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let admin = match rocket.state::<Config>() {
            Some(config) => config.admin().clone(),
            None => {
                error!("Cannot create ledger without application config");
                return Err(rocket);
            }
        };
        if admin.is_empty() {
            error!("Configured `admin` identity is empty");
            return Err(rocket);
        }

        info!("Created ledger administered by {admin}");
        Ok(rocket.manage(Ledger::new(admin, SystemClock)))
    }
}


#[cfg(test)]
pub use examples::JWT_SECRET;
