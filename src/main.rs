use evote_ledger::model::ledger::Ledger;
use log::{error, info, LevelFilter};
use rocket::Error as RocketError;
use thiserror::Error;

const LOG_CONFIG: &str = "log4rs.yaml";

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
enum Error {
    #[error("Failed to initialise logging from {LOG_CONFIG}: {0}")]
    Logging(String),
    #[error(transparent)]
    Rocket(#[from] RocketError),
}

fn init_logging() -> Result<(), Error> {
    log4rs::init_file(LOG_CONFIG, log4rs_dynamic_filters::default_deserializers())
        .map_err(|err| Error::Logging(err.to_string()))
}

async fn run() -> Result<(), Error> {
    info!("Configuring ledger server...");
    let rocket = evote_ledger::build().ignite().await?;
    if let Some(ledger) = rocket.state::<Ledger>() {
        info!(
            "...ledger ready at {}, administered by {}",
            ledger.now(),
            ledger.admin()
        );
    }
    // Only our own logging from here on.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    let _ = rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    if let Err(err) = init_logging() {
        eprintln!("{err}");
        std::process::exit(1)
    }
    info!("Initialised logging");

    if let Err(err) = run().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
