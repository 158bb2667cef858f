use anyhow::Context;
use std::env;
use std::process;
use tracing::error;
use windowgate::{config::AppConfig, init_tracing, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Optional config file path from the command line
    let config_path = env::args().nth(1);

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            eprintln!("Usage: windowgate [config_file]");
            process::exit(1);
        }
    };

    init_tracing(&config.logging).context("Failed to initialize logging")?;

    if let Err(e) = config.validate() {
        error!("FATAL ERROR: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(config).await {
        if e.is_connection_error() {
            error!(error = %e, "Failed to connect to the counter store. Server will not start.");
        } else {
            error!(error = %e, "Server error");
        }
        process::exit(1);
    }

    Ok(())
}
