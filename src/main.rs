use azure_ip_sync::config::{Config, DEFAULT_CONFIG_FILE};
use azure_ip_sync::run;
use colored::Colorize;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Do as little as possible in main.rs as it can't contain any tests
    log4rs::init_file("log4rs.yml", Default::default()).expect("Error initializing log4rs");
    dotenv::dotenv().ok();
    log::info!("#Start main()");

    let path = std::env::var("AZURE_IP_SYNC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    let settings = match Config::load(&path).and_then(Config::prepare) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Configuration error: {e}");
            eprintln!("#{}# Configuration error: {e}", "ERROR".on_red());
            return ExitCode::from(2);
        }
    };

    match run(settings).await {
        Ok(summary) if summary.failed > 0 => ExitCode::from(3),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Run aborted: {e}");
            eprintln!("#{}# Run aborted: {e}", "ERROR".on_red());
            ExitCode::FAILURE
        }
    }
}
