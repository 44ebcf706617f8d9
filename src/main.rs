#![allow(non_snake_case)]

mod cli;

use std::env;

use lunchReminder::config::{AppConfig, HostConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries command output; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring config file");
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    };

    let host = match HostConfig::resolve(&config) {
        Ok(host) => host,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    cli::cli(host).await;
}
