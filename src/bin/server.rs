use clap::Parser;
use respd::config::Config;
use respd::{server, Error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| eprintln!("Failed to initialize global tracing: {}", e));

    server::run(config).await
}
