use std::sync::Arc;

use treeindex::IndexService;
use treeindex_server::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    // Load .env file from the working directory, if any
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            log::error!("{error}");
            std::process::exit(1);
        }
    };
    let service = Arc::new(IndexService::new(config.index));
    log::info!(
        "index cache at {} (max age {}h)",
        service.cache().dir().display(),
        service.config().cache_max_age_hours
    );
    let mut server = match Server::start(config.addr, service.clone()).await {
        Ok(server) => server,
        Err(error) => {
            log::error!("failed to start server: {error}");
            std::process::exit(1);
        }
    };

    if let Err(error) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {error}");
    }
    log::info!("shutting down");
    let _ = server.shutdown();
    drop(server);

    // Joining the build thread blocks.
    let _ = tokio::task::spawn_blocking(move || service.shutdown()).await;
}
