use coral::rdb::load_snapshot;
use coral::server::{RedisServer, ServerConfig, ServerContext, run};
use tracing::{error, info};

/// Entry point: parse configuration, load the initial snapshot, and serve.
/// Exits nonzero when the listener cannot be bound or accepting fails.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match ServerConfig::new(std::env::args()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to parse command line arguments");
            std::process::exit(1);
        }
    };

    let kv = load_snapshot(&config.dir, &config.dbfilename);
    info!(dir = %config.dir, dbfilename = %config.dbfilename, "initial snapshot loaded");

    let context = ServerContext::new(RedisServer::new(config), kv);

    if let Err(e) = run(context).await {
        error!(error = %e, "server terminated");
        std::process::exit(1);
    }
}
