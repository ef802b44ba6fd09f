use logbook_store::{Store, StoreConfig};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,logbook_store=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StoreConfig::from_env();

    let store = match Store::open(&config).await {
        Ok(store) => store,
        Err(error) => {
            tracing::error!("Cannot open store: {}", error);
            return ExitCode::FAILURE;
        }
    };

    let healthy = match store.count().await {
        Ok(count) => {
            tracing::info!(backend = %store.kind(), records = count, "Store is healthy");
            true
        }
        Err(error) => {
            tracing::error!(backend = %store.kind(), "Store is not usable: {}", error);
            false
        }
    };

    // Drain the pool before exiting
    store.close().await;

    if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
