//! Runtime services and shared state for the assessment module.

use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    server,
    service::{db::DbClient, llm::LlmClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the database client, LLM client, and configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The database client instance.
    pub db: DbClient,
    /// The LLM client instance.
    pub llm: LlmClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the database.
        let db = DbClient::surreal(&config).await?;

        // Initialize the LLM client.
        let llm = LlmClient::from_config(&config)?;

        Ok(Self { config, db, llm })
    }

    /// Bind the HTTP server and serve until shutdown.
    pub async fn start(&self) -> Void {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&address).await?;

        info!("Assessment module listening on {address}.");

        axum::serve(listener, server::router(self.clone())).with_graceful_shutdown(shutdown_signal()).await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for the shutdown signal: {err}");
    }
}
