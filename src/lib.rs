//! Library root for `assess-module`.
//!
//! An LLM-backed assessment module for text exercises, designed to:
//! - Generate feedback suggestions for student submissions
//! - Derive structured grading criteria from free-text instructions
//! - Propose which submission a tutor should assess next
//! - Record tutor feedback for storage alongside suggestions
//!
//! The module exposes a small HTTP API for the learning platform, stores its
//! state in SurrealDB, and calls OpenAI (directly or via Azure) for
//! suggestions. The architecture is built around extensible traits that
//! allow for different implementations of each service.

#[warn(missing_docs)]
pub mod base;
pub mod grading;
pub mod interaction;
pub mod runtime;
pub mod server;
pub mod service;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Creates the runtime context with database and LLM clients, then serves
/// the HTTP API until shutdown.
pub async fn start(config: Config) -> Void {
    info!("Starting assessment module ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
