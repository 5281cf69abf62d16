//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the
//! assessment module:
//! - LLM services (OpenAI, Azure OpenAI)
//! - Database services (SurrealDB)
//!
//! Each service module defines both generic traits and concrete
//! implementations, allowing for extensibility and easy testing.

pub mod db;
pub mod llm;
