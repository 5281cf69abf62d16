//! Core components, types, and utilities for the assessment module.
//!
//! This module contains fundamental building blocks used throughout the
//! application:
//! - Configuration handling and environment variables.
//! - Prompt templates for the grading approaches.
//! - Common types and result handling.

pub mod config;
pub mod prompts;
pub mod types;
