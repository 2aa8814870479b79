//! Core types, error handling, and configuration for ghbridge.
//!
//! This crate provides the foundational pieces shared by the MCP client,
//! the GitHub tool facade, the model proxy client, and the CLI.

pub mod config;
pub mod credentials;
pub mod error;

pub use config::{Config, ModelConfig, ServerConfig};
pub use credentials::{AccessToken, GITHUB_TOKEN_ENV};
pub use error::{Error, Result};
