//! Access token handling.
//!
//! Tokens are read from the environment (after `.env` loading in the CLI)
//! and never printed: `Debug` output is redacted.

use std::fmt;

use tracing::debug;

use crate::{Error, Result};

/// Default environment variable holding the GitHub personal access token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_PERSONAL_ACCESS_TOKEN";

/// A secret credential passed to the worker process or an HTTP API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read a token from the named environment variable.
    ///
    /// A missing or blank variable is a configuration error.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => {
                debug!(var = var, len = value.len(), "Credential loaded from environment");
                Ok(Self(value.trim().to_string()))
            }
            _ => Err(Error::Config(format!(
                "{} environment variable is required",
                var
            ))),
        }
    }

    /// The raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}
