//! Model proxy client for ghbridge.
//!
//! Talks to an OpenAI-compatible chat completions endpoint (a LiteLLM
//! style proxy) with bearer auth and the proxy's request headers.

mod client;
mod types;

pub use client::ModelProxyClient;
pub use types::*;
