//! Oracle abstractions for ticksheet-runtime.
//!
//! The oracle is the external text-generation service the pipelines query:
//! stateless, one prompt per call, unreliable by contract. This module
//! defines the trait plus the feature-gated HTTP implementation.
//!
//! ## Security
//!
//! Providers use the [`secrets`] module for credential handling. See
//! [`ApiCredential`] for the patterns.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod secrets;

#[cfg(feature = "openai")]
mod openai;

pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "openai")]
pub use openai::OpenAiOracle;

/// Errors from oracle providers.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Oracle returned an empty response")]
    EmptyResponse,

    #[error("Oracle not configured: {0}")]
    NotConfigured(String),
}

/// Configuration for one oracle call.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Request timeout
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4000,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Oracle abstraction allows swapping text-generation backends.
///
/// This is the ONLY place where external generation calls are made; the core
/// engine never sees a prompt.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Send one prompt, get free text back.
    ///
    /// Temperature varies per consensus attempt; everything else comes from
    /// the provider's own [`OracleConfig`].
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, OracleError>;

    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Rough token estimate for a prompt (~4 chars per token).
    fn estimate_tokens(&self, text: &str) -> u32 {
        (text.len() / 4) as u32
    }
}
