//! Secure credential handling for oracle providers.
//!
//! Credentials are wrapped in [`secrecy::SecretString`] the moment they are
//! loaded, so they cannot leak through Debug or Display output and are zeroed
//! on drop. Exposure is explicit via [`ApiCredential::expose`], at the point
//! the HTTP header is built.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::OracleError;

/// Where a credential was loaded from. Useful for diagnosing configuration
/// without exposing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value. After this point the value cannot be logged
    /// accidentally.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from an environment variable.
    ///
    /// # Arguments
    /// * `env_var` - Name of the environment variable
    /// * `name` - Human-readable name for error messages (e.g., "OpenAI API key")
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, OracleError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                OracleError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Explicitly expose the credential for use in a request header.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Where this credential came from.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Human-readable credential name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}
