//! Client configuration.
//!
//! Settings come from the environment (a `.env` file is honored via
//! `dotenvy`), with defaults matching the local development deployment of
//! the microservices.

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Environment variable naming the identity service base URL.
pub const USERS_URL_VAR: &str = "CARTSIDE_USERS_URL";

/// Environment variable naming the shopping service base URL.
pub const SHOPPING_URL_VAR: &str = "CARTSIDE_SHOPPING_URL";

/// Environment variable naming the session persistence file. Unset means
/// in-memory sessions only.
pub const SESSION_FILE_VAR: &str = "CARTSIDE_SESSION_FILE";

const DEFAULT_USERS_URL: &str = "http://localhost:5001/";
const DEFAULT_SHOPPING_URL: &str = "http://localhost:5007/";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse as a URL.
    #[error("{var} is not a valid URL ({value}): {source}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        source: url::ParseError,
    },
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the identity (users) microservice.
    pub users_base_url: Url,
    /// Base URL of the shopping (carts and orders) microservice.
    pub shopping_base_url: Url,
    /// Where to persist session credentials, if anywhere.
    pub session_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Load configuration from the environment, falling back to the local
    /// development defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a base-URL variable is set but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real environment variables still apply.
        let _ = dotenvy::dotenv();

        Ok(Self {
            users_base_url: url_from_env(USERS_URL_VAR, DEFAULT_USERS_URL)?,
            shopping_base_url: url_from_env(SHOPPING_URL_VAR, DEFAULT_SHOPPING_URL)?,
            session_file: std::env::var(SESSION_FILE_VAR).ok().map(PathBuf::from),
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            users_base_url: parse_base_url(USERS_URL_VAR, DEFAULT_USERS_URL)
                .unwrap_or_else(|_| unreachable!("default URL is valid")),
            shopping_base_url: parse_base_url(SHOPPING_URL_VAR, DEFAULT_SHOPPING_URL)
                .unwrap_or_else(|_| unreachable!("default URL is valid")),
            session_file: None,
        }
    }
}

fn url_from_env(var: &'static str, default: &str) -> Result<Url, ConfigError> {
    match std::env::var(var) {
        Ok(value) => parse_base_url(var, &value),
        Err(_) => parse_base_url(var, default),
    }
}

/// Parse a base URL, normalizing a missing trailing slash so joined paths
/// do not drop the last URL segment.
fn parse_base_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    let normalized = if value.ends_with('/') {
        value.to_owned()
    } else {
        format!("{value}/")
    };
    Url::parse(&normalized).map_err(|source| ConfigError::InvalidUrl {
        var,
        value: value.to_owned(),
        source,
    })
}
