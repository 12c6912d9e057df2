use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
}

/// Runtime settings, read once at startup and handed to the server
/// explicitly. Nothing in the crate reads the environment after this.
#[derive(Clone, Debug)]
pub struct Config {
    pub mongodb_uri: String,
    pub database: String,
    pub bind_addr: String,
    pub auth_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mongodb_uri: require("MONGODB_URI")?,
            database: env::var("MONGODB_DATABASE").unwrap_or_else(|_| "splitledger".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            auth_secret: require("AUTH_TOKEN_SECRET")?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
