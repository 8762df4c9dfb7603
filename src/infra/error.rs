use thiserror::Error;

use crate::cache::{CacheStoreError, PolicyError};
use crate::config::LoadError;

/// Startup and runtime failures outside the request path.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error(transparent)]
    Configuration(#[from] LoadError),
    #[error("invalid resource cache configuration: {0}")]
    Policy(#[from] PolicyError),
    #[error("cache store unavailable: {0}")]
    Cache(#[from] CacheStoreError),
    #[error("server error: {0}")]
    Server(String),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }
}
