//! Core error types for pomopal-core.
//!
//! This module defines the error hierarchy using thiserror. Generation
//! failures are deliberately a separate type: they are always recovered
//! inside the companion scheduler and never travel up as `CoreError`.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomopal-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Profile persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// HTTP client errors outside the generation path (version checks)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Profile document persistence errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read profile at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write profile at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Profile at {path} is not valid JSON: {message}")]
    DecodeFailed { path: PathBuf, message: String },

    #[error("Profile store lock poisoned")]
    Poisoned,
}

/// Failure reported by the dialogue generation collaborator.
///
/// Dispatched by exhaustive matching in the scheduler: `AuthExpired` opens
/// the circuit and raises the credential alert, everything else is
/// transient and raises the congestion alert.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// Credential missing, invalid or expired.
    #[error("credential expired or invalid")]
    AuthExpired,

    /// Rate limiting or congestion signalled by the service.
    #[error("service congested or rate limited")]
    RateLimited,

    /// Anything else, including timeouts.
    #[error("generation failed: {0}")]
    Unknown(String),
}

impl GenerationFailure {
    /// Whether this failure should be treated as transient congestion.
    pub fn is_transient(&self) -> bool {
        !matches!(self, GenerationFailure::AuthExpired)
    }
}
