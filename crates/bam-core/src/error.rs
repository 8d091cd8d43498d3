//! Core error types for bam

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by App lifecycle operations
#[derive(Error, Debug)]
pub enum AppError {
    /// Start called while running
    #[error("Already started")]
    AlreadyStarted,

    /// Stop (or share) called while stopped
    #[error("Not started")]
    NotStarted,

    /// Share called while already shared
    #[error("Already shared")]
    AlreadyShared,

    /// No free port could be allocated
    #[error("Unable to allocate a port: {0}")]
    PortAllocation(#[source] std::io::Error),

    /// A Procfile command failed to spawn
    #[error("Unable to spawn process {process}: {source}")]
    Spawn {
        process: String,
        #[source]
        source: std::io::Error,
    },

    /// A listener could not be bound
    #[error("Unable to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    /// Tunnel negotiation failed
    #[error("Tunnel error: {0}")]
    Tunnel(String),

    /// I/O error while signalling or waiting
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether this is a caller mistake rather than a resource failure
    ///
    /// User errors leave the app untouched and are safe to show verbatim.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::AlreadyStarted | AppError::NotStarted | AppError::AlreadyShared
        )
    }
}

/// Errors raised while loading an app from its directory
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// File could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Procfile line is not `label: command`
    #[error("Invalid Procfile line {line}: {content:?}")]
    InvalidProcfileLine { line: usize, content: String },

    /// Procfile declares no processes
    #[error("Procfile declares no processes")]
    EmptyProcfile,

    /// .env line is not `KEY=VALUE`
    #[error("Invalid .env line {line}: {content:?}")]
    InvalidEnvLine { line: usize, content: String },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
