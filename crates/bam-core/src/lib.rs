//! bam-core: Core abstractions and configuration for bam
//!
//! This crate provides the `App` capability trait, the error taxonomy,
//! the configuration model and the Procfile/`.env` parsers shared by the
//! bam daemon.

pub mod config;
pub mod error;
pub mod procfile;
pub mod traits;
pub mod types;

pub use error::{AppError, ConfigError, DiscoveryError};
pub use traits::App;
pub use types::{AppInfo, AppKind};
