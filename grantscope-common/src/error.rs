//! Bootstrap error type
//!
//! Covers everything that can go wrong before a pipeline is assembled:
//! reading the TOML file, validating its values, preparing the root folder
//! and installing the tracing subscriber.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Config file or root folder could not be read / created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or type mismatch
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Semantically invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tracing subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}
