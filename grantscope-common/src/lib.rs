//! # grantscope Common Library
//!
//! Shared code for the grantscope crates:
//! - Error type
//! - Bootstrap configuration loading
//! - Tracing initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use config::FailurePolicy;
pub use error::{Error, Result};
