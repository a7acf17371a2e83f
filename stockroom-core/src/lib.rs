//! Stockroom Core - shared error, logging and configuration plumbing
//!
//! Used by the auth client library and the command-line front end.

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;
