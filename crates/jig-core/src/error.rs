//! Engine error type
//!
//! Almost every failure in a run is recorded on an item, not raised:
//! the error type only covers problems that prevent the engine from
//! running at all.

use crate::config::ConfigError;
use jig_hal::HalError;

/// Errors that abort a run instead of failing an item
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Adapter failure outside any check item
    #[error(transparent)]
    Hal(#[from] HalError),

    /// A core task ended unexpectedly
    #[error("internal error: {0}")]
    Internal(String),
}
