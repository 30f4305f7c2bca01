//! Adapter error type
//!
//! Hardware adapters report failures through a single enum; the engine
//! treats most of them as a failed measurement, not a reason to stop.

/// Errors surfaced by hardware adapters
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    /// Underlying I/O failure (device node, sysfs attribute, socket)
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// External utility exited unsuccessfully
    #[error("command `{command}` failed: {detail}")]
    CommandFailed {
        /// The utility that was invoked
        command: String,
        /// Exit status or stderr excerpt
        detail: String,
    },

    /// Output of a utility or attribute could not be parsed
    #[error("unparsable output: {0}")]
    Parse(String),

    /// The probed device is not present
    #[error("device not present: {0}")]
    NotPresent(String),

    /// Operation timed out
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Operation is not supported by this backend
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl HalError {
    /// Failed-command constructor
    #[inline]
    pub fn command(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            detail: detail.into(),
        }
    }
}
