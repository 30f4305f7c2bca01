//! Raw input-event streams
//!
//! The IR remote and the headphone-jack switch both arrive as kernel
//! input events. The stream yields one decoded event per call, bounded
//! by the backend's poll interval; `Ok(None)` means the bound elapsed
//! with nothing to read.

use crate::error::HalError;
use async_trait::async_trait;

/// Switch code for headphone insertion (EV_SW)
pub const SW_HEADPHONE_INSERT: u16 = 0x02;

/// A decoded input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Key press (EV_KEY), kernel key code
    Key {
        /// Kernel key code
        code: u16,
    },
    /// Switch state change (EV_SW)
    Switch {
        /// Kernel switch code
        code: u16,
        /// Switch engaged (inserted) or released
        engaged: bool,
    },
}

/// Bounded-poll reader over an input-event device
#[async_trait]
pub trait InputStream: Send + Sync {
    /// Wait up to the backend's poll bound for the next event.
    async fn next(&self) -> Result<Option<InputEvent>, HalError>;
}
