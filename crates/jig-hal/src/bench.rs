//! Header test bench
//!
//! The jig wires every usable header pin to an external ADC board. One
//! trait covers the whole bench: opening the measurement session,
//! reading the jig marker channels (supply presence, slot select,
//! expected memory model), driving GPIO output levels, and sampling the
//! analog read-back of all 40 header positions.

use crate::error::HalError;
use async_trait::async_trait;

/// GPIO output level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven low
    Low,
    /// Driven high
    High,
}

impl Level {
    /// Complement of this level
    #[inline]
    #[must_use]
    pub fn invert(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

/// Jig marker channels on the measurement board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Supply rail presence (DC jack)
    Supply,
    /// Jig slot select (left/right)
    Slot,
    /// Expected-model marker A
    ModelA,
    /// Expected-model marker B
    ModelB,
}

/// GPIO drive plus analog read-back over the measurement session
#[async_trait]
pub trait HeaderBench: Send + Sync {
    /// Open the measurement session; retried by the caller until it
    /// succeeds.
    async fn open(&self) -> Result<(), HalError>;

    /// Whether the measurement session is currently open
    fn is_open(&self) -> bool;

    /// Read a jig marker channel, millivolts
    async fn read_marker(&self, marker: Marker) -> Result<i32, HalError>;

    /// Configure the given GPIO lines as outputs
    fn configure(&self, pins: &[u16]) -> Result<(), HalError>;

    /// Drive one GPIO line
    fn drive(&self, pin: u16, level: Level) -> Result<(), HalError>;

    /// Sample all header positions; index 1..=40 holds millivolts for
    /// the matching physical pin, index 0 is unused.
    async fn sample(&self) -> Result<Vec<u16>, HalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_invert() {
        assert_eq!(Level::High.invert(), Level::Low);
        assert_eq!(Level::Low.invert(), Level::High);
    }
}
