//! Ethernet link control

use crate::error::HalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ethernet link speeds the harness switches between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkSpeed {
    /// 100 Mbit/s
    #[serde(rename = "100m")]
    Mbit100,
    /// 1 Gbit/s
    #[serde(rename = "1g")]
    Gbit1,
}

impl LinkSpeed {
    /// Speed in Mbit/s, as the kernel reports it
    #[inline]
    #[must_use]
    pub fn mbits(self) -> u32 {
        match self {
            Self::Mbit100 => 100,
            Self::Gbit1 => 1000,
        }
    }
}

impl fmt::Display for LinkSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mbit100 => write!(f, "100M"),
            Self::Gbit1 => write!(f, "1G"),
        }
    }
}

/// Link-speed query and renegotiation
#[async_trait]
pub trait LinkControl: Send + Sync {
    /// Current negotiated speed, `None` while the link is down
    async fn current(&self) -> Option<LinkSpeed>;

    /// Force renegotiation to `speed`; returns once the link is up at
    /// that speed or errors out.
    async fn negotiate(&self, speed: LinkSpeed) -> Result<(), HalError>;
}
