//! Ethernet link backend over sysfs and ethtool

use crate::error::HalError;
use crate::link::{LinkControl, LinkSpeed};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

const RENEGOTIATE_POLLS: u32 = 16;
const RENEGOTIATE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Link control for one network interface
#[derive(Debug)]
pub struct EthtoolLink {
    iface: String,
    sysfs: PathBuf,
}

impl EthtoolLink {
    /// Control for `iface` (e.g. `eth0`)
    #[must_use]
    pub fn new(iface: impl Into<String>) -> Self {
        let iface = iface.into();
        let sysfs = PathBuf::from("/sys/class/net").join(&iface);
        Self { iface, sysfs }
    }

    fn read_speed(&self) -> Option<LinkSpeed> {
        let carrier = std::fs::read_to_string(self.sysfs.join("carrier")).ok()?;
        if carrier.trim() != "1" {
            return None;
        }
        let speed = std::fs::read_to_string(self.sysfs.join("speed")).ok()?;
        match speed.trim().parse::<u32>().ok()? {
            100 => Some(LinkSpeed::Mbit100),
            1000 => Some(LinkSpeed::Gbit1),
            _ => None,
        }
    }
}

#[async_trait]
impl LinkControl for EthtoolLink {
    async fn current(&self) -> Option<LinkSpeed> {
        self.read_speed()
    }

    async fn negotiate(&self, speed: LinkSpeed) -> Result<(), HalError> {
        let status = Command::new("ethtool")
            .args(["-s", &self.iface, "speed"])
            .arg(speed.mbits().to_string())
            .args(["duplex", "full", "autoneg", "off"])
            .status()
            .await?;
        if !status.success() {
            return Err(HalError::command("ethtool", status.to_string()));
        }

        // link takes a few seconds to come back after a speed change
        for _ in 0..RENEGOTIATE_POLLS {
            tokio::time::sleep(RENEGOTIATE_POLL_INTERVAL).await;
            if self.read_speed() == Some(speed) {
                return Ok(());
            }
        }
        Err(HalError::Timeout(
            RENEGOTIATE_POLL_INTERVAL * RENEGOTIATE_POLLS,
        ))
    }
}
