//! Linux probe backend
//!
//! Presence checks are device-node/sysfs lookups; throughput numbers
//! come from a direct-I/O `dd` read and playback goes through
//! `speaker-test`.

use crate::error::HalError;
use crate::probe::{
    AdcInput, AudioChannel, HdmiProbe, Probe, ProbeTarget, StorageDev, SystemProbe, UsbPort,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Probe over device nodes, sysfs and the usual utilities
#[derive(Debug)]
pub struct LinuxProbe {
    nodes: HashMap<ProbeTarget, PathBuf>,
    hdmi_root: PathBuf,
    adc_root: PathBuf,
    audio_device: String,
}

impl LinuxProbe {
    /// Probe with the conventional paths for this board
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ProbeTarget::Storage(StorageDev::Emmc),
            PathBuf::from("/dev/mmcblk0"),
        );
        nodes.insert(
            ProbeTarget::Storage(StorageDev::Sata),
            PathBuf::from("/dev/sda"),
        );
        nodes.insert(
            ProbeTarget::Storage(StorageDev::Nvme),
            PathBuf::from("/dev/nvme0n1"),
        );
        nodes.insert(
            ProbeTarget::Usb(UsbPort::Usb30Up),
            PathBuf::from("/dev/disk/by-path/platform-usb3-up"),
        );
        nodes.insert(
            ProbeTarget::Usb(UsbPort::Usb30Dn),
            PathBuf::from("/dev/disk/by-path/platform-usb3-dn"),
        );
        nodes.insert(
            ProbeTarget::Usb(UsbPort::Usb20Up),
            PathBuf::from("/dev/disk/by-path/platform-usb2-up"),
        );
        nodes.insert(
            ProbeTarget::Usb(UsbPort::Usb20Dn),
            PathBuf::from("/dev/disk/by-path/platform-usb2-dn"),
        );
        Self {
            nodes,
            hdmi_root: PathBuf::from("/sys/class/drm/card0-HDMI-A-1"),
            adc_root: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            audio_device: "hw:1,0".to_owned(),
        }
    }

    /// Override the device node for one target
    #[must_use]
    pub fn with_node(mut self, target: ProbeTarget, node: impl Into<PathBuf>) -> Self {
        self.nodes.insert(target, node.into());
        self
    }

    fn node(&self, target: ProbeTarget) -> Result<&Path, HalError> {
        self.nodes
            .get(&target)
            .map(PathBuf::as_path)
            .ok_or_else(|| HalError::Unsupported(format!("{target:?}")))
    }

    async fn disk_read_rate(&self, target: ProbeTarget) -> Result<i64, HalError> {
        let node = self.node(target)?;
        let output = Command::new("dd")
            .arg(format!("if={}", node.display()))
            .arg("of=/dev/null")
            .arg("bs=16M")
            .arg("count=16")
            .arg("iflag=direct")
            .output()
            .await?;
        if !output.status.success() {
            return Err(HalError::command("dd", output.status.to_string()));
        }
        // dd reports the rate on stderr
        parse_rate_mb(&String::from_utf8_lossy(&output.stderr))
    }

    async fn play_tone(&self, channel: AudioChannel) -> Result<i64, HalError> {
        let slot = match channel {
            AudioChannel::Left => "1",
            AudioChannel::Right => "2",
        };
        let status = Command::new("speaker-test")
            .arg("-D")
            .arg(&self.audio_device)
            .args(["-t", "wav", "-c2", "-l1", "-s", slot])
            .status()
            .await?;
        Ok(i64::from(status.success()))
    }

    fn read_sysfs(path: &Path) -> Result<String, HalError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

impl Default for LinuxProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for LinuxProbe {
    fn ready(&self, target: ProbeTarget) -> bool {
        match target {
            ProbeTarget::Storage(_) | ProbeTarget::Usb(_) => self
                .nodes
                .get(&target)
                .is_some_and(|node| node.exists()),
            _ => true,
        }
    }

    async fn measure(&self, target: ProbeTarget) -> Result<i64, HalError> {
        match target {
            ProbeTarget::Storage(_) | ProbeTarget::Usb(_) => self.disk_read_rate(target).await,
            ProbeTarget::Hdmi(HdmiProbe::Edid) => {
                let edid = std::fs::read(self.hdmi_root.join("edid"))?;
                Ok(i64::from(!edid.is_empty()))
            }
            ProbeTarget::Hdmi(HdmiProbe::HotPlug) => {
                let status = Self::read_sysfs(&self.hdmi_root.join("status"))?;
                Ok(i64::from(status.trim() == "connected"))
            }
            ProbeTarget::System(SystemProbe::MemoryGb) => {
                let meminfo = Self::read_sysfs(Path::new("/proc/meminfo"))?;
                parse_mem_gb(&meminfo)
            }
            ProbeTarget::System(SystemProbe::FbLines) => {
                let size = Self::read_sysfs(Path::new("/sys/class/graphics/fb0/virtual_size"))?;
                parse_fb_lines(&size)
            }
            ProbeTarget::Adc(input) => {
                let file = match input {
                    AdcInput::Header37 => "in_voltage4_raw",
                    AdcInput::Header40 => "in_voltage5_raw",
                };
                let raw = Self::read_sysfs(&self.adc_root.join(file))?;
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| HalError::Parse(raw.trim().to_owned()))
            }
            ProbeTarget::Audio(channel) => self.play_tone(channel).await,
        }
    }
}

/// Pull the `N MB/s` figure out of dd's summary line
fn parse_rate_mb(stderr: &str) -> Result<i64, HalError> {
    for line in stderr.lines().rev() {
        if let Some(idx) = line.find("MB/s") {
            let rate = line[..idx]
                .rsplit(|c: char| c.is_whitespace() || c == ',')
                .find(|s| !s.is_empty())
                .unwrap_or("");
            if let Ok(value) = rate.parse::<f64>() {
                return Ok(value as i64);
            }
        }
    }
    Err(HalError::Parse(stderr.trim().to_owned()))
}

/// MemTotal in whole GB, rounded
fn parse_mem_gb(meminfo: &str) -> Result<i64, HalError> {
    let line = meminfo
        .lines()
        .find(|l| l.starts_with("MemTotal:"))
        .ok_or_else(|| HalError::Parse("MemTotal missing".to_owned()))?;
    let kb: i64 = line
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| HalError::Parse(line.to_owned()))?;
    Ok((kb + 512 * 1024) / (1024 * 1024))
}

/// Vertical resolution from a `width,height` attribute
fn parse_fb_lines(virtual_size: &str) -> Result<i64, HalError> {
    virtual_size
        .trim()
        .split(',')
        .nth(1)
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| HalError::Parse(virtual_size.trim().to_owned()))
}
