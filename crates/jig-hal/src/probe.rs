//! Presence and measurement probes
//!
//! One trait covers every pollable hardware domain. `ready` is a cheap
//! non-blocking presence check; `measure` may block for seconds (disk
//! benchmarks, playback) and reports a single integer whose unit depends
//! on the target: MB/s for storage and USB, GB for memory, lines for the
//! framebuffer, millivolts for analog inputs, a boolean 0/1 for HDMI and
//! audio. Zero or out-of-range encodes failure.

use crate::error::HalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Storage device under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageDev {
    /// On-board eMMC module
    Emmc,
    /// SATA port
    Sata,
    /// NVMe slot
    Nvme,
}

/// USB port under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsbPort {
    /// USB 3.0 upper port
    Usb30Up,
    /// USB 3.0 lower port
    Usb30Dn,
    /// USB 2.0 upper port
    Usb20Up,
    /// USB 2.0 lower port
    Usb20Dn,
}

/// HDMI one-shot checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HdmiProbe {
    /// EDID block readable
    Edid,
    /// Hot-plug-detect asserted
    HotPlug,
}

/// System one-shot checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemProbe {
    /// Installed memory, whole GB
    MemoryGb,
    /// Framebuffer vertical resolution, lines
    FbLines,
}

/// Header analog inputs with a dedicated check item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdcInput {
    /// Header pin 37 (AIN4)
    Header37,
    /// Header pin 40 (AIN5)
    Header40,
}

/// Audio playback channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioChannel {
    /// Left channel
    Left,
    /// Right channel
    Right,
}

/// Everything a `Probe` can be pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeTarget {
    /// Storage throughput
    Storage(StorageDev),
    /// USB throughput
    Usb(UsbPort),
    /// HDMI presence
    Hdmi(HdmiProbe),
    /// System property
    System(SystemProbe),
    /// Header analog input
    Adc(AdcInput),
    /// Audio playback
    Audio(AudioChannel),
}

/// Domain probe: presence plus a blocking measurement
#[async_trait]
pub trait Probe: Send + Sync {
    /// Non-blocking presence check; HDMI/system/ADC/audio targets are
    /// always considered present.
    fn ready(&self, target: ProbeTarget) -> bool;

    /// Run the measurement for `target`. May block for seconds.
    async fn measure(&self, target: ProbeTarget) -> Result<i64, HalError>;
}
