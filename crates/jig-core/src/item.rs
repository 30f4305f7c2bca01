//! Check item registry
//!
//! The single source of truth for the run: one fixed, ordered table of
//! check items, built once at startup. Concurrency safety comes from
//! ownership partition, not locking - every item has exactly one writer
//! task, and the per-item atomics only provide visibility. A table-wide
//! lock would serialize unrelated domains and is deliberately absent.

use jig_hal::DisplayRef;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of one check item.
///
/// Transitions are monotonic Wait -> Run -> Stop within an attempt.
/// Header-pattern items are the one place a fresh cycle starts per
/// pattern index; polling items that failed hold Run until they pass or
/// the countdown expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Not started
    Wait = 0,
    /// Probe in progress (or retrying after a failed measurement)
    Run = 1,
    /// Finished, result is final for this attempt
    Stop = 2,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Run,
            2 => Self::Stop,
            _ => Self::Wait,
        }
    }
}

/// Outcome of one check item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Outcome {
    /// Failed or not yet measured
    Fail = 0,
    /// Passed
    Pass = 1,
}

/// Closed identifier set for the fixed check battery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum CheckId {
    /// Own network address resolved
    BoardAddr,
    /// Companion server located
    ServerAddr,
    /// Installed memory matches the expected model
    Memory,
    /// Framebuffer resolution
    Framebuffer,
    /// HDMI EDID block readable
    Edid,
    /// HDMI hot-plug-detect asserted
    HotPlug,
    /// Overall run indicator (pre-satisfied)
    Status,
    /// eMMC throughput
    Emmc,
    /// SATA throughput
    Sata,
    /// NVMe throughput
    Nvme,
    /// Identity provisioned in the fuse
    Identity,
    /// Baseline network throughput
    Throughput,
    /// Link renegotiated to 100M
    Eth100m,
    /// Link renegotiated to 1G
    Eth1g,
    /// Link LED mirror (pre-satisfied, display only)
    EthLed,
    /// IR remote alive
    Remote,
    /// USB 3.0 upper port throughput
    Usb30Up,
    /// USB 3.0 lower port throughput
    Usb30Dn,
    /// USB 2.0 upper port throughput
    Usb20Up,
    /// USB 2.0 lower port throughput
    Usb20Dn,
    /// Header pattern 1 (all high)
    HeaderPt1,
    /// Header pattern 2 (all low)
    HeaderPt2,
    /// Header pattern 3 (cross)
    HeaderPt3,
    /// Header pattern 4 (inverse cross)
    HeaderPt4,
    /// Fuse change detected, upstream item
    FuseUp,
    /// Fuse change detected, downstream item
    FuseDn,
    /// Header pin 37 analog level
    Adc37,
    /// Header pin 40 analog level
    Adc40,
    /// Left audio playback
    AudioLeft,
    /// Right audio playback
    AudioRight,
    /// Headphone insertion detected
    JackIn,
    /// Headphone removal detected
    JackOut,
}

impl CheckId {
    /// All ids in registry (reporting) order
    pub const ALL: [CheckId; 32] = [
        CheckId::BoardAddr,
        CheckId::ServerAddr,
        CheckId::Memory,
        CheckId::Framebuffer,
        CheckId::Edid,
        CheckId::HotPlug,
        CheckId::Status,
        CheckId::Emmc,
        CheckId::Sata,
        CheckId::Nvme,
        CheckId::Identity,
        CheckId::Throughput,
        CheckId::Eth100m,
        CheckId::Eth1g,
        CheckId::EthLed,
        CheckId::Remote,
        CheckId::Usb30Up,
        CheckId::Usb30Dn,
        CheckId::Usb20Up,
        CheckId::Usb20Dn,
        CheckId::HeaderPt1,
        CheckId::HeaderPt2,
        CheckId::HeaderPt3,
        CheckId::HeaderPt4,
        CheckId::FuseUp,
        CheckId::FuseDn,
        CheckId::Adc37,
        CheckId::Adc40,
        CheckId::AudioLeft,
        CheckId::AudioRight,
        CheckId::JackIn,
        CheckId::JackOut,
    ];

    /// Short wire name used in failure reports
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CheckId::BoardAddr => "bip",
            CheckId::ServerAddr => "sip",
            CheckId::Memory => "mem",
            CheckId::Framebuffer => "fb",
            CheckId::Edid => "edid",
            CheckId::HotPlug => "hpd",
            CheckId::Status => "sta",
            CheckId::Emmc => "emmc",
            CheckId::Sata => "sata",
            CheckId::Nvme => "nvme",
            CheckId::Identity => "mac",
            CheckId::Throughput => "iperf",
            CheckId::Eth100m => "eth-m",
            CheckId::Eth1g => "eth-g",
            CheckId::EthLed => "eth-led",
            CheckId::Remote => "ir",
            CheckId::Usb30Up => "usb3u",
            CheckId::Usb30Dn => "usb3d",
            CheckId::Usb20Up => "usb2u",
            CheckId::Usb20Dn => "usb2d",
            CheckId::HeaderPt1 => "h1",
            CheckId::HeaderPt2 => "h2",
            CheckId::HeaderPt3 => "h3",
            CheckId::HeaderPt4 => "h4",
            CheckId::FuseUp => "bt-u",
            CheckId::FuseDn => "bt-d",
            CheckId::Adc37 => "adc37",
            CheckId::Adc40 => "adc40",
            CheckId::AudioLeft => "hp-l",
            CheckId::AudioRight => "hp-r",
            CheckId::JackIn => "hp-i",
            CheckId::JackOut => "hp-o",
        }
    }

    /// Operator display cell for this item
    #[must_use]
    pub fn cell(self) -> DisplayRef {
        let cell = match self {
            CheckId::BoardAddr => 4,
            CheckId::ServerAddr => 24,
            CheckId::Memory => 8,
            CheckId::Framebuffer => 52,
            CheckId::Edid => 53,
            CheckId::HotPlug => 54,
            CheckId::Status => 47,
            CheckId::Emmc => 62,
            CheckId::Sata => 82,
            CheckId::Nvme => 87,
            CheckId::Identity => 102,
            CheckId::Throughput => 107,
            CheckId::Eth100m => 132,
            CheckId::Eth1g => 133,
            CheckId::EthLed => 134,
            CheckId::Remote => 127,
            CheckId::Usb30Up => 143,
            CheckId::Usb30Dn => 153,
            CheckId::Usb20Up => 148,
            CheckId::Usb20Dn => 158,
            CheckId::HeaderPt1 => 172,
            CheckId::HeaderPt2 => 173,
            CheckId::HeaderPt3 => 174,
            CheckId::HeaderPt4 => 175,
            CheckId::FuseUp => 178,
            CheckId::FuseDn => 179,
            CheckId::Adc37 => 192,
            CheckId::Adc40 => 193,
            CheckId::AudioLeft => 196,
            CheckId::AudioRight => 197,
            CheckId::JackIn => 198,
            CheckId::JackOut => 199,
        };
        DisplayRef(cell)
    }

    /// Items that start the run already satisfied
    fn pre_satisfied(self) -> bool {
        matches!(self, CheckId::Status | CheckId::EthLed)
    }
}

/// One entry of the registry
#[derive(Debug)]
pub struct CheckItem {
    id: CheckId,
    cell: DisplayRef,
    name: &'static str,
    status: AtomicU8,
    result: AtomicU8,
}

impl CheckItem {
    fn new(id: CheckId) -> Self {
        let (status, result) = if id.pre_satisfied() {
            (Status::Stop, Outcome::Pass)
        } else {
            (Status::Wait, Outcome::Fail)
        };
        Self {
            id,
            cell: id.cell(),
            name: id.name(),
            status: AtomicU8::new(status as u8),
            result: AtomicU8::new(result as u8),
        }
    }

    /// Item identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> CheckId {
        self.id
    }

    /// Display cell
    #[inline]
    #[must_use]
    pub fn cell(&self) -> DisplayRef {
        self.cell
    }

    /// Wire name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current status
    #[inline]
    #[must_use]
    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Current result
    #[inline]
    #[must_use]
    pub fn result(&self) -> Outcome {
        if self.result.load(Ordering::Acquire) == Outcome::Pass as u8 {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }
}

/// Fixed ordered table of check items
#[derive(Debug)]
pub struct Registry {
    items: Vec<CheckItem>,
}

impl Registry {
    /// Build the full table; `sta` and `eth-led` start pre-satisfied
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: CheckId::ALL.iter().map(|&id| CheckItem::new(id)).collect(),
        }
    }

    /// Item record for `id`
    #[must_use]
    pub fn item(&self, id: CheckId) -> &CheckItem {
        &self.items[id as usize]
    }

    /// Current status of `id`
    #[inline]
    #[must_use]
    pub fn status(&self, id: CheckId) -> Status {
        self.item(id).status()
    }

    /// Current result of `id`
    #[inline]
    #[must_use]
    pub fn result(&self, id: CheckId) -> Outcome {
        self.item(id).result()
    }

    /// Whether `id` already passed
    #[inline]
    #[must_use]
    pub fn passed(&self, id: CheckId) -> bool {
        self.result(id) == Outcome::Pass
    }

    /// Record a status transition.
    ///
    /// Only the owning worker may call this for a given item.
    pub fn set_status(&self, id: CheckId, status: Status) {
        let prev = self.item(id).status();
        if prev == Status::Stop && status != Status::Stop && prev != status {
            // header patterns and operator-retriggered attempts re-arm;
            // anything else regressing from Stop is a discipline bug
            tracing::debug!(item = id.name(), ?prev, ?status, "item re-armed");
        }
        self.item(id).status.store(status as u8, Ordering::Release);
    }

    /// Record a result.
    ///
    /// Only the owning worker may call this for a given item.
    pub fn set_result(&self, id: CheckId, result: Outcome) {
        self.item(id).result.store(result as u8, Ordering::Release);
    }

    /// True iff every item has stopped
    #[must_use]
    pub fn all_stopped(&self) -> bool {
        self.items.iter().all(|item| item.status() == Status::Stop)
    }

    /// Names of failing items, registry order; used once at shutdown
    #[must_use]
    pub fn failures(&self) -> Vec<&'static str> {
        self.items
            .iter()
            .filter(|item| item.result() == Outcome::Fail)
            .map(CheckItem::name)
            .collect()
    }

    /// Names of items that never stopped, registry order
    #[must_use]
    pub fn stragglers(&self) -> Vec<&'static str> {
        self.items
            .iter()
            .filter(|item| item.status() != Status::Stop)
            .map(CheckItem::name)
            .collect()
    }

    /// Iterate items in registry order
    pub fn iter(&self) -> impl Iterator<Item = &CheckItem> {
        self.items.iter()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_registry_defaults() {
        let registry = Registry::new();
        assert_eq!(registry.status(CheckId::Emmc), Status::Wait);
        assert_eq!(registry.result(CheckId::Emmc), Outcome::Fail);
    }

    #[test]
    fn pre_satisfied_items() {
        let registry = Registry::new();
        for id in [CheckId::Status, CheckId::EthLed] {
            assert_eq!(registry.status(id), Status::Stop);
            assert_eq!(registry.result(id), Outcome::Pass);
        }
    }

    #[test]
    fn all_stopped_requires_every_item() {
        let registry = Registry::new();
        assert!(!registry.all_stopped());

        for &id in &CheckId::ALL {
            registry.set_status(id, Status::Stop);
        }
        assert!(registry.all_stopped());
    }

    #[test]
    fn failures_in_registry_order() {
        let registry = Registry::new();
        for &id in &CheckId::ALL {
            registry.set_result(id, Outcome::Pass);
        }
        registry.set_result(CheckId::Usb30Up, Outcome::Fail);
        registry.set_result(CheckId::Identity, Outcome::Fail);

        assert_eq!(registry.failures(), vec!["mac", "usb3u"]);
    }

    #[test]
    fn stragglers_lists_unstopped() {
        let registry = Registry::new();
        for &id in &CheckId::ALL {
            registry.set_status(id, Status::Stop);
        }
        registry.set_status(CheckId::Sata, Status::Run);

        assert_eq!(registry.stragglers(), vec!["sata"]);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = CheckId::ALL.iter().map(|id| id.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CheckId::ALL.len());
    }
}
