//! jig-hal - hardware adapters for the JIG self-test harness
//!
//! Defines the trait seams the test engine drives:
//! - Presence/throughput probes per hardware domain
//! - Ethernet link control
//! - The operator display panel and board status LEDs
//! - Raw input-event streams (IR remote, headphone jack)
//! - The companion network service (discovery, identity, messages)
//! - The identity fuse store
//! - The header test bench (GPIO drive + analog read-back)
//!
//! Two families of implementations ship with the crate: thin Linux
//! backends over sysfs/procfs and the conventional benchmarking
//! utilities, and scripted simulation backends that drive the engine
//! deterministically in tests and `jig-harness simulate`.

#![warn(unreachable_pub)]

pub mod bench;
pub mod companion;
pub mod display;
pub mod error;
pub mod fuse;
pub mod input;
pub mod link;
pub mod probe;
pub mod sim;

pub mod linux;

pub use bench::{HeaderBench, Level, Marker};
pub use companion::{Companion, MessageKind, PrintChannel};
pub use display::{Color, DisplayRef, NullPanel, Panel, StatusLed, StatusLeds, TracePanel};
pub use error::HalError;
pub use fuse::FuseStore;
pub use input::{InputEvent, InputStream, SW_HEADPHONE_INSERT};
pub use link::{LinkControl, LinkSpeed};
pub use probe::{
    AdcInput, AudioChannel, HdmiProbe, Probe, ProbeTarget, StorageDev, SystemProbe, UsbPort,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
