//! Thin Linux backends
//!
//! Each adapter here is a narrow wrapper over sysfs/procfs attributes or
//! one of the conventional benchmarking utilities (`dd`, `ethtool`,
//! `iperf3`, `speaker-test`). No measurement policy lives at this layer;
//! the engine decides what a value means.

mod bench;
mod companion;
mod fuse;
mod input;
mod link;
mod panel;
mod probe;

pub use bench::SysfsBench;
pub use companion::UdpCompanion;
pub use fuse::SysfsFuse;
pub use input::EvdevStream;
pub use link::EthtoolLink;
pub use panel::{FbPanel, SysfsLeds};
pub use probe::LinuxProbe;
