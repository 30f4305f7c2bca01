//! Adapter bundle
//!
//! Everything hardware-shaped the engine needs, behind trait objects so
//! runs on the bench and runs in simulation wire up identically.

use jig_hal::{Companion, FuseStore, HeaderBench, InputStream, LinkControl, Panel, Probe, StatusLeds};
use std::sync::Arc;

/// The full adapter set for one run
#[derive(Clone)]
pub struct Fixture {
    /// Domain probes (storage, USB, HDMI, system, ADC, audio)
    pub probe: Arc<dyn Probe>,
    /// Ethernet link control
    pub link: Arc<dyn LinkControl>,
    /// Operator display panel
    pub panel: Arc<dyn Panel>,
    /// Board status LEDs
    pub leds: Arc<dyn StatusLeds>,
    /// IR remote input stream
    pub remote: Arc<dyn InputStream>,
    /// Headphone jack switch stream
    pub jack: Arc<dyn InputStream>,
    /// Companion network service
    pub companion: Arc<dyn Companion>,
    /// Identity fuse store
    pub fuse: Arc<dyn FuseStore>,
    /// Header test bench
    pub bench: Arc<dyn HeaderBench>,
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture").finish_non_exhaustive()
    }
}
