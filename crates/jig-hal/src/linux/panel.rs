//! Display surface acquisition and board LEDs
//!
//! Acquiring the framebuffer device is the harness's only fatal
//! dependency; rendering itself is handled by the operator UI layer, so
//! the panel here holds the surface open and mirrors updates to the log.

use crate::display::{Color, DisplayRef, Panel, StatusLed, StatusLeds};
use crate::error::HalError;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Panel bound to an acquired framebuffer device
#[derive(Debug)]
pub struct FbPanel {
    _surface: File,
}

impl FbPanel {
    /// Acquire the display surface; failure here is fatal to the run
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, HalError> {
        let surface = File::open(path.as_ref())?;
        Ok(Self { _surface: surface })
    }
}

impl Panel for FbPanel {
    fn set_color(&self, cell: DisplayRef, color: Color) {
        tracing::trace!(%cell, ?color, "panel color");
    }

    fn set_text(&self, cell: DisplayRef, text: &str) {
        tracing::debug!(%cell, text, "panel text");
    }

    fn refresh(&self) {}
}

/// Board LEDs over the sysfs leds class
#[derive(Debug)]
pub struct SysfsLeds {
    power: PathBuf,
    alive: PathBuf,
}

impl SysfsLeds {
    /// LEDs at the conventional paths
    #[must_use]
    pub fn new() -> Self {
        Self {
            power: PathBuf::from("/sys/class/leds/power/brightness"),
            alive: PathBuf::from("/sys/class/leds/alive/brightness"),
        }
    }
}

impl Default for SysfsLeds {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLeds for SysfsLeds {
    fn set(&self, led: StatusLed, on: bool) {
        let path = match led {
            StatusLed::Power => &self.power,
            StatusLed::Alive => &self.alive,
        };
        // LEDs are cosmetic; a missing node must not disturb a check
        let _ = std::fs::write(path, if on { "1" } else { "0" });
    }
}
