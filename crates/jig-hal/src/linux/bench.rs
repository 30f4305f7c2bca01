//! Header bench backend
//!
//! GPIO lines go through the sysfs gpio interface. Analog read-back
//! comes from the measurement-board daemon, which exports one snapshot
//! file per concern under its export directory: `supply.mv`, `slot.mv`,
//! `model_a.mv`, `model_b.mv`, and `header.mv` holding 40
//! whitespace-separated millivolt values in pin order.

use crate::bench::{HeaderBench, Level, Marker};
use crate::error::HalError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Bench over sysfs GPIO and the measurement-board export directory
#[derive(Debug)]
pub struct SysfsBench {
    gpio_root: PathBuf,
    adc_root: PathBuf,
    open: AtomicBool,
}

impl SysfsBench {
    /// Bench with the conventional roots
    #[must_use]
    pub fn new(adc_root: impl Into<PathBuf>) -> Self {
        Self {
            gpio_root: PathBuf::from("/sys/class/gpio"),
            adc_root: adc_root.into(),
            open: AtomicBool::new(false),
        }
    }

    fn marker_file(marker: Marker) -> &'static str {
        match marker {
            Marker::Supply => "supply.mv",
            Marker::Slot => "slot.mv",
            Marker::ModelA => "model_a.mv",
            Marker::ModelB => "model_b.mv",
        }
    }

    fn read_adc(&self, file: &str) -> Result<String, HalError> {
        Ok(std::fs::read_to_string(self.adc_root.join(file))?)
    }
}

#[async_trait]
impl HeaderBench for SysfsBench {
    async fn open(&self) -> Result<(), HalError> {
        if !self.adc_root.is_dir() {
            return Err(HalError::NotPresent(
                self.adc_root.display().to_string(),
            ));
        }
        // supply file readable means the daemon is up
        self.read_adc("supply.mv")?;
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn read_marker(&self, marker: Marker) -> Result<i32, HalError> {
        let raw = self.read_adc(Self::marker_file(marker))?;
        raw.trim()
            .parse()
            .map_err(|_| HalError::Parse(raw.trim().to_owned()))
    }

    fn configure(&self, pins: &[u16]) -> Result<(), HalError> {
        for &pin in pins {
            let dir = self.gpio_root.join(format!("gpio{pin}"));
            if !dir.exists() {
                std::fs::write(self.gpio_root.join("export"), pin.to_string())?;
            }
            std::fs::write(dir.join("direction"), "out")?;
        }
        Ok(())
    }

    fn drive(&self, pin: u16, level: Level) -> Result<(), HalError> {
        let value = match level {
            Level::Low => "0",
            Level::High => "1",
        };
        std::fs::write(
            self.gpio_root.join(format!("gpio{pin}")).join("value"),
            value,
        )?;
        Ok(())
    }

    async fn sample(&self) -> Result<Vec<u16>, HalError> {
        let raw = self.read_adc("header.mv")?;
        let mut out = vec![0u16; 41];
        for (idx, field) in raw.split_whitespace().enumerate().take(40) {
            let mv = field
                .parse()
                .map_err(|_| HalError::Parse(field.to_owned()))?;
            out[idx + 1] = mv;
        }
        Ok(out)
    }
}
