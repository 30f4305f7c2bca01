//! Identity fuse backend over the efuse sysfs attribute

use crate::error::HalError;
use crate::fuse::FuseStore;
use std::path::PathBuf;

/// Fuse store reading the efuse uuid attribute
#[derive(Debug)]
pub struct SysfsFuse {
    path: PathBuf,
    vendor_prefix: String,
}

impl SysfsFuse {
    /// Store at the conventional efuse path
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("/sys/class/efuse/uuid"),
            vendor_prefix: "001e06".to_owned(),
        }
    }

    /// Store at a custom attribute path
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            vendor_prefix: "001e06".to_owned(),
        }
    }
}

impl Default for SysfsFuse {
    fn default() -> Self {
        Self::new()
    }
}

impl FuseStore for SysfsFuse {
    fn read(&self) -> Result<String, HalError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(raw.trim().to_lowercase())
    }

    fn write(&self, value: &str) -> Result<(), HalError> {
        std::fs::write(&self.path, value)?;
        Ok(())
    }

    fn is_valid(&self, value: &str) -> bool {
        value.contains(&self.vendor_prefix)
    }

    fn identity(&self, value: &str) -> Option<String> {
        let start = value.find(&self.vendor_prefix)?;
        let token: String = value[start..].chars().take(12).collect();
        (token.len() == 12 && token.chars().all(|c| c.is_ascii_hexdigit())).then_some(token)
    }
}
