//! Linux sysfs GPIO output line.
//!
//! Drives a relay through the legacy `/sys/class/gpio` interface:
//!
//! ```text
//! /sys/class/gpio/export           <- "17"   claims the line
//! /sys/class/gpio/gpio17/direction <- "low"  output, starting low
//! /sys/class/gpio/gpio17/value     <- "1"    drive high
//! /sys/class/gpio/unexport         <- "17"   releases the line
//! ```
//!
//! The sysfs interface numbers lines globally: a line's number is its
//! controller's `base` plus its offset on that controller. On older
//! Raspberry Pi kernels the header controller starts at 0, so BCM17 is
//! line 17. Newer kernels (and the Pi 5, whose header sits on the RP1
//! controller) give it a large base, so the pin must be resolved through
//! [`resolve_chip_line`] with the controller's label. The interface is
//! deprecated upstream in favour of the GPIO character device, which this
//! driver does not use.
//!
//! The root directory is configurable so the driver can be pointed at a
//! scratch directory in tests.

use crate::{
    HardwareError, Result,
    traits::OutputLine,
    types::{Level, LineInfo},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Output line backed by a sysfs GPIO pin.
#[derive(Debug)]
pub struct SysfsOutputLine {
    pin: u32,
    root: PathBuf,
    value_path: PathBuf,
    /// Whether `open` exported the pin (and so `release` should unexport it).
    exported: bool,
    released: bool,
}

impl SysfsOutputLine {
    /// Claim `pin` under `root` and configure it as an output at `initial`.
    ///
    /// The pin is exported only if its directory does not exist yet; a pin
    /// exported by someone else is left exported on release.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` if the pin cannot be
    /// exported or configured.
    pub fn open(root: impl Into<PathBuf>, pin: u32, initial: Level) -> Result<Self> {
        let root = root.into();
        let line_dir = root.join(format!("gpio{pin}"));

        let exported = if line_dir.exists() {
            debug!(pin, "GPIO line already exported");
            false
        } else {
            write_sysfs(&root.join("export"), &pin.to_string()).map_err(|e| {
                HardwareError::initialization_failed(format!("export gpio{pin}: {e}"))
            })?;
            true
        };

        if !line_dir.exists() {
            return Err(HardwareError::initialization_failed(format!(
                "gpio{pin} not present under {} after export",
                root.display()
            )));
        }

        write_sysfs(&line_dir.join("direction"), initial.as_direction()).map_err(|e| {
            HardwareError::initialization_failed(format!("configure gpio{pin} as output: {e}"))
        })?;

        info!(pin, level = %initial, root = %root.display(), "GPIO line initialized");

        Ok(Self {
            pin,
            root,
            value_path: line_dir.join("value"),
            exported,
            released: false,
        })
    }

    fn line_name(&self) -> String {
        format!("gpio{}", self.pin)
    }
}

impl OutputLine for SysfsOutputLine {
    async fn set_level(&mut self, level: Level) -> Result<()> {
        if self.released {
            return Err(HardwareError::released(self.line_name()));
        }
        tokio::fs::write(&self.value_path, level.as_value())
            .await
            .map_err(|e| HardwareError::write_failed(self.line_name(), e.to_string()))
    }

    fn force_level(&mut self, level: Level) -> Result<()> {
        write_sysfs(&self.value_path, level.as_value())
            .map_err(|e| HardwareError::write_failed(self.line_name(), e.to_string()))
    }

    async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if self.exported {
            let unexport = self.root.join("unexport");
            tokio::fs::write(&unexport, self.pin.to_string())
                .await
                .map_err(|e| HardwareError::release_failed(self.line_name(), e.to_string()))?;
            debug!(pin = self.pin, "GPIO line unexported");
        } else {
            warn!(pin = self.pin, "GPIO line was exported externally, leaving it exported");
        }
        Ok(())
    }

    fn info(&self) -> LineInfo {
        LineInfo::new(self.line_name(), "sysfs")
    }
}

/// Map `offset` on the controller labelled `chip_label` to its global line
/// number, using the `gpiochip*/{label,base,ngpio}` entries under `root`.
///
/// # Errors
///
/// Returns `HardwareError::InitializationFailed` if no controller carries
/// the label or the offset is beyond its line count.
pub fn resolve_chip_line(root: &Path, chip_label: &str, offset: u32) -> Result<u32> {
    let entries = std::fs::read_dir(root).map_err(|e| {
        HardwareError::initialization_failed(format!("read {}: {e}", root.display()))
    })?;

    for entry in entries.flatten() {
        let dir = entry.path();
        let is_chip = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with("gpiochip"));
        if !is_chip || read_sysfs(&dir.join("label")).as_deref() != Some(chip_label) {
            continue;
        }

        let base = read_number(&dir.join("base"))?;
        let ngpio = read_number(&dir.join("ngpio"))?;
        if offset >= ngpio {
            return Err(HardwareError::initialization_failed(format!(
                "offset {offset} out of range for {chip_label} ({ngpio} lines)"
            )));
        }
        debug!(chip = chip_label, base, offset, "Resolved GPIO line");
        return Ok(base + offset);
    }

    Err(HardwareError::initialization_failed(format!(
        "no GPIO controller labelled {chip_label} under {}",
        root.display()
    )))
}

fn read_sysfs(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

fn read_number(path: &Path) -> Result<u32> {
    read_sysfs(path)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            HardwareError::initialization_failed(format!("unreadable {}", path.display()))
        })
}

fn write_sysfs(path: &Path, value: &str) -> std::io::Result<()> {
    std::fs::write(path, value)
}
