use crate::classify::BrightnessOracle;
use std::path::PathBuf;
use tracing::debug;

const BACKLIGHT_CLASS: &str = "/sys/class/backlight";

/// Reports the screen as off when the first backlight device under the sysfs
/// class directory exposes a brightness of exactly 0.
pub struct SysfsBrightness {
    class_dir: PathBuf,
}

impl SysfsBrightness {
    pub fn new() -> Self {
        Self::at(BACKLIGHT_CLASS)
    }

    fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            class_dir: dir.into(),
        }
    }

    /// Brightness of the first (lexicographic) backlight device, or `None`
    /// when no device exists or the value cannot be read or parsed.
    fn read_first(&self) -> Option<u64> {
        let mut devices: Vec<PathBuf> = std::fs::read_dir(&self.class_dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        devices.sort();

        let brightness = devices.first()?.join("brightness");
        let raw = std::fs::read_to_string(&brightness).ok()?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(path = %brightness.display(), error = %e, "unparseable brightness value");
                None
            }
        }
    }
}

impl BrightnessOracle for SysfsBrightness {
    /// An unreadable or unparseable value means "unknown" and is reported as
    /// not-off, so a short press on read failure turns the screen off rather
    /// than firing the wake action.
    fn screen_off(&self) -> bool {
        self.read_first() == Some(0)
    }
}
