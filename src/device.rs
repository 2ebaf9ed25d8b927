use anyhow::Result;
use evdev::raw_stream::RawDevice;
use evdev::Key;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Highest /dev/input/eventN index probed during a scan.
const MAX_EVENT_NODES: u32 = 64;

const POWER_KEYS: [Key; 3] = [Key::KEY_POWER, Key::KEY_SLEEP, Key::KEY_WAKEUP];

pub struct FoundDevice {
    pub dev: RawDevice,
    pub path: PathBuf,
    pub name: String,
}

/// Scan event nodes in index order and return the first device whose name
/// contains `name_match` (empty matches anything, case-sensitive) and which
/// declares at least one power-class key. With `grab`, exclusive access is
/// requested on the winner; a failed grab degrades to shared access.
pub fn find_device(name_match: &str, grab: bool) -> Result<FoundDevice> {
    for path in candidate_paths() {
        let mut dev = match RawDevice::open(&path) {
            Ok(dev) => dev,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping device");
                continue;
            }
        };

        let name = dev.name().unwrap_or("").to_string();
        if !name_matches(&name, name_match) || !has_power_keys(&dev) {
            continue;
        }

        info!(path = %path.display(), name = %name, "found power-key device");
        if grab {
            if let Err(e) = dev.grab() {
                warn!(path = %path.display(), error = %e, "exclusive grab failed, using shared access");
            }
        }
        return Ok(FoundDevice { dev, path, name });
    }

    anyhow::bail!("no matching input device found (match='{name_match}')")
}

fn candidate_paths() -> impl Iterator<Item = PathBuf> {
    (0..MAX_EVENT_NODES).map(|idx| PathBuf::from(format!("/dev/input/event{idx}")))
}

fn name_matches(name: &str, pattern: &str) -> bool {
    pattern.is_empty() || name.contains(pattern)
}

fn has_power_keys(dev: &RawDevice) -> bool {
    dev.supported_keys()
        .map_or(false, |keys| POWER_KEYS.iter().any(|k| keys.contains(*k)))
}
