//! Hardware capability - is this process running on the dryer board?

use std::path::Path;
use tracing::{info, warn};

/// GPIO memory device exposed by the board firmware
const GPIO_DEVICE: &str = "/dev/gpiomem";

/// Device-tree model string
const DT_MODEL: &str = "/proc/device-tree/model";

/// Determined once at startup and handed to whoever needs it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareCapability {
    embedded: bool,
}

impl HardwareCapability {
    /// Probe the host for board-control facilities
    pub fn detect() -> Self {
        let capability = Self::probe(Path::new(GPIO_DEVICE), Path::new(DT_MODEL));
        if capability.embedded {
            info!("Board control available, running on target hardware");
        } else {
            warn!("Board control not available, running in simulation mode");
        }
        capability
    }

    /// Use a fixed value instead of probing
    pub fn forced(embedded: bool) -> Self {
        info!("Hardware capability forced to embedded={}", embedded);
        Self { embedded }
    }

    fn probe(gpio_device: &Path, model_file: &Path) -> Self {
        if gpio_device.exists() {
            return Self { embedded: true };
        }

        let embedded = std::fs::read_to_string(model_file)
            .map(|model| model.contains("Raspberry Pi"))
            .unwrap_or(false);
        Self { embedded }
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }
}
