//! Device registry backed by `rocm-smi`
//!
//! `rocm-smi --showproductname --showid --showbus --json` prints one JSON object keyed by
//! `card<N>`. Field names contain spaces and mixed case, so the raw output is lower-cased and
//! stripped of spaces before decoding, which turns `Card series` into `cardseries` and
//! `PCI Bus` into `pcibus`.

use crate::{GpuError, Result};
use exporter_core::{DeviceInfo, DeviceRegistry, MAX_ACCELERATORS};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

const CARD_KEY_PREFIX: &str = "card";

const ROCM_SMI_ARGS: [&str; 4] = ["--showproductname", "--showid", "--showbus", "--json"];

/// Runs `rocm-smi` to build the device registry
#[derive(Debug, Clone)]
pub struct RocmSmi {
    path: PathBuf,
}

impl RocmSmi {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Run the tool once and decode its output
    pub async fn fetch_device_registry(&self) -> Result<DeviceRegistry> {
        info!("Running {} {}", self.path.display(), ROCM_SMI_ARGS.join(" "));

        let output = Command::new(&self.path)
            .args(ROCM_SMI_ARGS)
            .output()
            .await
            .map_err(|e| GpuError::ToolUnavailable(format!("{}: {}", self.path.display(), e)))?;

        if !output.status.success() {
            return Err(GpuError::ToolFailed(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!(json = %String::from_utf8_lossy(&output.stdout), "rocm-smi product information");

        let registry = parse_device_registry(&output.stdout)?;
        info!("Loaded {} cards from rocm-smi", registry.populated());
        Ok(registry)
    }
}

/// Decode `rocm-smi` JSON output into a registry indexed by card number.
///
/// The output may hold several concatenated objects. Keys that are not `card<N>` are ignored.
pub fn parse_device_registry(raw: &[u8]) -> Result<DeviceRegistry> {
    let normalized = String::from_utf8_lossy(raw).to_lowercase().replace(' ', "");
    let mut registry = DeviceRegistry::new();

    let stream = serde_json::Deserializer::from_str(&normalized).into_iter::<HashMap<String, Value>>();
    for object in stream {
        let object = object.map_err(|e| GpuError::InvalidOutput(e.to_string()))?;

        for (key, value) in object {
            let Some(slot) = card_slot(&key) else {
                debug!(key = %key, "Skipping non-card rocm-smi entry");
                continue;
            };

            let info: DeviceInfo = serde_json::from_value(value)?;
            if !registry.set(slot, info) {
                warn!(
                    slot,
                    "Card index exceeds the {} supported accelerators, ignoring", MAX_ACCELERATORS
                );
            }
        }
    }

    Ok(registry)
}

fn card_slot(key: &str) -> Option<usize> {
    key.strip_prefix(CARD_KEY_PREFIX)?.parse().ok()
}
