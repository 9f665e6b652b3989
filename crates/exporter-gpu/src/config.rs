//! Hardware access configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the exporter finds AMD hardware information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuConfig {
    /// Root of the sysfs tree, `/sys` outside of tests
    pub sysfs_root: PathBuf,

    /// `rocm-smi` executable, resolved through `PATH` when relative
    pub rocm_smi_path: PathBuf,
}

impl GpuConfig {
    pub fn new(sysfs_root: impl Into<PathBuf>, rocm_smi_path: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            rocm_smi_path: rocm_smi_path.into(),
        }
    }

    /// Set the sysfs root
    pub fn with_sysfs_root(mut self, sysfs_root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = sysfs_root.into();
        self
    }

    /// Set the rocm-smi executable
    pub fn with_rocm_smi_path(mut self, rocm_smi_path: impl Into<PathBuf>) -> Self {
        self.rocm_smi_path = rocm_smi_path.into();
        self
    }
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self::new("/sys", "rocm-smi")
    }
}
