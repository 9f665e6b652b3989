//! # exporter-gpu
//!
//! AMD hardware access for the exporter.
//!
//! This crate provides:
//! - The device registry read once at startup from `rocm-smi`
//! - A sysfs-backed telemetry scanner covering CPU energy, boost limits, and power caps as well
//!   as accelerator power, temperature, clocks, and busy percentages
//! - Static telemetry and registry fixtures for tests (`mock` feature)
//!
//! ## Example
//!
//! ```rust,no_run
//! use exporter_core::TelemetrySource;
//! use exporter_gpu::{GpuConfig, RocmSmi, SysfsScanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GpuConfig::default();
//!
//!     let registry = RocmSmi::new(&config.rocm_smi_path).fetch_device_registry().await?;
//!     println!("Found {} cards", registry.populated());
//!
//!     let snapshot = SysfsScanner::new(&config.sysfs_root).scan();
//!     println!("Found {} accelerators", snapshot.num_accelerators);
//!
//!     Ok(())
//! }
//! ```

use thiserror::Error;

pub mod config;
pub mod registry;
pub mod sysfs;

// Static sources for testing
#[cfg(any(feature = "mock", test))]
pub mod mock;

pub use config::GpuConfig;
pub use registry::{parse_device_registry, RocmSmi};
pub use sysfs::SysfsScanner;

/// Result type for GPU operations
pub type Result<T> = std::result::Result<T, GpuError>;

/// Errors that can occur while reading AMD hardware information
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("rocm-smi could not be started: {0}")]
    ToolUnavailable(String),

    #[error("rocm-smi failed: {0}")]
    ToolFailed(String),

    #[error("Invalid rocm-smi output: {0}")]
    InvalidOutput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GpuError {
    /// Check if the management tool itself is missing or not executable
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, GpuError::ToolUnavailable(_))
    }
}

impl From<GpuError> for exporter_core::Error {
    fn from(err: GpuError) -> Self {
        exporter_core::Error::registry(err.to_string())
    }
}
