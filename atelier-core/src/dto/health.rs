//! Service banner and health DTOs

use serde::{Deserialize, Serialize};

/// Response of the root endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
    pub version: String,
}

/// Snapshot of the service state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub pipeline_ready: bool,
    pub queue_length: usize,
    pub active_tasks: usize,
    pub total_tasks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
}

/// Accelerator layout used by the inference pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_type: String,
    pub device_count: u32,
    pub tp_size: u32,
    pub ep_size: u32,
    pub visible_devices: String,
    pub project_path: String,
}
