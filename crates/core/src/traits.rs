use crate::models::Device;
use anyhow::Result;
use async_trait::async_trait;

/// Source of device announcements that feeds the registry (SSDP, test doubles, ...)
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Run one discovery round and return every device that answered
    async fn discover(&self) -> Result<Vec<Device>>;
}
