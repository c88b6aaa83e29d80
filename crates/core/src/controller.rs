use crate::filter::CapabilityFilter;
use crate::models::Device;
use crate::registry::{DeviceRegistry, SharedDeviceRegistry};
use crate::selection::SelectionProtocol;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// The two roles a user can pick a device for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionTarget {
    ContentDirectory,
    Renderer,
}

impl SelectionTarget {
    pub const ALL: [SelectionTarget; 2] = [SelectionTarget::ContentDirectory, SelectionTarget::Renderer];

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionTarget::ContentDirectory => "content-directory",
            SelectionTarget::Renderer => "renderer",
        }
    }

    /// Filter used when the caller does not narrow the listing further
    pub fn default_filter(&self) -> CapabilityFilter {
        match self {
            SelectionTarget::ContentDirectory => CapabilityFilter::content_directory(),
            SelectionTarget::Renderer => CapabilityFilter::renderer(),
        }
    }
}

impl std::fmt::Display for SelectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for invalid selection target strings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseSelectionTargetError;

impl std::fmt::Display for ParseSelectionTargetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid selection target")
    }
}

impl std::error::Error for ParseSelectionTargetError {}

impl FromStr for SelectionTarget {
    type Err = ParseSelectionTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content-directory" | "contentdirectory" => Ok(SelectionTarget::ContentDirectory),
            "renderer" => Ok(SelectionTarget::Renderer),
            _ => Err(ParseSelectionTargetError),
        }
    }
}

/// Session-wide owner of the device registry and the per-target selections
pub struct ServiceController {
    registry: SharedDeviceRegistry,
    content_directory: SelectionProtocol,
    renderer: SelectionProtocol,
}

impl ServiceController {
    pub fn new(registry: SharedDeviceRegistry) -> Self {
        Self {
            content_directory: SelectionProtocol::new(registry.clone()),
            renderer: SelectionProtocol::new(registry.clone()),
            registry,
        }
    }

    pub fn registry(&self) -> &SharedDeviceRegistry {
        &self.registry
    }

    pub fn selection(&self, target: SelectionTarget) -> &SelectionProtocol {
        match target {
            SelectionTarget::ContentDirectory => &self.content_directory,
            SelectionTarget::Renderer => &self.renderer,
        }
    }

    pub fn selected(&self, target: SelectionTarget) -> Option<Device> {
        self.selection(target).selected()
    }
}

impl Default for ServiceController {
    fn default() -> Self {
        Self::new(Arc::new(DeviceRegistry::new()))
    }
}

/// Thread-safe wrapper for ServiceController
pub type SharedServiceController = Arc<ServiceController>;
