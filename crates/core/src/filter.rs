use crate::models::Device;
use serde::{Deserialize, Serialize};

/// Service type advertised by media servers
pub const CONTENT_DIRECTORY_SERVICE: &str = "ContentDirectory";

/// Service type advertised by media renderers
pub const RENDERING_CONTROL_SERVICE: &str = "RenderingControl";

/// Predicate deciding whether a device belongs in a filtered listing.
///
/// Filters are pure functions of a single device: they never look at the
/// registry and never perform I/O, so one filter can be evaluated from any
/// number of threads at once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapabilityFilter {
    /// Device advertises this exact service type
    Service { service_type: String },
    AcceptAll,
    And {
        left: Box<CapabilityFilter>,
        right: Box<CapabilityFilter>,
    },
    Or {
        left: Box<CapabilityFilter>,
        right: Box<CapabilityFilter>,
    },
}

impl CapabilityFilter {
    pub fn service(service_type: impl Into<String>) -> Self {
        CapabilityFilter::Service {
            service_type: service_type.into(),
        }
    }

    pub fn accept_all() -> Self {
        CapabilityFilter::AcceptAll
    }

    pub fn content_directory() -> Self {
        Self::service(CONTENT_DIRECTORY_SERVICE)
    }

    pub fn renderer() -> Self {
        Self::service(RENDERING_CONTROL_SERVICE)
    }

    pub fn and(self, other: CapabilityFilter) -> Self {
        CapabilityFilter::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn or(self, other: CapabilityFilter) -> Self {
        CapabilityFilter::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Evaluate the filter. `And` stops at the first false operand, `Or` at the first true one.
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            CapabilityFilter::Service { service_type } => device.has_service(service_type),
            CapabilityFilter::AcceptAll => true,
            CapabilityFilter::And { left, right } => left.matches(device) && right.matches(device),
            CapabilityFilter::Or { left, right } => left.matches(device) || right.matches(device),
        }
    }

    /// Short human readable form used in log lines
    pub fn describe(&self) -> String {
        match self {
            CapabilityFilter::Service { service_type } => format!("service={}", service_type),
            CapabilityFilter::AcceptAll => "*".to_string(),
            CapabilityFilter::And { left, right } => {
                format!("({} AND {})", left.describe(), right.describe())
            }
            CapabilityFilter::Or { left, right } => {
                format!("({} OR {})", left.describe(), right.describe())
            }
        }
    }
}

impl Default for CapabilityFilter {
    fn default() -> Self {
        CapabilityFilter::AcceptAll
    }
}
