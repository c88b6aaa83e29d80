/// Type definitions for the responder JSON API

use crate::library::{MediaKind, MediaObject};
use plainupnp_core::{Device, Reachability, SelectionTarget};
use serde::{Deserialize, Serialize};

/// A device as rendered to API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Position in the listing a commit refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub services: Vec<String>,
    pub reachability: Reachability,
}

impl DeviceInfo {
    pub fn from_device(device: &Device) -> Self {
        Self {
            index: None,
            id: device.id.clone(),
            name: device.friendly_name.clone(),
            display_name: device.display_string(true),
            services: device.services().to_vec(),
            reachability: device.reachability,
        }
    }

    pub fn indexed(index: usize, device: &Device) -> Self {
        Self {
            index: Some(index),
            ..Self::from_device(device)
        }
    }
}

/// Query for GET /v1/devices
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceQuery {
    pub service: Option<String>,
}

/// Response for GET /v1/devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub filter: String,
    pub devices: Vec<DeviceInfo>,
}

/// Request for POST /v1/selection/:target/begin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeginSelectionRequest {
    /// Narrow the listing to one service type instead of the target's default
    #[serde(default)]
    pub service: Option<String>,
}

/// Response for POST /v1/selection/:target/begin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingResponse {
    pub target: SelectionTarget,
    pub filter: String,
    pub devices: Vec<DeviceInfo>,
}

/// Request for POST /v1/selection/:target/commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub index: usize,
}

/// Response for POST /v1/selection/:target/commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub target: SelectionTarget,
    pub device: DeviceInfo,
}

/// Selection state of one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionStatus {
    pub target: SelectionTarget,
    pub presenting: bool,
    pub selected: Option<DeviceInfo>,
}

/// Response for GET /v1/selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionsResponse {
    pub selections: Vec<SelectionStatus>,
}

/// A library object and the URL it is served under
#[derive(Debug, Clone, Serialize)]
pub struct MediaInfo {
    pub id: String,
    pub kind: MediaKind,
    pub mime: String,
    pub url: String,
}

impl From<&MediaObject> for MediaInfo {
    fn from(object: &MediaObject) -> Self {
        Self {
            id: object.id.clone(),
            kind: object.kind,
            mime: object.mime.clone(),
            url: object.url_path(),
        }
    }
}

/// Response for GET /v1/media
#[derive(Debug, Clone, Serialize)]
pub struct MediaResponse {
    pub objects: Vec<MediaInfo>,
}

/// Response for GET /v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub devices: usize,
    pub media_objects: usize,
}
