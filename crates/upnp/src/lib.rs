//! UPnP device discovery for PlainUPnP
//!
//! This crate provides the discovery side of the application:
//! - SSDP M-SEARCH over the 239.255.255.250:1900 multicast group
//! - Device description fetching and parsing with quick-xml
//! - A sweep loop that keeps the shared device registry current

pub mod discovery;
pub mod service;
pub mod xml_parser;

pub use discovery::{short_service_type, SsdpDiscovery};
pub use service::{DiscoveryConfig, DiscoveryService, SweepReport};
pub use xml_parser::parse_device_description;
