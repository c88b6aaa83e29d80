/// UPnP device description parsing using quick-xml

use crate::discovery::short_service_type;
use anyhow::{anyhow, Result};
use plainupnp_core::Device;
use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, Clone, Default)]
struct DeviceInfo {
    friendly_name: String,
    udn: String,
    manufacturer: Option<String>,
    model: Option<String>,
}

/// Parse a device description document into a [`Device`].
///
/// Identity and names come from the root device; services of embedded devices
/// are folded into the same service list, since a media server frequently
/// advertises its ContentDirectory on an embedded device.
pub fn parse_device_description(xml: &str, location: &str) -> Result<Device> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut info = DeviceInfo::default();
    let mut service_types = Vec::new();
    let mut current_text = String::new();
    let mut device_depth = 0usize;
    let mut in_service = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                match e.local_name().as_ref() {
                    b"device" => device_depth += 1,
                    b"service" => in_service = true,
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let text = current_text.trim();

                if in_service {
                    match name.as_str() {
                        "serviceType" if !text.is_empty() => service_types.push(short_service_type(text)),
                        "service" => in_service = false,
                        _ => {}
                    }
                } else if device_depth == 1 {
                    // Only the root device describes identity
                    match name.as_str() {
                        "friendlyName" => info.friendly_name = text.to_string(),
                        "UDN" => info.udn = text.to_string(),
                        "manufacturer" => info.manufacturer = Some(text.to_string()),
                        "modelName" => info.model = Some(text.to_string()),
                        _ => {}
                    }
                }

                if name == "device" {
                    device_depth = device_depth.saturating_sub(1);
                }
                current_text.clear();
            }
            Ok(Event::Text(e)) => {
                current_text.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
    }

    if info.udn.is_empty() {
        return Err(anyhow!("Device description at {} has no UDN", location));
    }

    let friendly_name = if info.friendly_name.is_empty() {
        "Unknown Device".to_string()
    } else {
        info.friendly_name
    };

    let mut device = Device::new(info.udn, friendly_name)
        .with_services(service_types)
        .with_location(location);
    device.manufacturer = info.manufacturer;
    device.model = info.model;

    Ok(device)
}
