/// UPnP/SSDP device discovery
///
/// Sends M-SEARCH requests to the SSDP multicast group, collects the
/// description locations from the responses and turns each description into a
/// registry [`Device`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use plainupnp_core::{Device, DeviceDiscovery};
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

const SSDP_ADDR: &str = "239.255.255.250:1900";
const SSDP_MX: u8 = 3; // Max wait time in seconds

/// Search targets sent on every round
pub const DEFAULT_SEARCH_TARGETS: [&str; 3] = [
    "urn:schemas-upnp-org:device:MediaServer:1",
    "urn:schemas-upnp-org:device:MediaRenderer:1",
    "ssdp:all",
];

/// Reduce a service type URN to its short name.
///
/// `urn:schemas-upnp-org:service:ContentDirectory:1` becomes `ContentDirectory`.
/// Anything that is not a service URN is returned unchanged.
pub fn short_service_type(service_type: &str) -> String {
    let parts: Vec<&str> = service_type.split(':').collect();
    match parts.as_slice() {
        ["urn", _, "service", name, ..] if !name.is_empty() => name.to_string(),
        _ => service_type.to_string(),
    }
}

/// SSDP based [`DeviceDiscovery`]
#[derive(Debug, Clone)]
pub struct SsdpDiscovery {
    search_timeout: Duration,
    search_targets: Vec<String>,
    http: reqwest::Client,
}

impl SsdpDiscovery {
    /// Create a discovery that listens `search_timeout` for answers per round
    pub fn new(search_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client for device descriptions")?;

        Ok(Self {
            search_timeout,
            search_targets: DEFAULT_SEARCH_TARGETS.iter().map(|s| s.to_string()).collect(),
            http,
        })
    }

    pub fn with_search_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Collect description URLs from SSDP responses until the timeout elapses
    async fn search_locations(&self) -> Result<Vec<String>> {
        let socket = create_ssdp_socket()?;
        self.send_msearch(&socket).await?;

        let mut locations = Vec::new();
        let mut seen = HashSet::new();
        let deadline = Instant::now() + self.search_timeout;
        let mut buf = [0u8; 2048];

        info!("Listening for SSDP responses...");

        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());

            match timeout(remaining, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, addr))) => {
                    let response = String::from_utf8_lossy(&buf[..len]);
                    debug!("Received SSDP response from {} ({} bytes)", addr, len);

                    if let Some(location) = parse_location_header(&response) {
                        if seen.insert(location.clone()) {
                            locations.push(location);
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Socket error during discovery: {}", e);
                }
                Err(_) => break,
            }
        }

        Ok(locations)
    }

    async fn send_msearch(&self, socket: &UdpSocket) -> Result<()> {
        for st in &self.search_targets {
            let msearch = format!(
                "M-SEARCH * HTTP/1.1\r\n\
                 HOST: {}\r\n\
                 MAN: \"ssdp:discover\"\r\n\
                 MX: {}\r\n\
                 ST: {}\r\n\
                 \r\n",
                SSDP_ADDR, SSDP_MX, st
            );

            let bytes_sent = socket
                .send_to(msearch.as_bytes(), SSDP_ADDR)
                .await
                .with_context(|| format!("Failed to send M-SEARCH for {}", st))?;
            debug!("Sent M-SEARCH for {} ({} bytes to {})", st, bytes_sent, SSDP_ADDR);
        }

        Ok(())
    }

    /// Fetch and parse one device description
    pub async fn fetch_device(&self, location: &str) -> Result<Device> {
        let response = self
            .http
            .get(location)
            .send()
            .await
            .with_context(|| format!("Failed to fetch device description from {}", location))?;
        let xml_text = response.text().await?;

        crate::xml_parser::parse_device_description(&xml_text, location)
    }
}

#[async_trait]
impl DeviceDiscovery for SsdpDiscovery {
    fn name(&self) -> &str {
        "ssdp"
    }

    async fn discover(&self) -> Result<Vec<Device>> {
        info!(
            "Starting SSDP discovery ({}s timeout)",
            self.search_timeout.as_secs()
        );

        let locations = self.search_locations().await?;
        let mut devices: Vec<Device> = Vec::new();

        for location in locations {
            match self.fetch_device(&location).await {
                Ok(device) => {
                    // Several root devices can share one UDN across locations
                    if !devices.contains(&device) {
                        debug!("Discovered device: {} ({})", device.friendly_name, device.id);
                        devices.push(device);
                    }
                }
                Err(e) => warn!("Skipping {}: {:#}", location, e),
            }
        }

        info!("SSDP discovery complete, found {} device(s)", devices.len());
        Ok(devices)
    }
}

/// Extract the LOCATION header of an SSDP response (header names are case-insensitive)
fn parse_location_header(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("location") {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// Create a UDP socket for SSDP multicast
fn create_ssdp_socket() -> Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    // Coexist with other UPnP stacks on the same host
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
    socket.bind(&addr.into())?;

    let multicast_addr = Ipv4Addr::new(239, 255, 255, 250);
    if let Err(e) = socket.join_multicast_v4(&multicast_addr, &Ipv4Addr::UNSPECIFIED) {
        warn!("Failed to join multicast group: {}. Discovery may not work.", e);
        return Err(e.into());
    }
    socket.set_multicast_ttl_v4(2)?;
    socket.set_nonblocking(true)?;

    let socket = UdpSocket::from_std(socket.into())?;
    debug!("SSDP socket bound to {}", socket.local_addr()?);
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_service_type() {
        assert_eq!(
            short_service_type("urn:schemas-upnp-org:service:ContentDirectory:1"),
            "ContentDirectory"
        );
        assert_eq!(
            short_service_type("urn:schemas-upnp-org:service:RenderingControl:3"),
            "RenderingControl"
        );
        assert_eq!(
            short_service_type("urn:av-openhome-org:service:Playlist:1"),
            "Playlist"
        );
        assert_eq!(short_service_type("ContentDirectory"), "ContentDirectory");
        assert_eq!(
            short_service_type("urn:schemas-upnp-org:device:MediaServer:1"),
            "urn:schemas-upnp-org:device:MediaServer:1"
        );
    }

    #[test]
    fn test_parse_location_header() {
        let response = "HTTP/1.1 200 OK\r\n\
                        CACHE-CONTROL: max-age=1800\r\n\
                        Location: http://192.168.1.20:49152/description.xml\r\n\
                        ST: upnp:rootdevice\r\n\r\n";
        assert_eq!(
            parse_location_header(response),
            Some("http://192.168.1.20:49152/description.xml".to_string())
        );

        assert_eq!(parse_location_header("HTTP/1.1 200 OK\r\nST: ssdp:all\r\n"), None);
        assert_eq!(parse_location_header("HTTP/1.1 200 OK\r\nLOCATION:\r\n"), None);
    }
}
