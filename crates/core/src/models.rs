use serde::{Deserialize, Deserializer, Serialize};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Whether a device answered the most recent discovery sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    #[default]
    Alive,
    Stale,
}

impl Reachability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reachability::Alive => "alive",
            Reachability::Stale => "stale",
        }
    }
}

/// Error type for invalid reachability strings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseReachabilityError;

impl std::fmt::Display for ParseReachabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid reachability value")
    }
}

impl std::error::Error for ParseReachabilityError {}

impl FromStr for Reachability {
    type Err = ParseReachabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alive" => Ok(Reachability::Alive),
            "stale" => Ok(Reachability::Stale),
            _ => Err(ParseReachabilityError),
        }
    }
}

/// A UPnP device seen on the network and the services it advertises.
///
/// Two devices are equal when their identifiers (UDN) are equal. The friendly
/// name and service list may change between announcements of the same device.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub friendly_name: String,
    /// Short service type names ("ContentDirectory", "RenderingControl", ...)
    #[serde(default, deserialize_with = "deserialize_services")]
    services: Vec<String>,
    #[serde(default)]
    pub reachability: Reachability,
    /// URL of the device description XML
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Drop repeated service types, keeping the first occurrence
fn deserialize_services<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    let mut services = Vec::with_capacity(raw.len());
    for service in raw {
        if !services.contains(&service) {
            services.push(service);
        }
    }
    Ok(services)
}

impl Device {
    pub fn new(id: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            friendly_name: friendly_name.into(),
            services: Vec::new(),
            reachability: Reachability::Alive,
            location: None,
            manufacturer: None,
            model: None,
        }
    }

    /// Replace the advertised services, keeping the first occurrence of duplicates
    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.clear();
        for service in services {
            self.add_service(service);
        }
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Append a service type unless it is already advertised
    pub fn add_service(&mut self, service_type: impl Into<String>) {
        let service_type = service_type.into();
        if !self.services.contains(&service_type) {
            self.services.push(service_type);
        }
    }

    /// Exact, case-sensitive lookup of an advertised service type
    pub fn has_service(&self, service_type: &str) -> bool {
        self.services.iter().any(|s| s == service_type)
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn is_alive(&self) -> bool {
        self.reachability == Reachability::Alive
    }

    /// Label shown in a device list. The extended form appends manufacturer and model.
    pub fn display_string(&self, extended: bool) -> String {
        if !extended {
            return self.friendly_name.clone();
        }

        let details: Vec<&str> = [self.manufacturer.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .collect();

        if details.is_empty() {
            self.friendly_name.clone()
        } else {
            format!("{} ({})", self.friendly_name, details.join(" "))
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
