/// Periodic discovery sweeps that keep the device registry current

use anyhow::Result;
use plainupnp_core::{CapabilityFilter, DeviceDiscovery, Reachability, SharedDeviceRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    /// Pause between two sweeps
    pub interval_secs: u64,
    /// How long one sweep listens for SSDP answers
    pub timeout_secs: u64,
    /// Consecutive missed sweeps after which a device is removed
    pub expire_after_sweeps: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            expire_after_sweeps: 3,
        }
    }
}

/// Outcome of a single sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub added: Vec<String>,
    pub refreshed: Vec<String>,
    pub stale: Vec<String>,
    pub expired: Vec<String>,
}

/// Feeds a registry from a [`DeviceDiscovery`] source.
///
/// Every sweep upserts the devices that answered as alive. A device that did
/// not answer is marked stale, and removed once it has missed
/// `expire_after_sweeps` sweeps in a row.
pub struct DiscoveryService<D: DeviceDiscovery> {
    discovery: Arc<D>,
    registry: SharedDeviceRegistry,
    config: DiscoveryConfig,
    missed: HashMap<String, u32>,
}

impl<D: DeviceDiscovery + 'static> DiscoveryService<D> {
    pub fn new(discovery: Arc<D>, registry: SharedDeviceRegistry, config: DiscoveryConfig) -> Self {
        Self {
            discovery,
            registry,
            config,
            missed: HashMap::new(),
        }
    }

    /// Run one discovery round and apply it to the registry
    pub async fn sweep(&mut self) -> Result<SweepReport> {
        let devices = self.discovery.discover().await?;
        let mut report = SweepReport::default();
        let mut seen = HashSet::new();

        for mut device in devices {
            device.reachability = Reachability::Alive;
            seen.insert(device.id.clone());
            self.missed.remove(&device.id);

            let id = device.id.clone();
            if self.registry.upsert(device) {
                report.added.push(id);
            } else {
                report.refreshed.push(id);
            }
        }

        report.stale = self.registry.mark_missing_stale(&seen);

        let known = self.registry.filtered_snapshot(&CapabilityFilter::accept_all());
        for device in known.iter().filter(|d| !seen.contains(&d.id)) {
            let count = self.missed.entry(device.id.clone()).or_insert(0);
            *count += 1;

            if *count >= self.config.expire_after_sweeps {
                self.registry.remove(&device.id);
                report.expired.push(device.id.clone());
            }
        }
        for id in &report.expired {
            self.missed.remove(id);
        }

        debug!(
            "Sweep via {}: {} added, {} refreshed, {} stale, {} expired",
            self.discovery.name(),
            report.added.len(),
            report.refreshed.len(),
            report.stale.len(),
            report.expired.len()
        );

        Ok(report)
    }

    /// Sweep every `interval_secs` until `shutdown` flips to true
    pub fn spawn(mut self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
            info!("Discovery loop started ({}s interval)", self.config.interval_secs);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep().await {
                            warn!("Discovery sweep failed: {:#}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Discovery loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use plainupnp_core::{Device, DeviceRegistry};
    use std::sync::Mutex;

    // Discovery double that replays scripted rounds
    struct ScriptedDiscovery {
        rounds: Mutex<Vec<Vec<Device>>>,
    }

    impl ScriptedDiscovery {
        fn new(mut rounds: Vec<Vec<Device>>) -> Self {
            rounds.reverse();
            Self {
                rounds: Mutex::new(rounds),
            }
        }
    }

    #[async_trait]
    impl DeviceDiscovery for ScriptedDiscovery {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn discover(&self) -> Result<Vec<Device>> {
            let mut rounds = self.rounds.lock().unwrap();
            rounds
                .pop()
                .ok_or_else(|| anyhow::anyhow!("no more scripted rounds"))
        }
    }

    fn server(id: &str) -> Device {
        Device::new(id, id).with_services(["ContentDirectory"])
    }

    fn service(rounds: Vec<Vec<Device>>, expire_after_sweeps: u32) -> (DiscoveryService<ScriptedDiscovery>, SharedDeviceRegistry) {
        let registry = Arc::new(DeviceRegistry::new());
        let config = DiscoveryConfig {
            expire_after_sweeps,
            ..Default::default()
        };
        let service = DiscoveryService::new(Arc::new(ScriptedDiscovery::new(rounds)), registry.clone(), config);
        (service, registry)
    }

    #[tokio::test]
    async fn test_sweep_adds_and_refreshes() {
        let (mut service, registry) = service(vec![vec![server("a")], vec![server("a"), server("b")]], 3);

        let first = service.sweep().await.unwrap();
        assert_eq!(first.added, vec!["a".to_string()]);

        let second = service.sweep().await.unwrap();
        assert_eq!(second.added, vec!["b".to_string()]);
        assert_eq!(second.refreshed, vec!["a".to_string()]);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_device_goes_stale_then_expires() {
        let (mut service, registry) = service(vec![vec![server("a"), server("b")], vec![server("a")], vec![server("a")]], 2);

        service.sweep().await.unwrap();

        let report = service.sweep().await.unwrap();
        assert_eq!(report.stale, vec!["b".to_string()]);
        assert!(report.expired.is_empty());
        assert_eq!(registry.get("b").unwrap().reachability, Reachability::Stale);

        let report = service.sweep().await.unwrap();
        assert_eq!(report.expired, vec!["b".to_string()]);
        assert!(registry.get("b").is_none());
        assert!(registry.get("a").unwrap().is_alive());
    }

    #[tokio::test]
    async fn test_stale_device_recovers_when_seen_again() {
        let (mut service, registry) = service(vec![vec![server("a")], vec![], vec![server("a")]], 5);

        service.sweep().await.unwrap();
        service.sweep().await.unwrap();
        assert_eq!(registry.get("a").unwrap().reachability, Reachability::Stale);

        let report = service.sweep().await.unwrap();
        assert_eq!(report.refreshed, vec!["a".to_string()]);
        assert!(registry.get("a").unwrap().is_alive());
    }

    #[tokio::test]
    async fn test_failed_sweep_leaves_registry_untouched() {
        let (mut service, registry) = service(vec![vec![server("a")]], 1);

        service.sweep().await.unwrap();
        assert!(service.sweep().await.is_err());
        assert!(registry.get("a").unwrap().is_alive());
    }

    #[tokio::test]
    async fn test_spawned_loop_stops_on_shutdown() {
        let (service, registry) = service(vec![vec![server("a")]], 3);
        let (tx, rx) = watch::channel(false);

        let handle = service.spawn(rx);
        // The first interval tick fires immediately
        for _ in 0..50 {
            if !registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.len(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
