// ABOUTME: Per-registry credential freshness tracking and refresh dispatch.
// ABOUTME: Refreshes are serialized per host so concurrent workers never refresh the same registry twice.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::auth::{CredentialError, CredentialRefresher};
use crate::config::{RegistriesConfig, TokenConfig};

/// Which refresh routine applies to a registry host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryFamily {
    /// The vendor's own registry, refreshed through the vendor CLI.
    Primary,
    /// Cloud provider registries, refreshed through the cloud CLI.
    Cloud,
    /// No automatic refresh available.
    Other,
}

/// Snapshot of one host's credential bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    pub host: String,
    pub last_refresh: Option<Instant>,
    pub age: Option<Duration>,
    pub refresh_interval: Duration,
    pub proactive_threshold: Duration,
    pub needs_refresh: bool,
    pub needs_proactive_refresh: bool,
}

pub struct TokenManager {
    registries: RegistriesConfig,
    refresh_interval: Duration,
    proactive_threshold: Duration,
    failure_cooldown: Duration,
    refresher: Arc<dyn CredentialRefresher>,
    last_refresh: Mutex<HashMap<String, Instant>>,
    last_failure: Mutex<HashMap<String, Instant>>,
    host_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(
        refresher: Arc<dyn CredentialRefresher>,
        registries: RegistriesConfig,
        tokens: &TokenConfig,
    ) -> Self {
        Self {
            registries,
            refresh_interval: tokens.refresh_interval,
            proactive_threshold: tokens.proactive_threshold,
            failure_cooldown: tokens.failure_cooldown,
            refresher,
            last_refresh: Mutex::new(HashMap::new()),
            last_failure: Mutex::new(HashMap::new()),
            host_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn family(&self, host: &str) -> RegistryFamily {
        if self.registries.is_vendor_host(host) {
            RegistryFamily::Primary
        } else if self.registries.is_cloud_host(host) {
            RegistryFamily::Cloud
        } else {
            RegistryFamily::Other
        }
    }

    fn age(&self, host: &str) -> Option<Duration> {
        self.last_refresh
            .lock()
            .get(host)
            .map(|stamp| stamp.elapsed())
    }

    /// Never-refreshed vendor hosts need an initial refresh; other unseen hosts do not.
    pub fn needs_refresh(&self, host: &str) -> bool {
        match self.age(host) {
            None => self.registries.is_vendor_host(host),
            Some(age) => age >= self.refresh_interval,
        }
    }

    /// Like `needs_refresh`, but also true for credentials within the
    /// proactive threshold of expiring.
    pub fn needs_proactive_refresh(&self, host: &str) -> bool {
        match self.age(host) {
            None => self.registries.is_vendor_host(host),
            Some(age) => age >= self.refresh_interval.saturating_sub(self.proactive_threshold),
        }
    }

    /// Start the clock for a non-vendor host on its first use.
    pub fn record_use(&self, host: &str) {
        if self.registries.is_vendor_host(host) {
            return;
        }
        self.last_refresh
            .lock()
            .entry(host.to_string())
            .or_insert_with(Instant::now);
    }

    /// True while a recent failed refresh holds the host off.
    pub fn in_cooldown(&self, host: &str) -> bool {
        self.last_failure
            .lock()
            .get(host)
            .is_some_and(|stamp| stamp.elapsed() < self.failure_cooldown)
    }

    pub fn status(&self, host: &str) -> TokenStatus {
        let last_refresh = self.last_refresh.lock().get(host).copied();
        TokenStatus {
            host: host.to_string(),
            last_refresh,
            age: last_refresh.map(|stamp| stamp.elapsed()),
            refresh_interval: self.refresh_interval,
            proactive_threshold: self.proactive_threshold,
            needs_refresh: self.needs_refresh(host),
            needs_proactive_refresh: self.needs_proactive_refresh(host),
        }
    }

    /// Refresh the host's credentials when they are missing or stale.
    pub async fn refresh_if_needed(&self, host: &str) -> Result<(), CredentialError> {
        self.refresh_when(host, Self::needs_refresh).await
    }

    /// Refresh credentials that would expire during the next batch.
    pub async fn refresh_proactively(&self, host: &str) -> Result<(), CredentialError> {
        self.refresh_when(host, Self::needs_proactive_refresh).await
    }

    async fn refresh_when(
        &self,
        host: &str,
        due: fn(&Self, &str) -> bool,
    ) -> Result<(), CredentialError> {
        if !due(self, host) || self.in_cooldown(host) {
            return Ok(());
        }

        let lock = self.host_lock(host);
        let _guard = lock.lock().await;

        // Another worker may have refreshed, or failed to, while we waited.
        if !due(self, host) {
            tracing::debug!("Credentials for {} already refreshed", host);
            return Ok(());
        }
        if self.in_cooldown(host) {
            tracing::debug!("Refresh for {} failed recently, waiting for the next window", host);
            return Ok(());
        }

        let result = self.dispatch(host).await;
        if result.is_err() {
            self.last_failure.lock().insert(host.to_string(), Instant::now());
        }
        result
    }

    async fn dispatch(&self, host: &str) -> Result<(), CredentialError> {
        match self.family(host) {
            RegistryFamily::Primary => {
                tracing::info!("Refreshing credentials for {}", host);
                self.refresher.refresh_primary().await?;
                self.stamp([host, self.registries.vendor_domain.as_str()]);
            }
            RegistryFamily::Cloud => {
                tracing::info!("Refreshing cloud registry credentials for {}", host);
                self.refresher.refresh_cloud().await?;
                let hosts = self.registries.cloud_login_hosts();
                self.stamp(hosts.iter().map(String::as_str).chain([host]));
            }
            RegistryFamily::Other => {
                tracing::debug!("No automatic credential refresh available for {}", host);
            }
        }
        Ok(())
    }

    fn stamp<'a>(&self, hosts: impl IntoIterator<Item = &'a str>) {
        let now = Instant::now();
        let mut map = self.last_refresh.lock();
        let mut failures = self.last_failure.lock();
        for host in hosts {
            map.insert(host.to_string(), now);
            failures.remove(host);
        }
    }

    fn host_lock(&self, host: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.host_locks
            .lock()
            .entry(host.to_string())
            .or_default()
            .clone()
    }
}
