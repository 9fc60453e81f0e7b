//! Transport abstraction between the session and a BLE stack.
//!
//! The session only needs to find lights, open one link, write frames and
//! receive notifications. [`Transport`] captures exactly that, so the same
//! session code runs over [`BleTransport`](crate::BleTransport) in production
//! and [`MockTransport`](crate::MockTransport) in tests.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

use gamalta_types::DeviceDescriptor;
use gamalta_types::uuid::DEVICE_NAME_PREFIX;

use crate::error::Result;

/// Something that arrived on the notify characteristic, or the end of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw notification bytes.
    Notification(Vec<u8>),
    /// The link went down.
    Disconnected,
}

/// Stream of transport events for one connection.
pub type NotificationStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan for devices.
    pub duration: Duration,
    /// Only return devices whose advertised name contains this (case-insensitive).
    pub name_filter: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            name_filter: Some(DEVICE_NAME_PREFIX.to_string()),
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set scan duration in seconds.
    #[must_use]
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    /// Only return devices whose name contains `filter`.
    #[must_use]
    pub fn name_filter(mut self, filter: impl Into<String>) -> Self {
        self.name_filter = Some(filter.into());
        self
    }

    /// Scan for all BLE devices, not just Gamalta lights.
    #[must_use]
    pub fn all_devices(mut self) -> Self {
        self.name_filter = None;
        self
    }

    /// Whether an advertised name passes the filter.
    pub fn matches(&self, name: Option<&str>) -> bool {
        match (&self.name_filter, name) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(filter), Some(name)) => name.to_lowercase().contains(&filter.to_lowercase()),
        }
    }
}

/// BLE operations the session depends on.
///
/// Implementations hold at most one link at a time. All frames are written
/// without response.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Scan for nearby lights.
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<DeviceDescriptor>>;

    /// Open a link to the device with this name, address or identifier.
    async fn connect(&self, address: &str) -> Result<()>;

    /// Write one frame to the command characteristic.
    async fn write(&self, frame: &[u8]) -> Result<()>;

    /// Enable notifications and return the event stream for this link.
    async fn subscribe(&self) -> Result<NotificationStream>;

    /// Close the link. Closing an already closed link is a no-op.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the link is up.
    async fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_options_defaults() {
        let options = ScanOptions::default();
        assert_eq!(options.duration, Duration::from_secs(5));
        assert_eq!(options.name_filter.as_deref(), Some("Gamalta"));
    }

    #[test]
    fn test_scan_options_matches() {
        let options = ScanOptions::new();
        assert!(options.matches(Some("Gamalta-A1B2")));
        assert!(options.matches(Some("GAMALTA light")));
        assert!(!options.matches(Some("Hydra 64HD")));
        assert!(!options.matches(None));

        let all = ScanOptions::new().all_devices();
        assert!(all.matches(None));
        assert!(all.matches(Some("anything")));
    }

    #[test]
    fn test_scan_options_builder() {
        let options = ScanOptions::new().duration_secs(10).name_filter("Tank");
        assert_eq!(options.duration, Duration::from_secs(10));
        assert!(options.matches(Some("tank light")));
    }
}
