//! btleplug-backed [`Transport`].
//!
//! Gamalta lights expose one vendor service with a write characteristic
//! (`fff3`) and a notify characteristic (`fff4`). Frames are written without
//! response; replies arrive as notifications.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::{StreamExt, future, stream};
use tokio::sync::{OnceCell, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gamalta_types::DeviceDescriptor;
use gamalta_types::uuid::{NOTIFY_CHARACTERISTIC, WRITE_CHARACTERISTIC};

use crate::error::{Error, Result};
use crate::scan::{create_identifier, find_device, format_peripheral_id, get_adapter, scan_with_adapter};
use crate::transport::{NotificationStream, ScanOptions, Transport, TransportEvent};

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single characteristic write.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for BLE connection timeouts.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gamalta_core::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connection_timeout(Duration::from_secs(20));
/// assert_eq!(config.connection_timeout, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing the GATT link.
    pub connection_timeout: Duration,
    /// Timeout for service discovery.
    pub discovery_timeout: Duration,
    /// Timeout for a single write.
    pub write_timeout: Duration,
    /// Scan settings used to locate the light before connecting.
    pub scan: ScanOptions,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            scan: ScanOptions::default(),
        }
    }
}

impl ConnectionConfig {
    /// Config for weak RF environments.
    pub fn challenging_environment() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            discovery_timeout: Duration::from_secs(20),
            write_timeout: Duration::from_secs(10),
            scan: ScanOptions::default().duration_secs(10),
        }
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the scan options used to locate the light.
    #[must_use]
    pub fn scan(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }
}

/// An open GATT link.
struct Link {
    /// Kept alive for the lifetime of the peripheral connection.
    adapter: Adapter,
    peripheral: Peripheral,
    address: String,
    write: Characteristic,
    notify: Characteristic,
}

/// A [`Transport`] over the host Bluetooth stack.
///
/// # Cleanup
///
/// Call [`Transport::disconnect`] (normally through
/// [`Session::disconnect`](crate::Session::disconnect)) before dropping. A
/// transport dropped while linked logs a warning and disconnects in the
/// background on a best-effort basis.
pub struct BleTransport {
    config: ConnectionConfig,
    adapter: OnceCell<Adapter>,
    link: RwLock<Option<Link>>,
    disconnected: AtomicBool,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("config", &self.config)
            .field("disconnected", &self.disconnected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for BleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BleTransport {
    /// Create a transport with default timeouts.
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a transport with custom timeouts.
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            adapter: OnceCell::new(),
            link: RwLock::new(None),
            disconnected: AtomicBool::new(true),
        }
    }

    /// The connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Address or identifier of the linked light.
    pub async fn address(&self) -> Option<String> {
        self.link.read().await.as_ref().map(|l| l.address.clone())
    }

    async fn adapter(&self) -> Result<&Adapter> {
        self.adapter.get_or_try_init(get_adapter).await
    }
}

/// Pass `result` through, dropping the half-open link first if it failed.
async fn release_on_error<T, F, Fut>(result: Result<T>, disconnect: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    if let Err(e) = &result {
        debug!(error = %e, "Releasing partially opened link");
        let _ = disconnect().await;
    }
    result
}

fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or_else(|| Error::characteristic_not_found(uuid.to_string(), peripheral.services().len()))
}

#[async_trait]
impl Transport for BleTransport {
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<DeviceDescriptor>> {
        let adapter = self.adapter().await?;
        scan_with_adapter(adapter, options).await
    }

    #[tracing::instrument(level = "info", skip(self), fields(connect_timeout = ?self.config.connection_timeout))]
    async fn connect(&self, address: &str) -> Result<()> {
        let (adapter, peripheral) = find_device(address, &self.config.scan).await?;

        info!("Connecting to device...");
        timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", self.config.connection_timeout))??;
        info!("Connected!");

        info!("Discovering services...");
        let discovered = timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout));
        release_on_error(discovered.and_then(|r| r.map_err(Error::from)), || {
            peripheral.disconnect()
        })
        .await?;
        debug!("Found {} services", peripheral.services().len());

        let characteristics = find_characteristic(&peripheral, WRITE_CHARACTERISTIC)
            .and_then(|w| Ok((w, find_characteristic(&peripheral, NOTIFY_CHARACTERISTIC)?)));
        if let Err(e) = &characteristics {
            warn!(error = %e, "Not a Gamalta light, disconnecting");
        }
        let (write, notify) = release_on_error(characteristics, || peripheral.disconnect()).await?;

        let properties = peripheral.properties().await.map_err(Error::from);
        let address = release_on_error(properties, || peripheral.disconnect())
            .await?
            .map(|p| create_identifier(&p.address.to_string(), &peripheral.id()))
            .unwrap_or_else(|| format_peripheral_id(&peripheral.id()));

        *self.link.write().await = Some(Link {
            adapter,
            peripheral,
            address,
            write,
            notify,
        });
        self.disconnected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, frame: &[u8]) -> Result<()> {
        let link = self.link.read().await;
        let link = link.as_ref().ok_or(Error::NotConnected)?;
        timeout(
            self.config.write_timeout,
            link.peripheral
                .write(&link.write, frame, WriteType::WithoutResponse),
        )
        .await
        .map_err(|_| Error::timeout("write frame", self.config.write_timeout))??;
        Ok(())
    }

    async fn subscribe(&self) -> Result<NotificationStream> {
        let link = self.link.read().await;
        let link = link.as_ref().ok_or(Error::NotConnected)?;

        link.peripheral.subscribe(&link.notify).await?;
        let notifications = link.peripheral.notifications().await?;
        let central_events = link.adapter.events().await?;
        debug!(characteristic = %link.notify.uuid, "Notifications enabled");

        let notify_uuid = link.notify.uuid;
        let frames = notifications.filter_map(move |n| {
            future::ready((n.uuid == notify_uuid).then_some(TransportEvent::Notification(n.value)))
        });

        let peripheral_id = link.peripheral.id();
        let lost = central_events.filter_map(move |event| {
            future::ready(match event {
                CentralEvent::DeviceDisconnected(id) if id == peripheral_id => {
                    Some(TransportEvent::Disconnected)
                }
                _ => None,
            })
        });

        Ok(Box::pin(stream::select(frames, lost)))
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        let Some(link) = self.link.write().await.take() else {
            return Ok(());
        };
        if let Err(e) = link.peripheral.unsubscribe(&link.notify).await {
            debug!(error = %e, "Unsubscribe failed (link may already be down)");
        }
        link.peripheral.disconnect().await?;
        info!(address = %link.address, "Transport disconnected");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match self.link.read().await.as_ref() {
            Some(link) => link.peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(link) = self.link.get_mut().take() else {
            return;
        };

        warn!(
            address = %link.address,
            "BleTransport dropped without calling disconnect() - performing best-effort cleanup. \
             For reliable cleanup, call disconnect().await before dropping."
        );

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = link.peripheral.disconnect().await {
                    debug!(
                        address = %link.address,
                        error = %e,
                        "Best-effort disconnect failed (device may already be disconnected)"
                    );
                } else {
                    debug!(address = %link.address, "Best-effort disconnect completed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    #[tokio::test]
    async fn test_release_on_error_disconnects_failed_step() {
        let counter = AtomicU32::new(0);
        let disconnects = &counter;
        let disconnect = move || async move {
            disconnects.fetch_add(1, Ordering::SeqCst);
        };

        let result: Result<u8> =
            release_on_error(Err(Error::transport("properties unavailable")), disconnect).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_on_error_keeps_link_on_success() {
        let counter = AtomicU32::new(0);
        let disconnects = &counter;
        let disconnect = move || async move {
            disconnects.fetch_add(1, Ordering::SeqCst);
        };

        assert_eq!(release_on_error(Ok(7u8), disconnect).await.unwrap(), 7);
        assert_eq!(disconnects.load(Ordering::SeqCst), 0);
    }
}
