//! Mock transport implementation for testing.
//!
//! This module provides a scripted light that can be used for unit and
//! scenario testing without requiring actual BLE hardware.
//!
//! The [`MockTransport`] implements the [`Transport`] trait, so a
//! [`Session`](crate::Session) or [`Client`](crate::Client) runs over it
//! unchanged.
//!
//! # Features
//!
//! - **Frame capture**: every written frame is recorded for assertions
//! - **Device simulation**: power, colour, brightness, mode, name and timer
//!   writes update a simulated state that state queries report back
//! - **Failure injection**: silence individual opcodes, refuse connections,
//!   drop the link, inject arbitrary notifications
//! - **Latency simulation**: delay replies to exercise timeouts

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use gamalta_types::{Color, DeviceDescriptor, DeviceState, Mode, Packet, opcode};

use crate::error::{Error, Result};
use crate::transport::{NotificationStream, ScanOptions, Transport, TransportEvent};

/// Serial number reported by the mock.
pub const MOCK_SERIAL: &str = "GML0000MOCK";

/// A mock Gamalta light for testing.
///
/// Implements [`Transport`] for use in generic code and testing.
///
/// # Example
///
/// ```
/// use gamalta_core::{MockTransport, Transport};
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new("Gamalta Mock");
///     transport.connect("Gamalta Mock").await.unwrap();
///     assert!(transport.is_connected().await);
///
///     transport.write(&[0xA5, 0x10, 0x03, 0x00]).await.unwrap();
///     assert_eq!(transport.written_frames().await, vec![vec![0xA5, 0x10, 0x03, 0x00]]);
/// }
/// ```
pub struct MockTransport {
    name: String,
    address: String,
    rssi: i16,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    auto_respond: AtomicBool,
    /// Simulated reply latency in milliseconds (0 = reply immediately).
    reply_latency_ms: AtomicU64,
    connect_count: AtomicU32,
    state: RwLock<DeviceState>,
    device_name: RwLock<String>,
    timers: RwLock<HashMap<u8, [u8; 2]>>,
    silenced: RwLock<HashSet<u8>>,
    written: Mutex<Vec<Vec<u8>>>,
    sender: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockTransport {
    /// Create a new mock light with default state.
    pub fn new(name: &str) -> Self {
        MockTransportBuilder::new().name(name).build()
    }

    /// Get the advertised name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the mock address.
    pub fn address(&self) -> &str {
        &self.address
    }

    // --- Test control methods ---

    /// Every frame written so far, in order.
    pub async fn written_frames(&self) -> Vec<Vec<u8>> {
        self.written.lock().await.clone()
    }

    /// Every well-formed frame written so far, decoded.
    pub async fn written_packets(&self) -> Vec<Packet> {
        self.written
            .lock()
            .await
            .iter()
            .filter_map(|frame| Packet::decode(frame).ok())
            .collect()
    }

    /// Opcodes of every well-formed frame written so far.
    pub async fn written_opcodes(&self) -> Vec<u8> {
        self.written_packets()
            .await
            .iter()
            .map(|packet| packet.command)
            .collect()
    }

    /// Forget recorded frames.
    pub async fn clear_written(&self) {
        self.written.lock().await.clear();
    }

    /// Stop replying to `opcode`.
    pub async fn silence(&self, opcode: u8) {
        self.silenced.write().await.insert(opcode);
    }

    /// Resume replying to `opcode`.
    pub async fn unsilence(&self, opcode: u8) {
        self.silenced.write().await.remove(&opcode);
    }

    /// Enable or disable all automatic replies.
    pub fn set_auto_respond(&self, enabled: bool) {
        self.auto_respond.store(enabled, Ordering::Relaxed);
    }

    /// Make the next connection attempts fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Set simulated reply latency.
    ///
    /// Replies are delivered this long after the request is written.
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_reply_latency(&self, latency: Duration) {
        self.reply_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Replace the simulated device state.
    pub async fn set_state(&self, state: DeviceState) {
        *self.state.write().await = state;
    }

    /// Current simulated device state.
    pub async fn device_state(&self) -> DeviceState {
        *self.state.read().await
    }

    /// Current simulated device name.
    pub async fn device_name(&self) -> String {
        self.device_name.read().await.clone()
    }

    /// Raw contents of a timer slot.
    pub async fn timer(&self, slot: u8) -> Option<[u8; 2]> {
        self.timers.read().await.get(&slot).copied()
    }

    /// Number of successful connections.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Deliver arbitrary bytes as a notification.
    pub async fn inject_notification(&self, data: Vec<u8>) {
        self.emit(TransportEvent::Notification(data)).await;
    }

    /// Simulate the light dropping the link.
    pub async fn drop_connection(&self) {
        self.connected.store(false, Ordering::Relaxed);
        self.emit(TransportEvent::Disconnected).await;
        self.sender.lock().await.take();
    }

    async fn emit(&self, event: TransportEvent) {
        if let Some(sender) = self.sender.lock().await.as_ref() {
            let _ = sender.unbounded_send(event);
        }
    }

    fn check_connected(&self) -> Result<()> {
        if !self.connected.load(Ordering::Relaxed) {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }

    /// Apply a request to the simulated device and build its reply.
    async fn handle_request(&self, request: &Packet) -> Option<Packet> {
        let payload = request.payload.as_ref();
        let mut reply_payload = Vec::new();

        match request.command {
            opcode::POWER => {
                if let Some(&byte) = payload.first() {
                    self.state.write().await.power = byte == 0x01;
                }
            }
            opcode::COLOR => {
                if payload.len() >= 6 && payload[5] == 0x01 {
                    let mut state = self.state.write().await;
                    state.color = Color::new(payload[0], payload[1], payload[2], payload[3], payload[4]);
                    state.power = true;
                }
            }
            opcode::BRIGHTNESS => {
                if let Some(&percent) = payload.first() {
                    self.state.write().await.brightness = percent;
                }
            }
            opcode::MODE => {
                if let Some(mode) = payload.first().and_then(|b| Mode::try_from(*b).ok()) {
                    let mut state = self.state.write().await;
                    state.mode = mode;
                    state.power = true;
                }
            }
            opcode::NAME_SET => {
                *self.device_name.write().await = String::from_utf8_lossy(payload).to_string();
            }
            opcode::TIMER_SET => {
                if payload.len() >= 3 {
                    self.timers
                        .write()
                        .await
                        .insert(payload[0], [payload[1], payload[2]]);
                }
            }
            opcode::STATE_QUERY => {
                reply_payload = self.state.read().await.to_payload().to_vec();
            }
            opcode::NAME_QUERY => {
                reply_payload = self.device_name.read().await.as_bytes().to_vec();
            }
            opcode::SERIAL_QUERY => {
                reply_payload = MOCK_SERIAL.as_bytes().to_vec();
            }
            opcode::TIMER_QUERY => {
                if let Some(&slot) = payload.first() {
                    let raw = self.timers.read().await.get(&slot).copied().unwrap_or([0, 0]);
                    reply_payload = vec![slot, raw[0], raw[1]];
                }
            }
            opcode::SCENE_NAME_QUERY => {
                reply_payload = b"Custom".to_vec();
            }
            _ => {}
        }

        if !self.auto_respond.load(Ordering::Relaxed)
            || opcode::request_for(opcode::response_for(request.command)).is_none()
            || self.silenced.read().await.contains(&request.command)
        {
            return None;
        }

        Some(Packet::new(
            request.sequence,
            opcode::response_for(request.command),
            reply_payload.len() as u8,
            reply_payload,
        ))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn scan(&self, options: &ScanOptions) -> Result<Vec<DeviceDescriptor>> {
        if !options.matches(Some(&self.name)) {
            return Ok(Vec::new());
        }
        Ok(vec![DeviceDescriptor {
            name: Some(self.name.clone()),
            identifier: self.address.clone(),
            address: self.address.clone(),
            rssi: Some(self.rssi),
        }])
    }

    async fn connect(&self, address: &str) -> Result<()> {
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::device_not_found(address));
        }

        let wanted = address.to_lowercase();
        if wanted != self.address.to_lowercase() && !self.name.to_lowercase().contains(&wanted) {
            return Err(Error::device_not_found(address));
        }

        self.connected.store(true, Ordering::Relaxed);
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn write(&self, frame: &[u8]) -> Result<()> {
        self.check_connected()?;
        self.written.lock().await.push(frame.to_vec());

        let Ok(request) = Packet::decode(frame) else {
            debug!("Mock ignoring malformed write");
            return Ok(());
        };
        let Some(reply) = self.handle_request(&request).await else {
            return Ok(());
        };
        let event = TransportEvent::Notification(reply.encode().to_vec());

        let latency = self.reply_latency_ms.load(Ordering::Relaxed);
        if latency == 0 {
            self.emit(event).await;
        } else if let Some(sender) = self.sender.lock().await.clone() {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(latency)).await;
                let _ = sender.unbounded_send(event);
            });
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<NotificationStream> {
        self.check_connected()?;
        let (sender, receiver) = mpsc::unbounded();
        *self.sender.lock().await = Some(sender);
        Ok(Box::pin(receiver))
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Relaxed);
        self.sender.lock().await.take();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Builder for creating mock lights with custom settings.
#[derive(Debug, Clone)]
pub struct MockTransportBuilder {
    name: String,
    address: String,
    rssi: i16,
    state: DeviceState,
    device_name: Option<String>,
    timers: HashMap<u8, [u8; 2]>,
    silenced: HashSet<u8>,
    auto_respond: bool,
    reply_latency: Duration,
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self {
            name: "Gamalta Mock".to_string(),
            address: format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF),
            rssi: -55,
            state: DeviceState {
                power: true,
                mode: Mode::Manual,
                brightness: 80,
                color: Color::white(255, 128),
            },
            device_name: None,
            timers: HashMap::new(),
            silenced: HashSet::new(),
            auto_respond: true,
            reply_latency: Duration::ZERO,
        }
    }
}

impl MockTransportBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the address.
    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    /// Set the advertised signal strength.
    #[must_use]
    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    /// Set the initial device state.
    #[must_use]
    pub fn state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    /// Set the initial colour.
    #[must_use]
    pub fn color(mut self, color: Color) -> Self {
        self.state.color = color;
        self
    }

    /// Set the initial brightness.
    #[must_use]
    pub fn brightness(mut self, brightness: u8) -> Self {
        self.state.brightness = brightness;
        self
    }

    /// Set the initial mode.
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.state.mode = mode;
        self
    }

    /// Set the name reported by name queries (defaults to the advertised name).
    #[must_use]
    pub fn device_name(mut self, name: &str) -> Self {
        self.device_name = Some(name.to_string());
        self
    }

    /// Preload a timer slot.
    #[must_use]
    pub fn timer(mut self, slot: u8, raw: [u8; 2]) -> Self {
        self.timers.insert(slot, raw);
        self
    }

    /// Never reply to `opcode`.
    #[must_use]
    pub fn silence(mut self, opcode: u8) -> Self {
        self.silenced.insert(opcode);
        self
    }

    /// Enable or disable automatic replies.
    #[must_use]
    pub fn auto_respond(mut self, enabled: bool) -> Self {
        self.auto_respond = enabled;
        self
    }

    /// Delay every reply.
    #[must_use]
    pub fn reply_latency(mut self, latency: Duration) -> Self {
        self.reply_latency = latency;
        self
    }

    /// Build the mock light.
    #[must_use]
    pub fn build(self) -> MockTransport {
        let device_name = self.device_name.unwrap_or_else(|| self.name.clone());
        MockTransport {
            name: self.name,
            address: self.address,
            rssi: self.rssi,
            connected: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            auto_respond: AtomicBool::new(self.auto_respond),
            reply_latency_ms: AtomicU64::new(self.reply_latency.as_millis() as u64),
            connect_count: AtomicU32::new(0),
            state: RwLock::new(self.state),
            device_name: RwLock::new(device_name),
            timers: RwLock::new(self.timers),
            silenced: RwLock::new(self.silenced),
            written: Mutex::new(Vec::new()),
            sender: Mutex::new(None),
        }
    }
}
