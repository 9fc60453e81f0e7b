//! High-level async API for one Gamalta light.
//!
//! [`Client`] owns one [`Session`] and turns device operations into command
//! sequences. Every operation except [`Client::connect`] requires a ready
//! session and fails with [`Error::NotReady`] otherwise.

use std::sync::Arc;

use time::Time;
use tokio::sync::watch;
use tracing::{debug, info};

use gamalta_types::{
    Color, DeviceDescriptor, DeviceState, LightningConfig, MAX_BRIGHTNESS, Mode, Response,
    SessionState,
};

use crate::ble::BleTransport;
use crate::commands::{Command, SceneQuery, activation_sequence};
use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::events::EventReceiver;
use crate::scene::SceneDefinition;
use crate::session::{Session, SessionConfig, Snapshot, local_now};
use crate::transport::{ScanOptions, Transport};

/// Contents of one timer slot.
///
/// The two data bytes are passed through unchanged.
// TODO: decode the slot bytes into on/off times once captures with known
// timer settings are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSlot {
    /// Slot number.
    pub slot: u8,
    /// Raw slot contents.
    pub raw: [u8; 2],
}

/// A connected Gamalta light.
///
/// # Example
///
/// ```no_run
/// use gamalta_core::{Client, Color, Mode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), gamalta_core::Error> {
///     let client = Client::new();
///     client.connect(None).await?;
///
///     client.set_color(Color::rgb(0, 64, 255)).await?;
///     client.set_brightness(60).await?;
///     client.set_mode(Mode::CoralReef).await?;
///
///     let state = client.query_state().await?;
///     println!("{}", state);
///
///     client.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Client<T: Transport = BleTransport> {
    session: Session<T>,
}

impl<T: Transport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .finish()
    }
}

impl Client<BleTransport> {
    /// Client over the host Bluetooth stack with default settings.
    pub fn new() -> Self {
        Self::with_session(Session::new(BleTransport::new()))
    }
}

impl Default for Client<BleTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Client<T> {
    /// Client over any transport.
    pub fn with_transport(transport: T) -> Self {
        Self::with_session(Session::new(transport))
    }

    /// Client over any transport with custom session settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is unusable.
    pub fn with_config(transport: T, config: SessionConfig) -> Result<Self> {
        Ok(Self::with_session(Session::with_config(transport, config)?))
    }

    /// Client owning an existing session.
    pub fn with_session(session: Session<T>) -> Self {
        Self { session }
    }

    /// The underlying session.
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        self.session.transport()
    }

    // --- Connection ---

    /// Connect and run the handshake.
    ///
    /// With `None`, scans for lights and picks the one with the strongest
    /// signal. A faulted session is reset first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if no light is found, or the first
    /// failing handshake step's error.
    pub async fn connect(&self, address: Option<&str>) -> Result<DeviceDescriptor> {
        if self.session.state() == SessionState::Faulted {
            debug!("Resetting faulted session before connecting");
            let _ = self.session.disconnect().await;
        }

        let device = match address {
            Some(address) => DeviceDescriptor {
                name: None,
                identifier: address.to_string(),
                address: address.to_string(),
                rssi: None,
            },
            None => self.strongest_device().await?,
        };

        self.session.establish(&device.identifier).await?;
        info!(device = %device.identifier, "Light ready");
        Ok(device)
    }

    async fn strongest_device(&self) -> Result<DeviceDescriptor> {
        let devices = self.transport().scan(&ScanOptions::default()).await?;
        devices
            .into_iter()
            .max_by_key(|d| d.rssi.unwrap_or(i16::MIN))
            .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesInRange))
    }

    /// Disconnect from the light.
    ///
    /// # Errors
    ///
    /// Returns the transport's disconnect error.
    pub async fn disconnect(&self) -> Result<()> {
        self.session.disconnect().await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether commands are accepted.
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Last known device state.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.session.snapshot()
    }

    /// Watch device state changes.
    pub fn watch_snapshot(&self) -> watch::Receiver<Option<Snapshot>> {
        self.session.watch_snapshot()
    }

    /// Subscribe to session events.
    pub fn events(&self) -> EventReceiver {
        self.session.subscribe_events()
    }

    // --- Lighting ---

    /// Switch the light on.
    pub async fn power_on(&self) -> Result<()> {
        self.session.execute(Command::power(true)).await.map(drop)
    }

    /// Switch the light off.
    pub async fn power_off(&self) -> Result<()> {
        self.session.execute(Command::power(false)).await.map(drop)
    }

    /// Set and store a colour.
    pub async fn set_color(&self, color: Color) -> Result<()> {
        self.session.execute(Command::set_color(color)).await.map(drop)
    }

    /// Set a colour from wide channel values, each checked to be 0-255.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a channel is out of range.
    pub async fn set_color_channels(
        &self,
        red: i32,
        green: i32,
        blue: i32,
        cool_white: i32,
        warm_white: i32,
    ) -> Result<()> {
        let command = Command::set_color_channels(red, green, blue, cool_white, warm_white)?;
        self.session.execute(command).await.map(drop)
    }

    /// Show a colour without storing it.
    pub async fn preview_color(&self, color: Color) -> Result<()> {
        self.session.execute(Command::preview_color(color)).await.map(drop)
    }

    /// Set brightness in percent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] above 100.
    pub async fn set_brightness(&self, percent: u8) -> Result<()> {
        self.session.execute(Command::brightness(percent)).await.map(drop)
    }

    /// Select a mode.
    ///
    /// Scheduled modes are engaged with the current colour and brightness
    /// first, then the mode select and scene activation, so the light does
    /// not flash through a stale state. A reported brightness above 100 is
    /// sent as 100.
    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        let current = match self.session.snapshot() {
            Some(snapshot) => snapshot.state,
            None => self.session.query_state().await?,
        };
        let brightness = current.brightness.min(MAX_BRIGHTNESS);
        let commands = activation_sequence(mode, current.color, brightness);
        self.session.execute_all(&commands).await.map(drop)
    }

    /// Flash lightning once.
    pub async fn preview_lightning(&self) -> Result<()> {
        self.session
            .execute(Command::lightning_preview(&LightningConfig::preview()))
            .await
            .map(drop)
    }

    /// Store a lightning schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for out-of-range intensity or frequency.
    pub async fn configure_lightning(&self, config: &LightningConfig) -> Result<()> {
        self.session
            .execute(Command::lightning(config))
            .await
            .map(drop)
    }

    /// Ask the light for its state.
    pub async fn query_state(&self) -> Result<DeviceState> {
        self.session.query_state().await
    }

    // --- Device information ---

    /// Read the advertised device name.
    pub async fn query_name(&self) -> Result<String> {
        match self.session.execute(Command::NameQuery).await? {
            Some(Response::DeviceName { name }) => Ok(name),
            other => Err(unexpected("name query", other)),
        }
    }

    /// Rename the light.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for empty, non-ASCII or overlong names.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        self.session
            .execute(Command::SetName(name.to_string()))
            .await
            .map(drop)
    }

    /// Read the serial number.
    pub async fn query_serial(&self) -> Result<String> {
        match self.session.execute(Command::SerialQuery).await? {
            Some(Response::Serial { raw }) => Ok(String::from_utf8_lossy(&raw)
                .trim_end_matches('\0')
                .to_string()),
            other => Err(unexpected("serial query", other)),
        }
    }

    // --- Timers ---

    /// Program a timer slot.
    pub async fn set_timer(&self, slot: u8, raw: [u8; 2]) -> Result<()> {
        self.session
            .execute(Command::TimerSet { slot, raw })
            .await
            .map(drop)
    }

    /// Read a timer slot.
    pub async fn query_timer(&self, slot: u8) -> Result<TimerSlot> {
        match self.session.execute(Command::TimerQuery(slot)).await? {
            Some(Response::TimerStatus { slot: reported, raw }) => {
                // Replies carry either [slot, b0, b1] or just [b0, b1]
                let bytes = if reported.is_some() && raw.len() >= 3 {
                    &raw[1..3]
                } else {
                    &raw[..raw.len().min(2)]
                };
                let mut data = [0u8; 2];
                data[..bytes.len()].copy_from_slice(bytes);
                Ok(TimerSlot {
                    slot: reported.unwrap_or(slot),
                    raw: data,
                })
            }
            other => Err(unexpected("timer query", other)),
        }
    }

    // --- Scenes ---

    /// Query a stored scene.
    pub async fn query_scene(&self, query: SceneQuery, scene: u8) -> Result<Response> {
        self.session
            .execute(Command::SceneQuery { query, scene })
            .await?
            .ok_or_else(|| unexpected("scene query", None))
    }

    /// Write a custom scene and switch to it.
    ///
    /// The edit and the activation run as one uninterrupted sequence. The
    /// activation uses the point active at the current local time.
    pub async fn edit_scene(&self, scene: &SceneDefinition) -> Result<()> {
        self.edit_scene_at(scene, local_now().time()).await
    }

    /// [`Client::edit_scene`] with an explicit time of day.
    pub async fn edit_scene_at(&self, scene: &SceneDefinition, at: Time) -> Result<()> {
        let mut commands = scene.edit_commands()?;
        let active = scene.active_point(at);
        commands.extend(activation_sequence(
            scene.kind.mode(),
            active.color,
            active.brightness,
        ));
        self.session.execute_all(&commands).await.map(drop)
    }
}

fn unexpected(what: &str, response: Option<Response>) -> Error {
    Error::MalformedFrame(format!("unexpected reply to {}: {:?}", what, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, MockTransportBuilder};
    use gamalta_types::opcode;

    async fn connected(transport: MockTransport) -> Client<MockTransport> {
        let client = Client::with_transport(transport);
        client.connect(Some("Gamalta Mock")).await.unwrap();
        client.transport().clear_written().await;
        client
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_by_scan_picks_device() {
        let client = Client::with_transport(MockTransport::new("Gamalta Mock"));
        let device = client.connect(None).await.unwrap();
        assert_eq!(device.name.as_deref(), Some("Gamalta Mock"));
        assert!(client.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_without_devices() {
        let client = Client::with_transport(MockTransport::new("Other Light"));
        let result = client.connect(None).await;
        assert!(matches!(
            result,
            Err(Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesInRange))
        ));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_before_connect_not_ready() {
        let client = Client::with_transport(MockTransport::new("Gamalta Mock"));
        assert!(matches!(client.power_on().await, Err(Error::NotReady { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_color_channels_rejects_out_of_range() {
        let client = connected(MockTransport::new("Gamalta Mock")).await;
        let result = client.set_color_channels(256, 0, 0, 0, 0).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert!(client.transport().written_frames().await.is_empty());

        client.set_color_channels(255, 0, 0, 0, 0).await.unwrap();
        let frames = client.transport().written_frames().await;
        assert_eq!(&frames[0][2..], &[opcode::COLOR, 0x06, 255, 0, 0, 0, 0, 0x01]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_manual_sends_mode_only() {
        let client = connected(MockTransportBuilder::new().mode(Mode::CoralReef).build()).await;
        client.set_mode(Mode::Manual).await.unwrap();
        assert_eq!(client.transport().written_opcodes().await, vec![opcode::MODE]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_mode_clamps_reported_brightness() {
        let transport = MockTransportBuilder::new().brightness(150).build();
        let client = connected(transport).await;
        assert_eq!(client.snapshot().unwrap().state.brightness, 150);

        client.set_mode(Mode::CoralReef).await.unwrap();

        let frames = client.transport().written_frames().await;
        let brightness = frames
            .iter()
            .find(|f| f[2] == opcode::BRIGHTNESS)
            .expect("brightness frame");
        assert_eq!(&brightness[2..], &[opcode::BRIGHTNESS, 0x01, 100]);
        assert!(client.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_information() {
        let transport = MockTransportBuilder::new().device_name("Reef Tank").build();
        let client = connected(transport).await;

        assert_eq!(client.query_name().await.unwrap(), "Reef Tank");
        client.set_name("Nano").await.unwrap();
        assert_eq!(client.query_name().await.unwrap(), "Nano");
        assert_eq!(
            client.query_serial().await.unwrap(),
            crate::mock::MOCK_SERIAL
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_round_trip_through_device() {
        let client = connected(MockTransport::new("Gamalta Mock")).await;
        client.set_timer(3, [0x12, 0x34]).await.unwrap();
        let slot = client.query_timer(3).await.unwrap();
        assert_eq!(slot, TimerSlot { slot: 3, raw: [0x12, 0x34] });
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_scene_name() {
        let client = connected(MockTransport::new("Gamalta Mock")).await;
        let response = client.query_scene(SceneQuery::Name, 0x0B).await.unwrap();
        assert_eq!(
            response,
            Response::SceneName {
                name: "Custom".to_string()
            }
        );
    }
}
