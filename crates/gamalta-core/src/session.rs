//! Protocol session state machine.
//!
//! A [`Session`] owns one BLE link to one light and drives it through the
//! mandatory lifecycle:
//!
//! ```text
//! Disconnected -> TransportConnected -> Subscribed -> LoggingIn
//!              -> SyncingTime -> Stabilizing -> Ready
//! ```
//!
//! `Faulted` is entered from any state on a handshake timeout or a link
//! failure during command issuance, and is only left through
//! [`Session::disconnect`].
//!
//! # Command channel
//!
//! All writes go through one async mutex that also owns the sequence
//! counter, so concurrent callers queue instead of interleaving. After every
//! write the channel stays locked until the pacing delay has elapsed; the
//! light drops frames that arrive back to back.
//!
//! # Notification pump
//!
//! A background task reads the notify stream. It is the only writer of the
//! device-reported snapshot and the only completer of reply waiters. Replies
//! are matched to the single outstanding waiter by opcode (`request + 1`) in
//! arrival order; the sequence byte is not echoed reliably.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gamalta_types::packet::hex;
use gamalta_types::{DeviceState, Packet, Response, Schedule, SessionState};

use crate::commands::{Command, DEFAULT_PASSWORD};
use crate::error::{Error, Result};
use crate::events::{DisconnectReason, EventDispatcher, EventReceiver, SessionEvent};
use crate::sequence::SequenceCounter;
use crate::transport::{NotificationStream, Transport, TransportEvent};

/// Default delay enforced after every write.
const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// Default time to wait for the login reply.
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time to wait for a steady-state reply.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Default time to wait for each stabilization reply.
const DEFAULT_STABILIZATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Default delay between enabling notifications and the first write.
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Timer slots queried while stabilizing.
const STABILIZATION_TIMER_SLOTS: [u8; 2] = [1, 2];

/// Configuration for session pacing and timeouts.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gamalta_core::SessionConfig;
///
/// let config = SessionConfig::default()
///     .handshake_timeout(Duration::from_secs(8))
///     .password("654321");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Minimum time between consecutive writes.
    pub pacing: Duration,
    /// How long to wait for the login reply before faulting.
    pub handshake_timeout: Duration,
    /// How long to wait for a steady-state reply.
    pub command_timeout: Duration,
    /// How long to wait for each stabilization reply.
    pub stabilization_timeout: Duration,
    /// Delay after enabling notifications.
    pub settle_delay: Duration,
    /// Login password.
    pub password: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            stabilization_timeout: DEFAULT_STABILIZATION_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a new session config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorter timeouts for a light that is close by.
    pub fn fast() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(3),
            command_timeout: Duration::from_secs(1),
            stabilization_timeout: Duration::from_secs(1),
            ..Self::default()
        }
    }

    /// Longer timeouts and pacing for a weak link.
    pub fn patient() -> Self {
        Self {
            pacing: Duration::from_millis(200),
            handshake_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
            stabilization_timeout: Duration::from_secs(4),
            settle_delay: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Set the pacing delay.
    #[must_use]
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the steady-state command timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the stabilization timeout.
    #[must_use]
    pub fn stabilization_timeout(mut self, timeout: Duration) -> Self {
        self.stabilization_timeout = timeout;
        self
    }

    /// Set the settle delay.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the login password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero timeout or an unusable password.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("handshake_timeout", self.handshake_timeout),
            ("command_timeout", self.command_timeout),
            ("stabilization_timeout", self.stabilization_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::invalid_config(format!("{} must be non-zero", name)));
            }
        }
        Command::login(self.password.clone())
            .validate()
            .map_err(|e| Error::invalid_config(format!("password: {}", e)))
    }
}

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// Reported by the light.
    Device,
    /// Predicted after a successful write; replaced by the next report.
    Provisional,
}

/// Last known device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The state.
    pub state: DeviceState,
    /// Origin of the state.
    pub source: SnapshotSource,
}

impl Snapshot {
    /// Whether the light itself reported this state.
    pub fn is_authoritative(&self) -> bool {
        self.source == SnapshotSource::Device
    }
}

struct PendingReply {
    opcode: u8,
    reply: oneshot::Sender<Result<Response>>,
}

/// State shared between the session and its notification pump.
struct Shared {
    state: watch::Sender<SessionState>,
    snapshot: watch::Sender<Option<Snapshot>>,
    pending: Mutex<Option<PendingReply>>,
    busy: AtomicBool,
    events: EventDispatcher,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: watch::Sender::new(SessionState::Disconnected),
            snapshot: watch::Sender::new(None),
            pending: Mutex::new(None),
            busy: AtomicBool::new(false),
            events: EventDispatcher::default(),
        }
    }

    fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Move from exactly `from` to `to`.
    fn advance(&self, from: SessionState, to: SessionState) -> Result<()> {
        let mut actual = from;
        let changed = self.state.send_if_modified(|current| {
            actual = *current;
            if *current == from {
                *current = to;
                true
            } else {
                false
            }
        });
        if !changed {
            return Err(Error::not_ready(actual));
        }
        self.announce(from, to);
        Ok(())
    }

    /// Move to `to` if that is a legal transition from wherever we are.
    fn set_state(&self, to: SessionState) -> Option<SessionState> {
        let mut from = None;
        self.state.send_if_modified(|current| {
            if *current == to || !current.can_transition_to(to) {
                return false;
            }
            from = Some(*current);
            *current = to;
            true
        });
        if let Some(from) = from {
            self.announce(from, to);
        }
        from
    }

    fn fault(&self) {
        if self.current() != SessionState::Disconnected {
            self.set_state(SessionState::Faulted);
        }
    }

    fn announce(&self, from: SessionState, to: SessionState) {
        if to == SessionState::Faulted {
            warn!(%from, "Session faulted");
        } else {
            info!(%from, %to, "Session state changed");
        }
        self.events.send(SessionEvent::StateChanged { from, to });
    }

    fn register(&self, opcode: u8) -> oneshot::Receiver<Result<Response>> {
        let (reply, receiver) = oneshot::channel();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stale) = pending.replace(PendingReply { opcode, reply }) {
            debug!(opcode = stale.opcode, "Replacing stale reply waiter");
        }
        receiver
    }

    fn clear_pending(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Complete the waiter if it expects `opcode`.
    fn complete(&self, opcode: u8, result: Result<Response>) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.as_ref().is_some_and(|p| p.opcode == opcode)
            && let Some(waiter) = pending.take()
        {
            let _ = waiter.reply.send(result);
            return true;
        }
        false
    }

    /// Fail whatever waiter is outstanding.
    fn fail_pending(&self, error: Error) -> bool {
        let waiter = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match waiter {
            Some(waiter) => {
                let _ = waiter.reply.send(Err(error));
                true
            }
            None => false,
        }
    }

    fn handle_notification(&self, data: &[u8]) {
        let packet = match Packet::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(frame = %hex(data), error = %e, "Ignoring malformed notification");
                self.events.send(SessionEvent::MalformedFrame {
                    raw: data.to_vec(),
                    reason: e.to_string(),
                });
                return;
            }
        };
        debug!(frame = %hex(data), "RX");

        match Response::decode(&packet) {
            Ok(Response::Unknown { opcode, raw }) => {
                warn!(opcode = format_args!("0x{:02X}", opcode), "Ignoring unknown notification");
                self.events
                    .send(SessionEvent::UnknownResponse { opcode, raw });
            }
            Ok(response) => {
                if let Response::StateSnapshot { state } = &response {
                    debug!(%state, "Device reported state");
                    self.snapshot.send_replace(Some(Snapshot {
                        state: *state,
                        source: SnapshotSource::Device,
                    }));
                    self.events.send(SessionEvent::Snapshot { state: *state });
                }
                self.events.send(SessionEvent::Response {
                    response: response.clone(),
                });
                self.complete(packet.command, Ok(response));
            }
            Err(e) => {
                warn!(frame = %hex(data), error = %e, "Undecodable reply payload");
                self.events.send(SessionEvent::MalformedFrame {
                    raw: data.to_vec(),
                    reason: e.to_string(),
                });
                self.complete(packet.command, Err(Error::MalformedFrame(e.to_string())));
            }
        }
    }

    fn handle_link_lost(&self) {
        let interrupted = self.fail_pending(Error::transport("link lost while awaiting reply"))
            || self.busy.load(Ordering::SeqCst);
        warn!(interrupted, "Transport link lost");

        if self.current() == SessionState::Ready && !interrupted {
            self.set_state(SessionState::Disconnected);
        } else {
            self.fault();
        }
        self.snapshot.send_replace(None);
        self.events.send(SessionEvent::Disconnected {
            reason: DisconnectReason::LinkLost,
        });
    }
}

async fn run_pump(shared: Arc<Shared>, mut stream: NotificationStream, cancel: CancellationToken) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.next() => event,
        };
        match event {
            Some(TransportEvent::Notification(data)) => shared.handle_notification(&data),
            Some(TransportEvent::Disconnected) | None => {
                if !cancel.is_cancelled() {
                    shared.handle_link_lost();
                }
                break;
            }
        }
    }
    debug!("Notification pump stopped");
}

/// Write side of the session; one holder at a time.
struct CommandChannel {
    sequence: SequenceCounter,
}

/// Marks the command channel busy while a write is in flight.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One protocol session over a [`Transport`].
///
/// # Cleanup
///
/// Call [`Session::disconnect`] before dropping the session. A session
/// dropped while connected stops its notification pump and logs a warning,
/// but cannot close the link.
pub struct Session<T: Transport> {
    transport: Arc<T>,
    config: SessionConfig,
    shared: Arc<Shared>,
    channel: tokio::sync::Mutex<CommandChannel>,
    cancel: Mutex<CancellationToken>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Session<T> {
    /// Create a session with the default configuration.
    pub fn new(transport: T) -> Self {
        Self::build(Arc::new(transport), SessionConfig::default())
    }

    /// Create a session with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is unusable.
    pub fn with_config(transport: T, config: SessionConfig) -> Result<Self> {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    /// Create a session over a transport the caller keeps a handle to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is unusable.
    pub fn with_shared_transport(transport: Arc<T>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(transport, config))
    }

    fn build(transport: Arc<T>, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            shared: Arc::new(Shared::new()),
            channel: tokio::sync::Mutex::new(CommandChannel {
                sequence: SequenceCounter::random(),
            }),
            cancel: Mutex::new(CancellationToken::new()),
            pump: Mutex::new(None),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.current()
    }

    /// Whether commands are accepted.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Watch lifecycle state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Last known device state.
    pub fn snapshot(&self) -> Option<Snapshot> {
        *self.shared.snapshot.borrow()
    }

    /// Watch device state changes.
    pub fn watch_snapshot(&self) -> watch::Receiver<Option<Snapshot>> {
        self.shared.snapshot.subscribe()
    }

    /// Subscribe to session events.
    pub fn subscribe_events(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // --- Lifecycle ---

    /// Open the transport link.
    ///
    /// Starts a fresh sequence counter and clears the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the session is `Disconnected`, or
    /// the transport's connection error.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn open(&self, address: &str) -> Result<()> {
        let state = self.state();
        if state != SessionState::Disconnected {
            return Err(Error::not_ready(state));
        }

        self.channel.lock().await.sequence.reset();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
        self.shared.snapshot.send_replace(None);

        self.transport.connect(address).await?;
        self.shared
            .advance(SessionState::Disconnected, SessionState::TransportConnected)
    }

    /// Enable notifications and start the notification pump.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the link is open, or the
    /// transport's subscription error.
    pub async fn subscribe(&self) -> Result<()> {
        let state = self.state();
        if state != SessionState::TransportConnected {
            return Err(Error::not_ready(state));
        }

        let stream = match self.transport.subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.fault();
                return Err(e);
            }
        };

        let cancel = self.cancel_token();
        let handle = tokio::spawn(run_pump(Arc::clone(&self.shared), stream, cancel.clone()));
        if let Some(old) = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            old.abort();
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = sleep(self.config.settle_delay) => {}
        }

        self.shared
            .advance(SessionState::TransportConnected, SessionState::Subscribed)
    }

    /// Authenticate. Faults the session if the light does not answer in time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless subscribed, [`Error::Timeout`] if
    /// the login reply does not arrive within the handshake timeout.
    pub async fn login(&self) -> Result<()> {
        self.shared
            .advance(SessionState::Subscribed, SessionState::LoggingIn)?;

        let command = Command::login(self.config.password.clone());
        self.handshake_step(&command, self.config.handshake_timeout, false)
            .await
            .map(|_| ())
    }

    /// Set the light's clock to `at` (local time).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless logged in, or the transport's error.
    pub async fn sync_time(&self, at: PrimitiveDateTime) -> Result<()> {
        self.shared
            .advance(SessionState::LoggingIn, SessionState::SyncingTime)?;

        self.handshake_step(&Command::time_sync(at), self.config.handshake_timeout, false)
            .await
            .map(|_| ())
    }

    /// Send the settling queries, then accept commands.
    ///
    /// The light needs a state query and two timer queries after the clock
    /// is set before it answers reliably. Each query waits for its reply up
    /// to the stabilization timeout. A missing or undecodable reply is logged
    /// and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the clock was just synced, or a
    /// transport error.
    pub async fn stabilize(&self) -> Result<()> {
        self.shared
            .advance(SessionState::SyncingTime, SessionState::Stabilizing)?;

        let queries = std::iter::once(Command::StateQuery)
            .chain(STABILIZATION_TIMER_SLOTS.into_iter().map(Command::TimerQuery));
        for query in queries {
            match self
                .handshake_step(&query, self.config.stabilization_timeout, true)
                .await
            {
                Ok(_) => {}
                Err(Error::Timeout { .. }) => {
                    warn!(command = %query, "No reply to stabilization query, continuing");
                }
                Err(Error::MalformedFrame(reason)) => {
                    warn!(command = %query, %reason, "Undecodable stabilization reply, continuing");
                }
                Err(e) => return Err(e),
            }
        }

        self.shared
            .advance(SessionState::Stabilizing, SessionState::Ready)
    }

    /// Login, time sync and stabilization, in order.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn handshake(&self) -> Result<()> {
        self.login().await?;
        self.sync_time(local_now()).await?;
        self.stabilize().await
    }

    /// Open, subscribe and handshake.
    ///
    /// On failure after the link was opened the session is left `Faulted`
    /// with the link released; call [`Session::disconnect`] before retrying.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn establish(&self, address: &str) -> Result<()> {
        self.open(address).await?;

        let result = async {
            self.subscribe().await?;
            self.handshake().await
        }
        .await;

        if let Err(e) = &result {
            warn!(error = %e, "Handshake failed, releasing link");
            self.shared.fault();
            let _ = self.release().await;
            self.shared.events.send(SessionEvent::Disconnected {
                reason: DisconnectReason::HandshakeFailed(e.to_string()),
            });
        }
        result
    }

    /// Close the link and return to `Disconnected`.
    ///
    /// Operations in flight fail with [`Error::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns the transport's disconnect error; the session is
    /// `Disconnected` regardless.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        let was = self.state();
        let result = self.release().await;

        self.shared.set_state(SessionState::Disconnected);
        self.shared.snapshot.send_replace(None);
        if was != SessionState::Disconnected {
            info!("Disconnected");
            self.shared.events.send(SessionEvent::Disconnected {
                reason: DisconnectReason::UserRequested,
            });
        }
        result
    }

    /// Cancel in-flight work, stop the pump and close the transport.
    async fn release(&self) -> Result<()> {
        self.cancel_token().cancel();
        self.shared.fail_pending(Error::Cancelled);

        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            let _ = pump.await;
        }

        match self.transport.disconnect().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Transport disconnect failed");
                Err(e)
            }
        }
    }

    // --- Commands ---

    /// Run one command on a ready session.
    ///
    /// Returns the reply for confirmed commands and `None` for the rest. A
    /// steady-state timeout fails this call only; the session stays ready.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless ready, [`Error::InvalidArgument`]
    /// for bad input, [`Error::Timeout`] if a confirmed reply is missing.
    pub async fn execute(&self, command: Command) -> Result<Option<Response>> {
        let mut responses = self.execute_all(std::slice::from_ref(&command)).await?;
        Ok(responses.pop().flatten())
    }

    /// Run several commands back to back without other callers interleaving.
    ///
    /// Every command is validated before the first is written.
    ///
    /// # Errors
    ///
    /// Same as [`Session::execute`]; stops at the first failure.
    pub async fn execute_all(&self, commands: &[Command]) -> Result<Vec<Option<Response>>> {
        self.ensure_ready()?;
        for command in commands {
            command.validate()?;
        }

        let mut channel = self.channel.lock().await;
        self.ensure_ready()?;
        let cancel = self.cancel_token();

        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            match self
                .exchange(&mut channel, command, self.config.command_timeout, &cancel)
                .await
            {
                Ok(response) => {
                    self.apply_provisional(command);
                    responses.push(response);
                }
                Err(e) => {
                    if matches!(
                        e,
                        Error::Bluetooth(_) | Error::NotConnected | Error::Transport(_)
                    ) {
                        self.shared.fault();
                    }
                    return Err(e);
                }
            }
        }
        Ok(responses)
    }

    /// Ask the light for its state.
    ///
    /// # Errors
    ///
    /// Same as [`Session::execute`].
    pub async fn query_state(&self) -> Result<DeviceState> {
        match self.execute(Command::StateQuery).await? {
            Some(Response::StateSnapshot { state }) => Ok(state),
            other => Err(Error::MalformedFrame(format!(
                "unexpected reply to state query: {:?}",
                other
            ))),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        let state = self.state();
        if state.is_ready() {
            Ok(())
        } else {
            Err(Error::not_ready(state))
        }
    }

    /// One handshake write. Failures fault the session, except a missing or
    /// undecodable reply when `best_effort` is set.
    async fn handshake_step(
        &self,
        command: &Command,
        reply_timeout: Duration,
        best_effort: bool,
    ) -> Result<Option<Response>> {
        let mut channel = self.channel.lock().await;
        let cancel = self.cancel_token();
        let result = self
            .exchange(&mut channel, command, reply_timeout, &cancel)
            .await;

        match &result {
            Ok(_) => {}
            Err(Error::Timeout { .. } | Error::MalformedFrame(_)) if best_effort => {}
            Err(_) => self.shared.fault(),
        }
        result
    }

    /// Write one frame, wait for its reply if confirmed, then pace.
    async fn exchange(
        &self,
        channel: &mut CommandChannel,
        command: &Command,
        reply_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<Response>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let _busy = BusyGuard::new(&self.shared.busy);

        let packet = command.to_packet(channel.sequence.next())?;
        let frame = packet.encode();
        let waiter = command.reply_opcode().map(|opcode| self.shared.register(opcode));

        debug!(command = %command, frame = %hex(&frame), "TX");
        let written_at = Instant::now();
        if let Err(e) = self.transport.write(&frame).await {
            self.shared.clear_pending();
            return Err(e);
        }

        let result = match waiter {
            None => Ok(None),
            Some(receiver) => tokio::select! {
                _ = cancel.cancelled() => Err(Error::Cancelled),
                reply = timeout(reply_timeout, receiver) => match reply {
                    Ok(Ok(result)) => result.map(Some),
                    Ok(Err(_)) => Err(Error::Cancelled),
                    Err(_) => {
                        self.shared.clear_pending();
                        warn!(command = %command, ?reply_timeout, "No reply");
                        Err(Error::timeout(command.to_string(), reply_timeout))
                    }
                },
            },
        };

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = sleep_until(written_at + self.config.pacing) => {}
        }
        result
    }

    /// Fold a successful write into the snapshot as a provisional state.
    fn apply_provisional(&self, command: &Command) {
        self.shared.snapshot.send_if_modified(|snapshot| {
            let Some(current) = snapshot else {
                return false;
            };
            let mut state = current.state;
            match command {
                Command::Power(on) => state.power = *on,
                Command::Color { color, apply: true } => state.color = *color,
                Command::Brightness(percent) => state.brightness = *percent,
                Command::Mode(mode) => {
                    state.mode = *mode;
                    state.power = true;
                    if let Some(schedule) = Schedule::builtin(*mode) {
                        let (color, brightness) = schedule.state_at(local_now().time());
                        state.color = color;
                        state.brightness = brightness;
                    }
                }
                _ => return false,
            }
            *snapshot = Some(Snapshot {
                state,
                source: SnapshotSource::Provisional,
            });
            true
        });
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump {
            if !pump.is_finished() {
                warn!(
                    state = %self.state(),
                    "Session dropped without calling disconnect() - stopping notification pump. \
                     For reliable cleanup, call session.disconnect().await before dropping."
                );
            }
            self.cancel_token().cancel();
            pump.abort();
        }
    }
}

/// Current local wall-clock time, falling back to UTC when the offset is unknown.
pub(crate) fn local_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| {
        debug!("Local UTC offset unavailable, using UTC");
        OffsetDateTime::now_utc()
    });
    PrimitiveDateTime::new(now.date(), now.time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, MockTransportBuilder};
    use gamalta_types::{Color, Mode, opcode};

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.pacing, Duration::from_millis(100));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.command_timeout, Duration::from_secs(2));
        assert_eq!(config.settle_delay, Duration::from_millis(200));
        assert_eq!(config.password, "123456");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_presets() {
        assert!(SessionConfig::fast().command_timeout < SessionConfig::default().command_timeout);
        assert!(SessionConfig::patient().pacing > SessionConfig::default().pacing);
        assert!(SessionConfig::fast().validate().is_ok());
        assert!(SessionConfig::patient().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = SessionConfig::default().command_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = SessionConfig::default().password("");
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_steps_in_order() {
        let session = Session::new(MockTransport::new("Gamalta Mock"));
        assert_eq!(session.state(), SessionState::Disconnected);

        // Skipping a step is refused
        assert!(matches!(
            session.login().await,
            Err(Error::NotReady {
                state: SessionState::Disconnected
            })
        ));

        session.open("Gamalta Mock").await.unwrap();
        assert_eq!(session.state(), SessionState::TransportConnected);
        session.subscribe().await.unwrap();
        assert_eq!(session.state(), SessionState::Subscribed);
        session.login().await.unwrap();
        assert_eq!(session.state(), SessionState::LoggingIn);
        session.sync_time(local_now()).await.unwrap();
        assert_eq!(session.state(), SessionState::SyncingTime);
        session.stabilize().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        session.disconnect().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stabilization_populates_snapshot() {
        let transport = MockTransportBuilder::new()
            .mode(Mode::CoralReef)
            .brightness(64)
            .build();
        let session = Session::new(transport);
        session.establish("Gamalta Mock").await.unwrap();

        let snapshot = session.snapshot().unwrap();
        assert!(snapshot.is_authoritative());
        assert_eq!(snapshot.state.mode, Mode::CoralReef);
        assert_eq!(snapshot.state.brightness, 64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provisional_then_authoritative() {
        let session = Session::new(MockTransport::new("Gamalta Mock"));
        session.establish("Gamalta Mock").await.unwrap();

        session
            .execute(Command::set_color(Color::rgb(1, 2, 3)))
            .await
            .unwrap();
        let snapshot = session.snapshot().unwrap();
        assert_eq!(snapshot.source, SnapshotSource::Provisional);
        assert_eq!(snapshot.state.color, Color::rgb(1, 2, 3));

        let state = session.query_state().await.unwrap();
        assert_eq!(state.color, Color::rgb(1, 2, 3));
        assert!(session.snapshot().unwrap().is_authoritative());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_writes() {
        let session = Session::new(MockTransport::new("Gamalta Mock"));
        session.establish("Gamalta Mock").await.unwrap();

        let start = Instant::now();
        session.execute(Command::brightness(10)).await.unwrap();
        session.execute(Command::brightness(20)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_advances_per_frame() {
        let session = Session::new(MockTransport::new("Gamalta Mock"));
        session.establish("Gamalta Mock").await.unwrap();

        let packets = session.transport().written_packets().await;
        for pair in packets.windows(2) {
            assert_eq!(pair[1].sequence, pair[0].sequence.wrapping_add(1));
        }
        assert_eq!(packets[0].command, opcode::LOGIN);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_argument_writes_nothing() {
        let session = Session::new(MockTransport::new("Gamalta Mock"));
        session.establish("Gamalta Mock").await.unwrap();
        session.transport().clear_written().await;

        let result = session.execute(Command::brightness(150)).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert!(session.transport().written_frames().await.is_empty());
        assert!(session.is_ready());
    }
}
