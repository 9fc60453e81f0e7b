//! Session scenarios against the mock transport.
//!
//! These run on a paused tokio clock, so handshake and reply timeouts elapse
//! instantly.

use std::time::Duration;

use gamalta_core::{
    Client, Color, Command, Error, MockTransport, MockTransportBuilder, Mode, SceneDefinition,
    SceneKind, ScenePoint, Session, SessionConfig, SessionEvent, SessionState, SnapshotSource,
    Transport,
};
use gamalta_types::opcode;
use time::macros::time;
use tokio::time::{Instant, sleep, timeout};

const DEVICE: &str = "Gamalta Mock";

async fn ready_client(transport: MockTransport) -> Client<MockTransport> {
    let client = Client::with_transport(transport);
    client.connect(Some(DEVICE)).await.unwrap();
    client.transport().clear_written().await;
    client
}

/// Wait for the first event matching `pred`.
async fn wait_for_event<F>(events: &mut gamalta_core::EventReceiver, pred: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not received")
}

/// A state reply whose mode byte (0x05) names no known mode.
const UNDECODABLE_STATE_REPLY: [u8; 12] = [
    0xA5, 0x30, 0x04, 0x08, 0x01, 0x05, 0x50, 0x01, 0x02, 0x03, 0x04, 0x05,
];

/// Wait until `opcode` has been written, then answer it with `frame`.
async fn reply_once_written(transport: &MockTransport, opcode: u8, frame: &[u8]) {
    while !transport.written_opcodes().await.contains(&opcode) {
        sleep(Duration::from_millis(1)).await;
    }
    transport.inject_notification(frame.to_vec()).await;
}

// =============================================================================
// Handshake
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_handshake_sends_login_time_sync_and_stabilization_queries() {
    let client = Client::with_transport(MockTransport::new(DEVICE));
    client.connect(Some(DEVICE)).await.unwrap();

    let packets = client.transport().written_packets().await;
    let opcodes: Vec<u8> = packets.iter().map(|p| p.command).collect();
    assert_eq!(
        opcodes,
        vec![
            opcode::LOGIN,
            opcode::TIME_SYNC,
            opcode::STATE_QUERY,
            opcode::TIMER_QUERY,
            opcode::TIMER_QUERY,
        ]
    );
    assert_eq!(packets[3].payload.as_ref(), &[1]);
    assert_eq!(packets[4].payload.as_ref(), &[2]);
    assert_eq!(client.state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_command_before_ready_fails_not_ready() {
    let session = Session::new(MockTransport::new(DEVICE));
    session.open(DEVICE).await.unwrap();
    assert_eq!(session.state(), SessionState::TransportConnected);

    let result = session.execute(Command::power(true)).await;
    assert!(matches!(
        result,
        Err(Error::NotReady {
            state: SessionState::TransportConnected
        })
    ));
    assert!(session.transport().written_frames().await.is_empty());

    session.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_login_timeout_faults_session() {
    let transport = MockTransportBuilder::new().silence(opcode::LOGIN).build();
    let client = Client::with_transport(transport);
    let mut states = client.session().watch_state();

    let start = Instant::now();
    let result = client.connect(Some(DEVICE)).await;

    assert!(matches!(result, Err(Error::Timeout { .. })));
    assert!(start.elapsed() >= SessionConfig::default().handshake_timeout);
    assert_eq!(client.state(), SessionState::Faulted);
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::Faulted);

    // Nothing beyond the login was sent
    assert_eq!(client.transport().written_opcodes().await, vec![opcode::LOGIN]);
    assert!(!client.transport().is_connected().await);

    // Faulted rejects commands
    assert!(matches!(
        client.power_on().await,
        Err(Error::NotReady {
            state: SessionState::Faulted
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_fault() {
    let transport = MockTransportBuilder::new().silence(opcode::LOGIN).build();
    let client = Client::with_transport(transport);
    assert!(client.connect(Some(DEVICE)).await.is_err());

    client.transport().unsilence(opcode::LOGIN).await;
    client.connect(Some(DEVICE)).await.unwrap();
    assert!(client.is_ready());
    assert_eq!(client.transport().connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stabilization_tolerates_missing_timer_replies() {
    let transport = MockTransportBuilder::new()
        .silence(opcode::TIMER_QUERY)
        .build();
    let client = Client::with_transport(transport);

    let start = Instant::now();
    client.connect(Some(DEVICE)).await.unwrap();

    assert!(client.is_ready());
    assert!(start.elapsed() >= SessionConfig::default().stabilization_timeout * 2);
}

#[tokio::test(start_paused = true)]
async fn test_stabilization_tolerates_undecodable_state_reply() {
    let transport = MockTransportBuilder::new()
        .silence(opcode::STATE_QUERY)
        .build();
    let client = Client::with_transport(transport);
    let mut events = client.events();

    let (connected, ()) = tokio::join!(
        client.connect(Some(DEVICE)),
        reply_once_written(client.transport(), opcode::STATE_QUERY, &UNDECODABLE_STATE_REPLY),
    );

    connected.unwrap();
    assert!(client.is_ready());
    let event = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::MalformedFrame { .. })
    })
    .await;
    assert!(
        matches!(event, SessionEvent::MalformedFrame { raw, .. } if raw == UNDECODABLE_STATE_REPLY)
    );
    assert!(client.snapshot().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_custom_password_is_sent() {
    let config = SessionConfig::default().password("654321");
    let client = Client::with_config(MockTransport::new(DEVICE), config).unwrap();
    client.connect(Some(DEVICE)).await.unwrap();

    let login = &client.transport().written_packets().await[0];
    assert_eq!(login.command, opcode::LOGIN);
    assert!(login.payload.ends_with(b"654321"));
}

// =============================================================================
// Steady state
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_set_mode_engages_schedule_with_current_state() {
    let transport = MockTransportBuilder::new()
        .mode(Mode::Manual)
        .color(Color::new(10, 20, 30, 0, 0))
        .brightness(50)
        .build();
    let client = ready_client(transport).await;

    client.set_mode(Mode::CoralReef).await.unwrap();

    let frames = client.transport().written_frames().await;
    let bodies: Vec<&[u8]> = frames.iter().map(|f| &f[2..]).collect();
    assert_eq!(
        bodies,
        vec![
            &[opcode::COLOR, 0x06, 10, 20, 30, 0, 0, 0x01][..],
            &[opcode::BRIGHTNESS, 0x01, 50][..],
            &[opcode::MODE, 0x01, Mode::CoralReef.as_byte()][..],
            &[opcode::SCENE_ACTIVATE, 0x01, 0x00][..],
        ]
    );

    let snapshot = client.snapshot().unwrap();
    assert_eq!(snapshot.source, SnapshotSource::Provisional);
    assert_eq!(snapshot.state.mode, Mode::CoralReef);
    assert!(snapshot.state.power);
}

#[tokio::test(start_paused = true)]
async fn test_device_report_replaces_provisional_state() {
    let client = ready_client(MockTransport::new(DEVICE)).await;

    client.set_brightness(35).await.unwrap();
    assert_eq!(
        client.snapshot().unwrap().source,
        SnapshotSource::Provisional
    );

    let state = client.query_state().await.unwrap();
    assert_eq!(state.brightness, 35);
    let snapshot = client.snapshot().unwrap();
    assert_eq!(snapshot.source, SnapshotSource::Device);
    assert_eq!(snapshot.state, state);
}

#[tokio::test(start_paused = true)]
async fn test_command_timeout_keeps_session_ready() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    client.transport().silence(opcode::STATE_QUERY).await;

    let result = client.query_state().await;
    assert!(matches!(result, Err(Error::Timeout { .. })));
    assert!(result.unwrap_err().is_recoverable());
    assert!(client.is_ready());

    client.transport().unsilence(opcode::STATE_QUERY).await;
    assert!(client.query_state().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_state_reply_keeps_session_ready() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    client.transport().silence(opcode::STATE_QUERY).await;
    let before = client.snapshot();

    let (result, ()) = tokio::join!(
        client.query_state(),
        reply_once_written(client.transport(), opcode::STATE_QUERY, &UNDECODABLE_STATE_REPLY),
    );

    assert!(matches!(result, Err(Error::MalformedFrame(ref m)) if m.contains("0x05")));
    assert!(result.unwrap_err().is_recoverable());
    assert!(client.is_ready());
    assert_eq!(client.snapshot(), before);

    client.transport().unsilence(opcode::STATE_QUERY).await;
    assert!(client.query_state().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_after_timeout_is_ignored() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    client
        .transport()
        .set_reply_latency(Duration::from_secs(3));

    assert!(matches!(
        client.query_name().await,
        Err(Error::Timeout { .. })
    ));

    client.transport().set_reply_latency(Duration::ZERO);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(client.query_name().await.unwrap(), "Gamalta Mock");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_commands_are_serialized() {
    let client = ready_client(MockTransport::new(DEVICE)).await;

    let start = Instant::now();
    let (a, b, c) = tokio::join!(
        client.set_brightness(10),
        client.set_brightness(20),
        client.power_off(),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let packets = client.transport().written_packets().await;
    assert_eq!(packets.len(), 3);
    for pair in packets.windows(2) {
        assert_eq!(pair[1].sequence, pair[0].sequence.wrapping_add(1));
    }
    assert!(start.elapsed() >= SessionConfig::default().pacing * 3);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_and_unknown_notifications_are_not_fatal() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    let mut events = client.events();

    client.transport().inject_notification(vec![0x5A, 0x01]).await;
    let event = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::MalformedFrame { .. })
    })
    .await;
    assert!(matches!(event, SessionEvent::MalformedFrame { raw, .. } if raw == vec![0x5A, 0x01]));

    client
        .transport()
        .inject_notification(vec![0xA5, 0x01, 0x99, 0x00])
        .await;
    let event = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::UnknownResponse { .. })
    })
    .await;
    assert!(matches!(event, SessionEvent::UnknownResponse { opcode: 0x99, .. }));

    assert!(client.is_ready());
    assert!(client.query_state().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_unsolicited_state_report_updates_snapshot() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    let mut snapshots = client.watch_snapshot();
    snapshots.mark_unchanged();

    let mut state = client.snapshot().unwrap().state;
    state.mode = Mode::Waterweed;
    state.brightness = 12;
    let mut frame = vec![0xA5, 0x30, opcode::STATE_RESPONSE, 0x08];
    frame.extend_from_slice(&state.to_payload());
    client.transport().inject_notification(frame).await;

    timeout(Duration::from_secs(1), snapshots.changed())
        .await
        .unwrap()
        .unwrap();
    let snapshot = client.snapshot().unwrap();
    assert_eq!(snapshot.source, SnapshotSource::Device);
    assert_eq!(snapshot.state.mode, Mode::Waterweed);
    assert_eq!(snapshot.state.brightness, 12);
}

// =============================================================================
// Link loss and cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_link_loss_returns_to_disconnected() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    let mut states = client.session().watch_state();

    client.transport().drop_connection().await;
    timeout(
        Duration::from_secs(1),
        states.wait_for(|s| *s == SessionState::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(client.snapshot().is_none());
    assert!(matches!(
        client.power_on().await,
        Err(Error::NotReady { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_during_command_faults_session() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    client.transport().silence(opcode::STATE_QUERY).await;

    let (result, _) = tokio::join!(client.query_state(), async {
        sleep(Duration::from_millis(50)).await;
        client.transport().drop_connection().await;
    });

    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(client.state(), SessionState::Faulted);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_in_flight_command() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    client.transport().silence(opcode::STATE_QUERY).await;
    let mut events = client.events();

    let (result, disconnected) = tokio::join!(client.query_state(), async {
        sleep(Duration::from_millis(100)).await;
        client.disconnect().await
    });

    assert!(matches!(result, Err(Error::Cancelled)));
    disconnected.unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!client.transport().is_connected().await);

    wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::Disconnected { .. })
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_session_can_be_reused_after_disconnect() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    client.disconnect().await.unwrap();
    assert!(client.snapshot().is_none());

    client.connect(Some(DEVICE)).await.unwrap();
    assert!(client.is_ready());
    assert!(client.snapshot().is_some());
}

// =============================================================================
// Scenes
// =============================================================================

fn sample_scene() -> SceneDefinition {
    let point = |start, end, level: u8| ScenePoint::new(start, end, Color::white(level, level / 2), level / 3);
    SceneDefinition::new(
        SceneKind::Pro,
        [
            point(time!(6:00), time!(9:00), 60),
            point(time!(9:00), time!(12:00), 150),
            point(time!(12:00), time!(16:00), 255),
            point(time!(16:00), time!(20:00), 150),
            point(time!(20:00), time!(6:00), 0),
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn test_scene_edit_sequence() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    let scene = sample_scene();

    client.edit_scene_at(&scene, time!(13:30)).await.unwrap();

    let packets = client.transport().written_packets().await;
    let opcodes: Vec<u8> = packets.iter().map(|p| p.command).collect();
    assert_eq!(
        opcodes,
        vec![
            opcode::SCENE_EDIT_START,
            opcode::SCENE_POINT,
            opcode::SCENE_POINT,
            opcode::SCENE_POINT,
            opcode::SCENE_POINT,
            opcode::SCENE_POINT,
            opcode::SCENE_METADATA,
            opcode::SCENE_POINT,
            opcode::COLOR,
            opcode::BRIGHTNESS,
            opcode::MODE,
            opcode::SCENE_ACTIVATE,
        ]
    );

    assert_eq!(packets[0].payload.as_ref(), &[0x0C]);
    let indices: Vec<u8> = packets[1..=5].iter().map(|p| p.payload[0]).collect();
    assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    assert_eq!(packets[6].payload.as_ref(), &[0xD5, 0xAA, 0xCA]);
    assert_eq!(packets[7].payload[0], 0xFF);

    // Activation uses the point covering 13:30
    let active = scene.points[2];
    assert_eq!(packets[8].payload[..5], active.color.to_bytes());
    assert_eq!(packets[9].payload.as_ref(), &[active.brightness]);
    assert_eq!(packets[10].payload.as_ref(), &[Mode::CustomPro.as_byte()]);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_scene_writes_nothing() {
    let client = ready_client(MockTransport::new(DEVICE)).await;
    let mut scene = sample_scene();
    scene.points[3].brightness = 120;

    let result = client.edit_scene(&scene).await;
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(client.transport().written_frames().await.is_empty());
}
