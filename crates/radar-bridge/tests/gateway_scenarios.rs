//! Session gateway scenarios: command validation, fan-out, and the full
//! device-to-session path through a running supervisor.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use radar_bridge::application::{DeviceControl, DeviceWriteError, Gateway};
use radar_bridge::domain::{DeviceStatus, ServerMessage};
use radar_bridge::infrastructure::EndpointClaims;
use radar_core::ConnectionState;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::time::timeout;

use common::{radar, start, DuplexOpener, FakeEnumerator};

mock! {
    Device {}

    #[async_trait]
    impl DeviceControl for Device {
        fn status(&self) -> DeviceStatus;
        async fn write(&self, bytes: Vec<u8>) -> Result<(), DeviceWriteError>;
        fn request_reconnect(&self) -> bool;
    }
}

fn status(state: ConnectionState, message: &str) -> DeviceStatus {
    DeviceStatus {
        state,
        message: message.to_string(),
        endpoint: state.is_connected().then(|| "/dev/ttyUSB0".to_string()),
        retry_pending: false,
    }
}

fn action(command: &str) -> String {
    serde_json::json!({ "type": "action", "command": command }).to_string()
}

async fn next(rx: &mut broadcast::Receiver<ServerMessage>) -> ServerMessage {
    timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("no message arrived")
        .expect("gateway closed")
}

// ── Scenario C: command while disconnected ────────────────────────────────────

#[tokio::test]
async fn test_command_while_disconnected_is_503_without_write() {
    // Arrange
    let mut device = MockDevice::new();
    device
        .expect_status()
        .returning(|| status(ConnectionState::Disconnected, "No serial device found"));
    device.expect_write().never();
    let gateway = Gateway::new(Arc::new(device), true);
    let (_, mut others) = gateway.join();

    // Act
    let reply = gateway.handle_frame(&action("left")).await;

    // Assert
    match reply {
        Some(ServerMessage::Error { code, message }) => {
            assert_eq!(code, 503);
            assert_eq!(message, "Device not connected");
        }
        other => panic!("expected 503 error, got {other:?}"),
    }
    assert!(!gateway.is_scanning());
    assert!(others.try_recv().is_err(), "errors are never broadcast");
}

#[tokio::test]
async fn test_unknown_command_is_rejected_before_connection_check() {
    let mut device = MockDevice::new();
    device
        .expect_status()
        .returning(|| status(ConnectionState::Disconnected, "No serial device found"));
    device.expect_write().never();
    let gateway = Gateway::new(Arc::new(device), true);

    let reply = gateway.handle_frame(&action("fire")).await;

    assert!(matches!(reply, Some(ServerMessage::Error { code: 400, .. })));
}

// ── Scenario D: start while connected ─────────────────────────────────────────

#[tokio::test]
async fn test_start_broadcasts_scanning_status_to_every_session() {
    // Arrange
    let mut device = MockDevice::new();
    device
        .expect_status()
        .returning(|| status(ConnectionState::Connected, "Serial port is open."));
    device
        .expect_write()
        .withf(|bytes| bytes.as_slice() == b"S\n")
        .times(1)
        .returning(|_| Ok(()));
    let gateway = Gateway::new(Arc::new(device), true);
    let (_, mut sender) = gateway.join();
    let (_, mut watcher) = gateway.join();

    // Act
    let reply = gateway.handle_frame(&action("start")).await;

    // Assert
    let expected = ServerMessage::status(true, true, "Serial port is open.");
    assert_eq!(reply, None, "the broadcast is the only acknowledgement");
    assert!(gateway.is_scanning());
    assert_eq!(sender.try_recv().unwrap(), expected);
    assert_eq!(watcher.try_recv().unwrap(), expected);
    assert!(sender.try_recv().is_err());
}

#[tokio::test]
async fn test_stop_after_start_clears_scanning_and_gates_movement() {
    // Arrange
    let mut device = MockDevice::new();
    device
        .expect_status()
        .returning(|| status(ConnectionState::Connected, "Serial port is open."));
    device.expect_write().times(2).returning(|_| Ok(()));
    let gateway = Gateway::new(Arc::new(device), true);
    gateway.handle_action("start").await.unwrap();

    // Act
    gateway.handle_action("stop").await.unwrap();
    let reply = gateway.handle_frame(&action("right")).await;

    // Assert
    assert!(!gateway.is_scanning());
    assert!(matches!(reply, Some(ServerMessage::Error { code: 409, .. })));
}

#[tokio::test]
async fn test_reconnect_request_is_forwarded() {
    let mut device = MockDevice::new();
    device.expect_request_reconnect().times(1).return_const(true);
    let gateway = Gateway::new(Arc::new(device), true);

    assert!(gateway.request_reconnect());
}

// ── Device to session, end to end ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_sessions_follow_device_through_supervisor() {
    // Arrange: nothing is plugged in yet
    let enumerator = FakeEnumerator::with(Vec::new());
    let opener = Arc::new(DuplexOpener::default());
    let (supervisor, _task) = start(&enumerator, &opener, &EndpointClaims::default());
    let gateway = Arc::new(Gateway::new(Arc::new(supervisor.clone()), true));
    tokio::spawn(Arc::clone(&gateway).relay(
        supervisor.subscribe_telemetry(),
        supervisor.subscribe_status(),
    ));
    let (snapshot, mut first) = gateway.join();
    let (_, mut second) = gateway.join();

    // Act: the radar appears and is picked up by the retry
    let mut device = opener.plug();
    enumerator.set(vec![radar("/dev/ttyUSB0")]);
    let connected = next(&mut first).await;

    // Assert
    assert!(matches!(snapshot, ServerMessage::Status { is_connected: false, .. }));
    assert_eq!(connected, ServerMessage::status(true, false, "Serial port is open."));
    assert_eq!(next(&mut second).await, connected);

    // Act: one reading with no object in range
    device.write_all(b"Angle: 45 Distance: 0\r\n").await.unwrap();

    // Assert
    let reading = ServerMessage::Telemetry { angle: 45, distance: 0 };
    assert_eq!(next(&mut first).await, reading);
    assert_eq!(next(&mut second).await, reading);

    // Act: a session starts the sweep
    let reply = gateway.handle_frame(&action("start")).await;

    // Assert
    let mut token = [0u8; 2];
    device.read_exact(&mut token).await.unwrap();
    assert_eq!(&token, b"S\n");
    assert_eq!(reply, None);
    assert_eq!(next(&mut first).await, ServerMessage::status(true, true, "Serial port is open."));
    assert_eq!(next(&mut second).await, ServerMessage::status(true, true, "Serial port is open."));

    // Act: the radar is unplugged mid-sweep
    drop(device);

    // Assert: both sessions learn the link is gone; the sweep flag survives
    let lost = ServerMessage::status(false, true, "Serial port closed: end of stream");
    assert_eq!(next(&mut first).await, lost);
    assert_eq!(next(&mut second).await, lost);
}
