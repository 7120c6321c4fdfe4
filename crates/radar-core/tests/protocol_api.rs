//! Integration tests for the radar-core public protocol API.
//!
//! These exercise framing, decoding, and encoding together the way the bridge
//! uses them: raw serial bytes in, readings out; command names in, bytes out.

use bytes::BytesMut;
use proptest::prelude::*;
use futures_util::StreamExt;
use radar_core::{decode_line, encode_command, Command, Distance, LineCodec, TelemetryReading};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Decoder, FramedRead};

/// Runs raw device output through the framer and decoder, keeping only readings.
fn readings_from(raw: &[u8]) -> Vec<TelemetryReading> {
    let mut codec = LineCodec::new();
    let mut buf = BytesMut::from(raw);
    let mut out = Vec::new();
    while let Some(line) = codec.decode(&mut buf).expect("framing never fails") {
        if let Some(reading) = decode_line(&line) {
            out.push(reading);
        }
    }
    out
}

#[test]
fn test_firmware_session_yields_only_readings_in_order() {
    // Arrange: a realistic boot + scan transcript from the firmware
    let raw = b"Arduino Radar initialized\r\n\
                Received command: S\r\n\
                Starting scan...\r\n\
                Angle: 0 Distance: 35\r\n\
                Angle: 1 Distance: 0\r\n\
                garbage\xFF\xFE\r\n\
                Angle: 2 Distance: 36\r\n";

    // Act
    let readings = readings_from(raw);

    // Assert: chatter and garbage dropped, order preserved, sentinel kept
    assert_eq!(
        readings,
        vec![
            TelemetryReading::new(0, 35),
            TelemetryReading::new(1, 0),
            TelemetryReading::new(2, 36),
        ]
    );
    assert_eq!(readings[1].distance, Distance::NoObject);
}

#[test]
fn test_reset_echo_clears_dot() {
    // The firmware answers `C` with a centre reading and distance 0.
    let readings = readings_from(b"Resetting radar to center...\nAngle: 90 Distance: 0\n");
    assert_eq!(readings.len(), 1);
    assert!(readings[0].distance.is_no_object());
}

#[test]
fn test_encoded_commands_are_single_char_lines() {
    for command in Command::ALL {
        let wire = encode_command(command.name()).unwrap();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[1], b'\n');
        assert!(wire[0].is_ascii_uppercase());
    }
}

#[tokio::test]
async fn test_framed_read_over_async_reader() {
    // Arrange: split the transcript across arbitrary chunk boundaries
    let (mut tx, rx) = tokio::io::duplex(16);
    let writer = tokio::spawn(async move {
        for chunk in [
            &b"Angle: 1"[..],
            &b"0 Distance: 5\nAng"[..],
            &b"le: 11 Distance: 0\n"[..],
        ] {
            tx.write_all(chunk).await.unwrap();
        }
    });

    // Act
    let lines: Vec<String> = FramedRead::new(rx, LineCodec::new())
        .map(|line| line.expect("duplex reads do not fail"))
        .collect()
        .await;
    writer.await.unwrap();

    // Assert
    assert_eq!(lines, vec!["Angle: 10 Distance: 5", "Angle: 11 Distance: 0"]);
}

proptest! {
    #[test]
    fn prop_well_formed_lines_decode(angle in -360i32..=360, distance in 0u32..=10_000, reversed in any::<bool>()) {
        let line = if reversed {
            format!("Distance: {distance} Angle: {angle}")
        } else {
            format!("Angle: {angle} Distance: {distance}")
        };
        let reading = decode_line(&line).expect("well-formed line must decode");
        prop_assert_eq!(reading.angle, angle);
        prop_assert_eq!(reading.distance.is_no_object(), distance == 0);
        prop_assert_eq!(reading.distance.wire_value(), distance);
    }

    #[test]
    fn prop_decoder_never_panics(line in ".{0,80}") {
        let _ = decode_line(&line);
    }

    #[test]
    fn prop_unknown_commands_are_rejected(name in "[a-z_]{1,16}") {
        let known = Command::ALL.iter().any(|c| c.name() == name);
        prop_assert_eq!(encode_command(&name).is_ok(), known);
    }
}
