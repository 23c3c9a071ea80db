//! Command handlers (C6): interpret authenticated application-layer
//! commands, emit responses, and update the telemetry sink.
//!
//! Response IIN always echoes the request IIN; response HMAC is computed by
//! the caller ([`crate::session::Session`]), which knows whether the
//! incoming message used the bypass constant.

use bytes::Bytes;
use mowerlink_core::{DeviceState, Severity, TelemetrySink};
use mowerlink_proto::application::ApplicationMessage;

const CMD_HEARTBEAT: u8 = 0x00;
const CMD_CONTROL_DEVICE: u8 = 0x01;
const CMD_ACK_ERROR: u8 = 0x02;
const CMD_RESET_BLADE_TIME: u8 = 0x03;
const CMD_ERROR: u8 = 0xFF;

const ACTION_STOP: u8 = 0x00;
const ACTION_START: u8 = 0x01;
const ACTION_HOME: u8 = 0x02;

/// Outcome of handling a REGULAR application message.
pub enum Reply {
    /// Send an application response with the given command byte and body.
    Send {
        /// Response command byte (request command with the high bit set,
        /// or `0xFF` for an error response).
        command: u8,
        /// Response body.
        body: Vec<u8>,
    },
    /// No response (unknown command).
    None,
}

/// Handle one authenticated application-layer command.
///
/// `ts` is the wall-clock timestamp to attach to any sink writes this
/// command triggers.
pub async fn handle_command<S: TelemetrySink>(
    device_id: u64,
    app: &ApplicationMessage,
    sink: &S,
    ts: u64,
) -> Reply {
    match app.command {
        CMD_HEARTBEAT => {
            tracing::info!(device_id, "Heartbeat_Response");
            Reply::Send { command: 0x80, body: app.body.to_vec() }
        },
        CMD_CONTROL_DEVICE => handle_control_device(device_id, &app.body, sink, ts).await,
        CMD_ACK_ERROR => {
            tracing::info!(device_id, "Ack_Error");
            record_state(device_id, DeviceState::Paused, sink, ts, "Ack_Error").await;
            Reply::Send { command: 0x82, body: Vec::new() }
        },
        CMD_RESET_BLADE_TIME => {
            tracing::info!(device_id, "Reset_Blade_Time");
            if let Err(e) = sink.record_blade_reset(device_id, ts).await {
                tracing::error!(device_id, error = %e, "telemetry sink write failed");
            }
            Reply::Send { command: 0x83, body: Vec::new() }
        },
        unknown => {
            tracing::warn!(device_id, command = format!("{unknown:#04x}"), "Unknown_Command");
            Reply::None
        },
    }
}

async fn handle_control_device<S: TelemetrySink>(
    device_id: u64,
    body: &Bytes,
    sink: &S,
    ts: u64,
) -> Reply {
    let Some(&action) = body.first() else {
        return invalid_control_command();
    };
    if body.len() != 1 {
        return invalid_control_command();
    }

    let state = match action {
        ACTION_STOP => DeviceState::Paused,
        ACTION_START => DeviceState::Mowing,
        ACTION_HOME => DeviceState::ReturningToStation,
        _ => return invalid_control_command(),
    };

    tracing::info!(device_id, ?state, "Control_Command");
    record_state(device_id, state, sink, ts, "Control_Command").await;
    Reply::Send { command: 0x81, body: Vec::new() }
}

fn invalid_control_command() -> Reply {
    Reply::Send { command: CMD_ERROR, body: b"Invalid control command".to_vec() }
}

async fn record_state<S: TelemetrySink>(
    device_id: u64,
    state: DeviceState,
    sink: &S,
    ts: u64,
    event_type: &str,
) {
    if let Err(e) = sink.record_state(device_id, state, ts).await {
        tracing::error!(device_id, error = %e, "telemetry sink write failed");
    }
    let _ = sink
        .record_log(
            device_id,
            Severity::Information,
            event_type,
            &format!("state -> {}", state.name()),
            ts,
        )
        .await;
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use mowerlink_core::SinkError;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingSink {
        states: Arc<Mutex<Vec<(u64, DeviceState)>>>,
        blade_resets: Arc<Mutex<Vec<u64>>>,
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn record_battery(&self, _: u64, _: f32, _: u64) -> Result<(), SinkError> {
            Ok(())
        }

        async fn record_position(&self, _: u64, _: f32, _: f32, _: u64) -> Result<(), SinkError> {
            Ok(())
        }

        async fn record_state(
            &self,
            device_id: u64,
            state: DeviceState,
            _ts: u64,
        ) -> Result<(), SinkError> {
            self.states.lock().unwrap().push((device_id, state));
            Ok(())
        }

        async fn record_log(
            &self,
            _: u64,
            _: Severity,
            _: &str,
            _: &str,
            _: u64,
        ) -> Result<(), SinkError> {
            Ok(())
        }

        async fn record_blade_reset(&self, device_id: u64, _ts: u64) -> Result<(), SinkError> {
            self.blade_resets.lock().unwrap().push(device_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn heartbeat_echoes_body() {
        let sink = RecordingSink::default();
        let app = ApplicationMessage { command: 0x00, body: Bytes::from_static(b"ping") };
        let reply = handle_command(1, &app, &sink, 0).await;
        let Reply::Send { command, body } = reply else { panic!("expected reply") };
        assert_eq!(command, 0x80);
        assert_eq!(body, b"ping");
    }

    #[tokio::test]
    async fn control_device_start_persists_mowing() {
        let sink = RecordingSink::default();
        let app = ApplicationMessage { command: 0x01, body: Bytes::from_static(&[0x01]) };
        let reply = handle_command(7, &app, &sink, 42).await;
        let Reply::Send { command, body } = reply else { panic!("expected reply") };
        assert_eq!(command, 0x81);
        assert!(body.is_empty());
        assert_eq!(sink.states.lock().unwrap().as_slice(), &[(7, DeviceState::Mowing)]);
    }

    #[tokio::test]
    async fn control_device_empty_body_is_malformed() {
        let sink = RecordingSink::default();
        let app = ApplicationMessage { command: 0x01, body: Bytes::new() };
        let reply = handle_command(1, &app, &sink, 0).await;
        let Reply::Send { command, body } = reply else { panic!("expected reply") };
        assert_eq!(command, 0xFF);
        assert_eq!(body, b"Invalid control command");
    }

    #[tokio::test]
    async fn ack_error_persists_paused() {
        let sink = RecordingSink::default();
        let app = ApplicationMessage { command: 0x02, body: Bytes::new() };
        let reply = handle_command(3, &app, &sink, 0).await;
        let Reply::Send { command, .. } = reply else { panic!("expected reply") };
        assert_eq!(command, 0x82);
        assert_eq!(sink.states.lock().unwrap().as_slice(), &[(3, DeviceState::Paused)]);
    }

    #[tokio::test]
    async fn reset_blade_time_calls_sink() {
        let sink = RecordingSink::default();
        let app = ApplicationMessage { command: 0x03, body: Bytes::new() };
        let reply = handle_command(9, &app, &sink, 0).await;
        let Reply::Send { command, .. } = reply else { panic!("expected reply") };
        assert_eq!(command, 0x83);
        assert_eq!(sink.blade_resets.lock().unwrap().as_slice(), &[9]);
    }

    #[tokio::test]
    async fn unknown_command_has_no_reply() {
        let sink = RecordingSink::default();
        let app = ApplicationMessage { command: 0x42, body: Bytes::new() };
        let reply = handle_command(1, &app, &sink, 0).await;
        assert!(matches!(reply, Reply::None));
    }
}
