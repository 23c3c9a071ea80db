//! Notification handler (C7): decode device-originated status/position
//! notifications and forward them to the telemetry sink. No wire reply is
//! ever sent for a notification.

use mowerlink_core::{DeviceState, Severity, TelemetrySink};

const NTYPE_DEVICE_STATUS: u8 = 0x00;
const NTYPE_POSITION_UPDATE: u8 = 0x01;

/// Handle one notification payload (`ntype[1] ++ body[*]`, already stripped
/// of the session/presentation envelope).
pub async fn handle_notification<S: TelemetrySink>(
    device_id: u64,
    ntype: u8,
    body: &[u8],
    sink: &S,
    now: u64,
) {
    match ntype {
        NTYPE_DEVICE_STATUS => handle_device_status(device_id, body, sink, now).await,
        NTYPE_POSITION_UPDATE => handle_position_update(device_id, body, sink).await,
        other => {
            tracing::warn!(device_id, ntype = format!("{other:#04x}"), "Unknown_Notification");
        },
    }
}

async fn handle_device_status<S: TelemetrySink>(device_id: u64, body: &[u8], sink: &S, now: u64) {
    if body.len() < 6 {
        tracing::warn!(device_id, len = body.len(), "Status_Update body too short");
        return;
    }

    let battery_percent = f32::from(body[0]) / 2.0;
    let blade_seconds = u32::from_be_bytes([body[1], body[2], body[3], body[4]]);
    let state_code = body[5];

    let Some(state) = DeviceState::from_wire_code(state_code) else {
        tracing::warn!(device_id, state_code, "Status_Update unrecognized state code");
        return;
    };

    tracing::info!(device_id, battery_percent, blade_seconds, ?state, "Status_Update");

    if let Err(e) = sink.record_battery(device_id, battery_percent, now).await {
        tracing::error!(device_id, error = %e, "telemetry sink write failed");
    }
    if let Err(e) = sink.record_state(device_id, state, now).await {
        tracing::error!(device_id, error = %e, "telemetry sink write failed");
    }
    let _ = sink
        .record_log(
            device_id,
            Severity::Information,
            "Status_Update",
            &format!("blade_seconds={blade_seconds}"),
            now,
        )
        .await;
}

async fn handle_position_update<S: TelemetrySink>(device_id: u64, body: &[u8], sink: &S) {
    if body.len() < 12 {
        tracing::warn!(device_id, len = body.len(), "Position_Update body too short");
        return;
    }

    let unix_seconds = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
    let latitude = f32::from_be_bytes([body[4], body[5], body[6], body[7]]);
    let longitude = f32::from_be_bytes([body[8], body[9], body[10], body[11]]);

    tracing::info!(device_id, latitude, longitude, "Position_Update");

    if let Err(e) =
        sink.record_position(device_id, latitude, longitude, u64::from(unix_seconds)).await
    {
        tracing::error!(device_id, error = %e, "telemetry sink write failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use mowerlink_core::SinkError;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingSink {
        battery: Arc<Mutex<Vec<(u64, f32)>>>,
        position: Arc<Mutex<Vec<(u64, f32, f32, u64)>>>,
        states: Arc<Mutex<Vec<(u64, DeviceState)>>>,
    }

    #[async_trait]
    impl TelemetrySink for RecordingSink {
        async fn record_battery(&self, device_id: u64, percent: f32, _ts: u64) -> Result<(), SinkError> {
            self.battery.lock().unwrap().push((device_id, percent));
            Ok(())
        }

        async fn record_position(
            &self,
            device_id: u64,
            latitude: f32,
            longitude: f32,
            ts: u64,
        ) -> Result<(), SinkError> {
            self.position.lock().unwrap().push((device_id, latitude, longitude, ts));
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

        async fn record_log(&self, _: u64, _: Severity, _: &str, _: &str, _: u64) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn device_status_vector_matches_spec() {
        let sink = RecordingSink::default();
        let body = [0xC8, 0x00, 0x00, 0x04, 0xB0, 0x02];
        handle_notification(1, 0x00, &body, &sink, 1000).await;

        assert_eq!(sink.battery.lock().unwrap().as_slice(), &[(1, 100.0)]);
        assert_eq!(sink.states.lock().unwrap().as_slice(), &[(1, DeviceState::Mowing)]);
    }

    #[tokio::test]
    async fn device_status_short_body_is_dropped() {
        let sink = RecordingSink::default();
        handle_notification(1, 0x00, &[0xC8, 0x00], &sink, 1000).await;
        assert!(sink.battery.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn position_update_parses_fields() {
        let sink = RecordingSink::default();
        let mut body = Vec::new();
        body.extend_from_slice(&42u32.to_be_bytes());
        body.extend_from_slice(&1.5f32.to_be_bytes());
        body.extend_from_slice(&(-2.5f32).to_be_bytes());

        handle_notification(5, 0x01, &body, &sink, 0).await;

        assert_eq!(sink.position.lock().unwrap().as_slice(), &[(5, 1.5, -2.5, 42)]);
    }

    #[tokio::test]
    async fn position_update_short_body_is_dropped() {
        let sink = RecordingSink::default();
        handle_notification(5, 0x01, &[0, 0, 0], &sink, 0).await;
        assert!(sink.position.lock().unwrap().is_empty());
    }
}
