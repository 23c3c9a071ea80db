//! Listener supervisor (C8): one TCP listener per provisioned device,
//! spawning a [`Session`] for every accepted socket.

use mowerlink_core::{DeviceRegistry, Environment, TelemetrySink};
use tokio::net::TcpListener;

use crate::session::Session;

/// Owns the per-device listeners for the lifetime of the server process.
pub struct ListenerSupervisor<E: Environment, R: DeviceRegistry, S: TelemetrySink> {
    env: E,
    registry: R,
    sink: S,
}

impl<E: Environment, R: DeviceRegistry, S: TelemetrySink> ListenerSupervisor<E, R, S> {
    /// Build a supervisor over the given registry and telemetry sink.
    #[must_use]
    pub fn new(env: E, registry: R, sink: S) -> Self {
        Self { env, registry, sink }
    }

    /// Query the registry and spawn one listener task per provisioned
    /// device. Runs until the process is killed: each listener task loops
    /// forever accepting sockets.
    ///
    /// A bind failure on one device's port is logged and that device's
    /// listener is skipped; the rest of the fleet is unaffected.
    pub async fn run(self) {
        let devices = match self.registry.list_provisioned_devices() {
            Ok(devices) => devices,
            Err(e) => {
                tracing::error!(error = %e, "failed to read device registry");
                return;
            },
        };

        let mut listener_tasks = Vec::new();

        for device in devices {
            let bind_addr = ("0.0.0.0", device.port);
            let listener = match TcpListener::bind(bind_addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(
                        device_id = device.device_id,
                        port = device.port,
                        error = %e,
                        "failed to bind device listener"
                    );
                    continue;
                },
            };

            tracing::info!(
                device_id = device.device_id,
                port = device.port,
                name = device.display_name,
                "listening for device"
            );

            let env = self.env.clone();
            let sink = self.sink.clone();
            let device_id = device.device_id;

            listener_tasks.push(tokio::spawn(async move {
                accept_loop(device_id, listener, env, sink).await;
            }));
        }

        for task in listener_tasks {
            let _ = task.await;
        }
    }
}

async fn accept_loop<E: Environment, S: TelemetrySink>(
    device_id: u64,
    listener: TcpListener,
    env: E,
    sink: S,
) {
    loop {
        let socket = match listener.accept().await {
            Ok((socket, _peer_addr)) => socket,
            Err(e) => {
                tracing::error!(device_id, error = %e, "accept failed");
                continue;
            },
        };

        let session = Session::new(device_id, env.clone(), sink.clone());
        tokio::spawn(async move {
            session.run(socket).await;
        });
    }
}
