//! Connection session (C5): per-socket buffer assembly, decode loop,
//! inactivity timeout, and phase-based dispatch to the handshake or to the
//! command/notification handlers.

use std::time::Duration;

use bytes::{Buf, BytesMut};
use mowerlink_core::{Environment, Handshake, HandshakeAction, TelemetrySink};
use mowerlink_proto::{
    ProtocolError,
    application::{self, ApplicationMessage},
    frame, presentation,
    session::{self, BYPASS_HMAC, MessageType, SessionMessage},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::{error::SessionError, handlers, handlers::Reply, notifications};

/// No bytes received for this long and the session is destroyed.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_millis(2000);

/// A single device connection. Owns the receive buffer and the handshake
/// state; runs for the lifetime of one accepted socket.
pub struct Session<E: Environment, S: TelemetrySink> {
    device_id: u64,
    env: E,
    sink: S,
    handshake: Handshake<E>,
}

impl<E: Environment, S: TelemetrySink> Session<E, S> {
    /// Create a session for a freshly accepted socket belonging to
    /// `device_id`.
    #[must_use]
    pub fn new(device_id: u64, env: E, sink: S) -> Self {
        let handshake = Handshake::new_server(env.clone());
        Self { device_id, env, sink, handshake }
    }

    /// Run the session to completion: decode loop, inactivity timeout, and
    /// dispatch. Returns once the socket is closed, by us or by the peer.
    pub async fn run(mut self, mut socket: TcpStream) {
        tracing::info!(device_id = self.device_id, "Connection_Attempt");

        let mut buf = BytesMut::with_capacity(4096);
        let mut read_buf = [0u8; 4096];

        let outcome = loop {
            tokio::select! {
                biased;

                result = socket.read(&mut read_buf) => {
                    match result {
                        Ok(0) => break Ok(()),
                        Ok(n) => {
                            buf.extend_from_slice(&read_buf[..n]);
                            match self.drain_frames(&mut buf, &mut socket).await {
                                Ok(()) => {},
                                Err(e) => break Err(e),
                            }
                        },
                        Err(e) => break Err(SessionError::Io(e)),
                    }
                }

                () = self.env.sleep(INACTIVITY_TIMEOUT) => {
                    break Err(SessionError::InactivityTimeout);
                }
            }
        };

        match outcome {
            Ok(()) => {
                tracing::info!(device_id = self.device_id, "Connection_Closed");
            },
            Err(SessionError::InactivityTimeout) => {
                tracing::warn!(device_id = self.device_id, "Connection_Timeout");
            },
            Err(e) => {
                tracing::error!(device_id = self.device_id, error = %e, "Connection_Error");
            },
        }

        let _ = socket.shutdown().await;
    }

    async fn drain_frames(
        &mut self,
        buf: &mut BytesMut,
        socket: &mut TcpStream,
    ) -> Result<(), SessionError> {
        loop {
            match frame::decode(buf) {
                Ok(frame::DecodeOutcome::Incomplete) => return Ok(()),
                Ok(frame::DecodeOutcome::Frame { payload, consumed }) => {
                    buf.advance(consumed);
                    self.handle_payload(payload, socket).await?;
                },
                Err(e) => {
                    tracing::error!(device_id = self.device_id, error = %e, "Invalid_Frame");
                    buf.clear();
                    return Ok(());
                },
            }
        }
    }

    async fn handle_payload(
        &mut self,
        payload: bytes::Bytes,
        socket: &mut TcpStream,
    ) -> Result<(), SessionError> {
        let msg = match session::unpack(&payload) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(device_id = self.device_id, error = %e, "Invalid_Session_Message");
                return Ok(());
            },
        };

        match MessageType::from_tag(msg.msg_type) {
            Some(MessageType::Hello | MessageType::Challenge | MessageType::ClientAuth) => {
                self.handle_handshake_message(&msg, socket).await
            },
            Some(MessageType::Notification) => {
                self.handle_notification(&msg).await;
                Ok(())
            },
            Some(MessageType::Regular) => self.handle_regular(&msg, socket).await,
            None => {
                tracing::warn!(
                    device_id = self.device_id,
                    msg_type = format!("{:#04x}", msg.msg_type),
                    "Unknown_Message_Type"
                );
                Ok(())
            },
        }
    }

    async fn handle_handshake_message(
        &mut self,
        msg: &SessionMessage,
        socket: &mut TcpStream,
    ) -> Result<(), SessionError> {
        let now = self.env.now();
        let actions = self.handshake.handle_session(msg, now).map_err(|e| {
            tracing::error!(device_id = self.device_id, error = %e, "Auth_Failed");
            e
        })?;

        for action in actions {
            match action {
                HandshakeAction::SendSession { msg_type, body, hmac } => {
                    if msg_type == MessageType::Challenge.tag() {
                        tracing::info!(device_id = self.device_id, "Auth_Challenge_Sent");
                    }
                    self.send_session(socket, msg_type, &body, hmac).await?;
                },
                HandshakeAction::Close { reason } => {
                    tracing::error!(device_id = self.device_id, reason, "Auth_Failed");
                    return Err(SessionError::Handshake(
                        mowerlink_core::HandshakeError::VerifyFailed,
                    ));
                },
            }
        }

        if self.handshake.is_authenticated() {
            tracing::info!(device_id = self.device_id, "Auth_Success");
        }

        Ok(())
    }

    async fn handle_notification(&mut self, msg: &SessionMessage) {
        let Ok(ApplicationMessage { command: ntype, body }) = application::unpack(&msg.body)
        else {
            tracing::warn!(device_id = self.device_id, "Unknown_Notification");
            return;
        };
        let now = self.env.wall_clock_secs();
        notifications::handle_notification(self.device_id, ntype, &body, &self.sink, now).await;
    }

    async fn handle_regular(
        &mut self,
        msg: &SessionMessage,
        socket: &mut TcpStream,
    ) -> Result<(), SessionError> {
        let authorized = self.handshake.is_authenticated() || msg.hmac == BYPASS_HMAC;
        if !authorized {
            tracing::warn!(device_id = self.device_id, "Unauthenticated_Message");
            return Ok(());
        }

        let pres = match presentation::unpack(&msg.body) {
            Ok(pres) => pres,
            Err(e) => {
                tracing::error!(device_id = self.device_id, error = %e, "Invalid_Presentation_Message");
                return Ok(());
            },
        };
        let app = match application::unpack(&pres.body) {
            Ok(app) => app,
            Err(ProtocolError::ApplicationEmpty) => return Ok(()),
            Err(e) => {
                tracing::error!(device_id = self.device_id, error = %e, "Invalid_Application_Message");
                return Ok(());
            },
        };

        let ts = self.env.wall_clock_secs();
        let reply = handlers::handle_command(self.device_id, &app, &self.sink, ts).await;

        if let Reply::Send { command, body } = reply {
            let resp_app = application::pack(command, &body);
            let resp_pres = presentation::pack(pres.iin, &resp_app);
            let resp_hmac = if msg.hmac == BYPASS_HMAC {
                BYPASS_HMAC
            } else {
                self.handshake
                    .shared_secret()
                    .map(|secret| mowerlink_crypto::mac(secret, &resp_pres))
                    .unwrap_or(BYPASS_HMAC)
            };
            self.send_session(socket, MessageType::Regular.tag(), &resp_pres, resp_hmac).await?;
        }

        Ok(())
    }

    async fn send_session(
        &self,
        socket: &mut TcpStream,
        msg_type: u8,
        body: &[u8],
        hmac: u32,
    ) -> Result<(), SessionError> {
        let session_bytes = session::pack(msg_type, body, hmac);
        let frame_bytes = frame::encode(&session_bytes).map_err(SessionError::Protocol)?;
        socket.write_all(&frame_bytes).await.map_err(SessionError::Io)
    }
}

