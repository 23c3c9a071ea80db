//! Action dispatcher (C9): outbound client role used by the operator
//! façade. Connects to a device's listener, performs the client-side
//! handshake, sends one command, and returns the first REGULAR reply.

use std::{
    sync::atomic::{AtomicU16, Ordering},
    time::Duration,
};

use bytes::{Buf, Bytes, BytesMut};
use mowerlink_core::{Environment, Handshake, HandshakeAction, handshake::HOP_TIMEOUT};
use mowerlink_proto::{
    application, frame, presentation,
    session::{self, MessageType},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::error::DispatchError;

/// TCP connect budget.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Total budget for the client-side handshake to complete.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Budget for the first REGULAR reply to arrive after a command is sent.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Delay between shutting down the write half and dropping the socket.
pub const GRACEFUL_CLOSE_DELAY: Duration = Duration::from_millis(50);

/// The device's reply to a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReply {
    /// IIN echoed from the request.
    pub iin: u16,
    /// Response command byte.
    pub command: u8,
    /// Response body.
    pub body: Vec<u8>,
}

/// Sends one command to one device listener and returns its reply.
///
/// `Clone + Send + Sync`: a single dispatcher is expected to be shared
/// across concurrent operator requests. The IIN counter is atomic so
/// concurrent dispatches never reuse an IIN.
pub struct Dispatcher<E: Environment> {
    env: E,
    next_iin: AtomicU16,
}

impl<E: Environment> Dispatcher<E> {
    /// Build a dispatcher. The IIN counter starts at 1.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self { env, next_iin: AtomicU16::new(1) }
    }

    /// Connect to `127.0.0.1:port`, authenticate, send `command`/`body`,
    /// and return the peer's first REGULAR reply.
    pub async fn dispatch(
        &self,
        port: u16,
        command: u8,
        body: &[u8],
    ) -> Result<DispatchReply, DispatchError> {
        tracing::debug!(port, command, "dispatching command to device");

        let mut socket = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(("127.0.0.1", port)))
            .await
            .map_err(|_| DispatchError::ConnectTimeout)??;

        let shared_secret =
            tokio::time::timeout(HANDSHAKE_TIMEOUT, self.run_handshake(&mut socket))
                .await
                .map_err(|_| {
                    tracing::warn!(port, "handshake timed out dispatching to device");
                    DispatchError::Handshake(mowerlink_core::HandshakeError::AuthTimeout {
                        elapsed: HANDSHAKE_TIMEOUT,
                    })
                })??;

        let reply = tokio::time::timeout(
            RESPONSE_TIMEOUT,
            self.send_command(&mut socket, shared_secret, command, body),
        )
        .await
        .map_err(|_| {
            tracing::warn!(port, "timed out awaiting device reply");
            DispatchError::ResponseTimeout
        })??;

        let _ = socket.shutdown().await;
        tokio::time::sleep(GRACEFUL_CLOSE_DELAY).await;

        Ok(reply)
    }

    async fn run_handshake(&self, socket: &mut TcpStream) -> Result<u32, DispatchError> {
        let (mut handshake, actions) = Handshake::start_client(self.env.clone(), self.env.now());
        send_actions(socket, actions).await?;

        loop {
            let frame_payload = read_frame(socket, HOP_TIMEOUT).await?;
            let msg = session::unpack(&frame_payload)?;
            let actions = handshake.handle_session(&msg, self.env.now())?;
            send_actions(socket, actions).await?;

            if handshake.is_authenticated() {
                return Ok(handshake.shared_secret().expect("authenticated handshake has a shared secret"));
            }
        }
    }

    async fn send_command(
        &self,
        socket: &mut TcpStream,
        shared_secret: u32,
        command: u8,
        body: &[u8],
    ) -> Result<DispatchReply, DispatchError> {
        let iin = self.next_iin.fetch_add(1, Ordering::Relaxed);
        let app = application::pack(command, body);
        let pres = presentation::pack(iin, &app);
        let hmac = mowerlink_crypto::mac(shared_secret, &pres);

        send_session(socket, MessageType::Regular.tag(), &pres, hmac).await?;

        loop {
            let frame_payload = read_frame(socket, RESPONSE_TIMEOUT).await?;
            let msg = session::unpack(&frame_payload)?;
            if msg.msg_type == MessageType::Regular.tag() {
                let pres = presentation::unpack(&msg.body)?;
                let app = application::unpack(&pres.body)?;
                return Ok(DispatchReply { iin: pres.iin, command: app.command, body: app.body.to_vec() });
            }
        }
    }
}

async fn send_actions(
    socket: &mut TcpStream,
    actions: Vec<HandshakeAction>,
) -> Result<(), DispatchError> {
    for action in actions {
        match action {
            HandshakeAction::SendSession { msg_type, body, hmac } => {
                send_session(socket, msg_type, &body, hmac).await?;
            },
            HandshakeAction::Close { .. } => {
                return Err(DispatchError::Handshake(mowerlink_core::HandshakeError::VerifyFailed));
            },
        }
    }
    Ok(())
}

async fn send_session(
    socket: &mut TcpStream,
    msg_type: u8,
    body: &[u8],
    hmac: u32,
) -> Result<(), DispatchError> {
    let session_bytes = session::pack(msg_type, body, hmac);
    let frame_bytes = frame::encode(&session_bytes)?;
    socket.write_all(&frame_bytes).await?;
    Ok(())
}

/// Read bytes from `socket` until one complete frame decodes, bounded by
/// `budget`.
async fn read_frame(socket: &mut TcpStream, budget: Duration) -> Result<Bytes, DispatchError> {
    tokio::time::timeout(budget, async {
        let mut buf = BytesMut::with_capacity(256);
        loop {
            match frame::decode(&buf) {
                Ok(frame::DecodeOutcome::Frame { payload, consumed }) => {
                    buf.advance(consumed);
                    return Ok(payload);
                },
                Ok(frame::DecodeOutcome::Incomplete) => {},
                Err(e) => return Err(DispatchError::Protocol(e)),
            }

            let mut tmp = [0u8; 256];
            let n = socket.read(&mut tmp).await?;
            if n == 0 {
                return Err(DispatchError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "peer closed connection",
                )));
            }
            buf.extend_from_slice(&tmp[..n]);
        }
    })
    .await
    .map_err(|_| DispatchError::ResponseTimeout)?
}
