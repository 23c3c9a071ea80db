//! Handshake state machine: `AwaitingHello -> AwaitingClientAuth ->
//! Authenticated` on the server side, `AwaitingChallenge -> Authenticated`
//! on the client side.
//!
//! This is a sans-IO state machine: it never touches a socket. Callers feed
//! it session-layer messages via [`Handshake::handle_session`] and execute
//! the returned [`HandshakeAction`]s (writing bytes, or closing the
//! connection). Time and randomness are supplied through an [`Environment`]
//! so the same logic runs identically against a real clock/RNG in
//! production and a fixed clock/RNG in tests.

use std::time::Duration;

use mowerlink_proto::{MessageType, presentation, session::SessionMessage};

use crate::{env::Environment, error::HandshakeError};

/// Per-hop handshake timeout: no reply within this window after sending
/// HELLO or CHALLENGE is a handshake failure.
pub const HOP_TIMEOUT: Duration = Duration::from_millis(500);

/// Handshake phase. Not every phase is reachable from every role: a server
/// handshake never enters [`Phase::AwaitingChallenge`] and a client
/// handshake never enters [`Phase::AwaitingClientAuth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Server: waiting for the client's HELLO.
    AwaitingHello,
    /// Client: HELLO sent, waiting for the server's CHALLENGE.
    AwaitingChallenge,
    /// Server: CHALLENGE sent, waiting for the client's CLIENT_AUTH.
    AwaitingClientAuth,
    /// Shared secret derived and verified; REGULAR/NOTIFICATION traffic may
    /// flow.
    Authenticated,
    /// Handshake failed or the connection is being torn down.
    Closed,
}

/// An action the caller must perform as a result of feeding the handshake a
/// message or a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction {
    /// Send a session-layer message: `(msg_type, body, hmac)`. The caller
    /// packs it with [`mowerlink_proto::session::pack`] and frames it with
    /// [`mowerlink_proto::frame::encode`].
    SendSession {
        /// Session message type tag.
        msg_type: u8,
        /// Session body (already presentation-wrapped where the wire
        /// format requires it).
        body: Vec<u8>,
        /// Session HMAC. Always the all-zero placeholder during the
        /// handshake.
        hmac: u32,
    },
    /// Close the connection; the handshake cannot proceed.
    Close {
        /// Human-readable reason, for logging.
        reason: String,
    },
}

/// The handshake state machine.
pub struct Handshake<E: Environment> {
    env: E,
    phase: Phase,
    our_secret: u16,
    our_public: u32,
    peer_public: Option<u32>,
    nonce: Option<u64>,
    shared_secret: Option<u32>,
    phase_deadline: Option<E::Instant>,
}

impl<E: Environment> Handshake<E> {
    /// Start a server-side handshake, awaiting the client's HELLO.
    ///
    /// The server's own DH keypair is not generated yet: it is generated
    /// when HELLO arrives, so that a server which never receives a HELLO
    /// never consumes randomness for a connection that went nowhere.
    #[must_use]
    pub fn new_server(env: E) -> Self {
        Self {
            env,
            phase: Phase::AwaitingHello,
            our_secret: 0,
            our_public: 0,
            peer_public: None,
            nonce: None,
            shared_secret: None,
            phase_deadline: None,
        }
    }

    /// Start a client-side handshake: generate our keypair, and return the
    /// HELLO to send.
    #[must_use]
    pub fn start_client(env: E, now: E::Instant) -> (Self, Vec<HandshakeAction>) {
        let our_secret = env.random_nonzero_u16();
        let our_public = mowerlink_crypto::dh_public(our_secret);

        let handshake = Self {
            env,
            phase: Phase::AwaitingChallenge,
            our_secret,
            our_public,
            peer_public: None,
            nonce: None,
            shared_secret: None,
            phase_deadline: Some(now),
        };

        let action = HandshakeAction::SendSession {
            msg_type: MessageType::Hello.tag(),
            body: our_public.to_be_bytes().to_vec(),
            hmac: 0,
        };

        (handshake, vec![action])
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True once the handshake has derived and verified a shared secret.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase == Phase::Authenticated
    }

    /// The derived Diffie-Hellman shared secret, once authenticated.
    #[must_use]
    pub fn shared_secret(&self) -> Option<u32> {
        self.shared_secret
    }

    /// Feed a session-layer message to the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::UnexpectedMessage`] if the message type
    /// does not belong in the current phase, [`HandshakeError::Malformed`]
    /// if a handshake body has the wrong length, and
    /// [`HandshakeError::VerifyFailed`] if an authenticator does not match.
    /// All three are fatal: the caller must close the connection.
    pub fn handle_session(
        &mut self,
        msg: &SessionMessage,
        now: E::Instant,
    ) -> Result<Vec<HandshakeAction>, HandshakeError> {
        match (self.phase, MessageType::from_tag(msg.msg_type)) {
            (Phase::AwaitingHello, Some(MessageType::Hello)) => self.on_hello(&msg.body, now),
            (Phase::AwaitingChallenge, Some(MessageType::Challenge)) => {
                self.on_challenge(&msg.body)
            },
            (Phase::AwaitingClientAuth, Some(MessageType::ClientAuth)) => {
                self.on_client_auth(&msg.body)
            },
            (phase, _) => {
                Err(HandshakeError::UnexpectedMessage { phase, msg_type: msg.msg_type })
            },
        }
    }

    /// True if the current phase has been waiting longer than
    /// [`HOP_TIMEOUT`] for its next message.
    #[must_use]
    pub fn timed_out(&self, now: E::Instant) -> bool {
        match self.phase_deadline {
            Some(deadline) if matches!(self.phase, Phase::AwaitingChallenge | Phase::AwaitingClientAuth) => {
                now >= deadline_plus(deadline, HOP_TIMEOUT)
            },
            _ => false,
        }
    }

    /// Mark the handshake closed (e.g. after a verification failure or
    /// timeout).
    pub fn close(&mut self) {
        self.phase = Phase::Closed;
    }

    fn on_hello(
        &mut self,
        body: &[u8],
        now: E::Instant,
    ) -> Result<Vec<HandshakeAction>, HandshakeError> {
        let client_public = parse_u32(body)?;

        let server_secret = self.env.random_nonzero_u16();
        let nonce = self.env.random_u64();
        let server_public = mowerlink_crypto::dh_public(server_secret);
        let auth_s = mowerlink_crypto::auth_tag(server_public, client_public, nonce);

        self.our_secret = server_secret;
        self.our_public = server_public;
        self.peer_public = Some(client_public);
        self.nonce = Some(nonce);
        self.phase = Phase::AwaitingClientAuth;
        self.phase_deadline = Some(now);

        let mut app_body = Vec::with_capacity(16);
        app_body.extend_from_slice(&server_public.to_be_bytes());
        app_body.extend_from_slice(&nonce.to_be_bytes());
        app_body.extend_from_slice(&auth_s.to_be_bytes());

        let session_body = presentation::pack(0, &app_body);

        Ok(vec![HandshakeAction::SendSession {
            msg_type: MessageType::Challenge.tag(),
            body: session_body,
            hmac: 0,
        }])
    }

    fn on_client_auth(&mut self, body: &[u8]) -> Result<Vec<HandshakeAction>, HandshakeError> {
        let auth_c = parse_u32(body)?;

        let client_public = self.peer_public.expect_or("client public key missing in AwaitingClientAuth")?;
        let nonce = self.nonce.expect_or("nonce missing in AwaitingClientAuth")?;

        let expected = mowerlink_crypto::auth_tag(client_public, self.our_public, nonce);
        if auth_c != expected {
            return Err(HandshakeError::VerifyFailed);
        }

        self.shared_secret = Some(mowerlink_crypto::dh_shared(client_public, self.our_secret));
        self.phase = Phase::Authenticated;
        Ok(Vec::new())
    }

    fn on_challenge(&mut self, body: &[u8]) -> Result<Vec<HandshakeAction>, HandshakeError> {
        let pres = presentation::unpack(body)
            .map_err(|e| HandshakeError::Malformed(e.to_string()))?;
        if pres.body.len() != 16 {
            return Err(HandshakeError::Malformed(format!(
                "challenge app body is {} bytes, expected 16",
                pres.body.len()
            )));
        }

        let server_public = u32::from_be_bytes(pres.body[0..4].try_into().unwrap_or([0; 4]));
        let nonce = u64::from_be_bytes(pres.body[4..12].try_into().unwrap_or([0; 8]));
        let auth_s = u32::from_be_bytes(pres.body[12..16].try_into().unwrap_or([0; 4]));

        let expected = mowerlink_crypto::auth_tag(server_public, self.our_public, nonce);
        if auth_s != expected {
            return Err(HandshakeError::VerifyFailed);
        }

        let auth_c = mowerlink_crypto::auth_tag(self.our_public, server_public, nonce);

        self.peer_public = Some(server_public);
        self.nonce = Some(nonce);
        self.shared_secret = Some(mowerlink_crypto::dh_shared(server_public, self.our_secret));
        self.phase = Phase::Authenticated;

        Ok(vec![HandshakeAction::SendSession {
            msg_type: MessageType::ClientAuth.tag(),
            body: auth_c.to_be_bytes().to_vec(),
            hmac: 0,
        }])
    }
}

fn parse_u32(body: &[u8]) -> Result<u32, HandshakeError> {
    let bytes: [u8; 4] = body
        .try_into()
        .map_err(|_| HandshakeError::Malformed(format!("expected 4 bytes, got {}", body.len())))?;
    Ok(u32::from_be_bytes(bytes))
}

fn deadline_plus<I: Copy + std::ops::Add<Duration, Output = I>>(start: I, dur: Duration) -> I {
    start + dur
}

trait OptionExt<T> {
    fn expect_or(self, msg: &str) -> Result<T, HandshakeError>;
}

impl<T> OptionExt<T> for Option<T> {
    fn expect_or(self, msg: &str) -> Result<T, HandshakeError> {
        self.ok_or_else(|| HandshakeError::Malformed(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mowerlink_proto::session;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct TestInstant(Duration);

    impl TestInstant {
        const ZERO: Self = Self(Duration::ZERO);
    }

    impl std::ops::Sub for TestInstant {
        type Output = Duration;

        fn sub(self, rhs: Self) -> Duration {
            self.0.saturating_sub(rhs.0)
        }
    }

    impl std::ops::Add<Duration> for TestInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self {
            Self(self.0 + rhs)
        }
    }

    #[derive(Clone)]
    struct FixedEnv {
        random_queue: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
    }

    impl FixedEnv {
        fn new(values: Vec<u8>) -> Self {
            Self { random_queue: std::sync::Arc::new(std::sync::Mutex::new(values)) }
        }
    }

    impl Environment for FixedEnv {
        type Instant = TestInstant;

        fn now(&self) -> TestInstant {
            TestInstant::ZERO
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut queue = self.random_queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            for slot in buffer {
                *slot = if queue.is_empty() { 0 } else { queue.remove(0) };
            }
        }

        fn wall_clock_secs(&self) -> u64 {
            0
        }
    }

    fn client_secret_bytes(secret: u16) -> Vec<u8> {
        secret.to_be_bytes().to_vec()
    }

    #[test]
    fn full_handshake_round_trip() {
        let server_env = FixedEnv::new({
            let mut bytes = client_secret_bytes(0x5678);
            bytes.extend_from_slice(&0x0102_0304_0506_0708u64.to_be_bytes());
            bytes
        });
        let client_env = FixedEnv::new(client_secret_bytes(0x1234));

        let mut server = Handshake::new_server(server_env);
        let (mut client, client_actions) = Handshake::start_client(client_env, TestInstant::ZERO);

        let HandshakeAction::SendSession { msg_type, body, hmac } = &client_actions[0] else {
            panic!("expected SendSession");
        };
        assert_eq!(*msg_type, MessageType::Hello.tag());
        assert_eq!(*hmac, 0);
        let hello_session = session::pack(*msg_type, body, *hmac);
        let hello_msg = session::unpack(&hello_session).unwrap();

        let server_actions = server.handle_session(&hello_msg, TestInstant::ZERO).unwrap();
        let HandshakeAction::SendSession { msg_type, body, hmac } = &server_actions[0] else {
            panic!("expected SendSession");
        };
        assert_eq!(*msg_type, MessageType::Challenge.tag());
        let challenge_session = session::pack(*msg_type, body, *hmac);
        let challenge_msg = session::unpack(&challenge_session).unwrap();

        let client_actions = client.handle_session(&challenge_msg, TestInstant::ZERO).unwrap();
        assert!(client.is_authenticated());
        let HandshakeAction::SendSession { msg_type, body, hmac } = &client_actions[0] else {
            panic!("expected SendSession");
        };
        assert_eq!(*msg_type, MessageType::ClientAuth.tag());
        let auth_session = session::pack(*msg_type, body, *hmac);
        let auth_msg = session::unpack(&auth_session).unwrap();

        let actions = server.handle_session(&auth_msg, TestInstant::ZERO).unwrap();
        assert!(actions.is_empty());
        assert!(server.is_authenticated());

        assert_eq!(server.shared_secret(), client.shared_secret());
    }

    #[test]
    fn hello_vector_matches_spec() {
        let client_secret: u16 = 0x1234;
        let client_public = mowerlink_crypto::dh_public(client_secret);

        let body = client_public.to_be_bytes().to_vec();
        let session_bytes = session::pack(MessageType::Hello.tag(), &body, 0);
        let frame = mowerlink_proto::frame::encode(&session_bytes).unwrap();

        assert_eq!(frame[0], mowerlink_proto::frame::SOF);
        assert_eq!(frame[1], 0x09);
    }

    #[test]
    fn wrong_client_auth_is_rejected() {
        let server_env = FixedEnv::new({
            let mut bytes = client_secret_bytes(0x5678);
            bytes.extend_from_slice(&0x0102_0304_0506_0708u64.to_be_bytes());
            bytes
        });
        let mut server = Handshake::new_server(server_env);

        let client_public = mowerlink_crypto::dh_public(0x1234);
        let hello = session::pack(MessageType::Hello.tag(), &client_public.to_be_bytes(), 0);
        server.handle_session(&session::unpack(&hello).unwrap(), TestInstant::ZERO).unwrap();

        let bad_auth = session::pack(MessageType::ClientAuth.tag(), &0xDEAD_BEEFu32.to_be_bytes(), 0);
        let result = server.handle_session(&session::unpack(&bad_auth).unwrap(), TestInstant::ZERO);
        assert_eq!(result, Err(HandshakeError::VerifyFailed));
    }

    #[test]
    fn unexpected_message_type_is_rejected() {
        let server_env = FixedEnv::new(Vec::new());
        let mut server = Handshake::new_server(server_env);

        let client_auth = session::pack(MessageType::ClientAuth.tag(), &[0, 0, 0, 0], 0);
        let result = server.handle_session(&session::unpack(&client_auth).unwrap(), TestInstant::ZERO);
        assert!(matches!(result, Err(HandshakeError::UnexpectedMessage { .. })));
    }
}
