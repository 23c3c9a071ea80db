//! Action façade: the operator-facing policy layer. Applies the
//! pre-condition state table before translating an operator intent into a
//! wire command and handing it to the [`Dispatcher`].
//!
//! This is deliberately a *policy* layer, not a protocol layer: the wire
//! handler (`mowerlink-server`'s command handlers) never enforces these
//! preconditions itself, per the device-is-the-authority design.

use mowerlink_core::{DeviceRegistry, DeviceState, Environment, TelemetrySink};

use crate::{dispatcher::Dispatcher, error::FacadeError};

/// An operator-requested action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start mowing.
    Start,
    /// Stop and hold position.
    Stop,
    /// Return to the charging station.
    Home,
    /// Acknowledge a reported fault.
    AckError,
}

impl Action {
    const fn wire_command(self) -> (u8, Option<u8>) {
        match self {
            Self::Start => (0x01, Some(0x01)),
            Self::Stop => (0x01, Some(0x00)),
            Self::Home => (0x01, Some(0x02)),
            Self::AckError => (0x02, None),
        }
    }

    const fn expected_new_state(self) -> DeviceState {
        match self {
            Self::Start => DeviceState::Mowing,
            Self::Stop | Self::AckError => DeviceState::Paused,
            Self::Home => DeviceState::ReturningToStation,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Home => "home",
            Self::AckError => "ackerror",
        }
    }

    const fn permitted_from(self, state: DeviceState) -> bool {
        matches!(
            (self, state),
            (Self::Start, DeviceState::StationCharging)
                | (Self::Start, DeviceState::StationChargingCompleted)
                | (Self::Start, DeviceState::Paused)
                | (Self::Stop, DeviceState::Mowing)
                | (Self::Home, DeviceState::Mowing)
                | (Self::Home, DeviceState::Paused)
                | (Self::Stop, DeviceState::ReturningToStation)
                | (Self::AckError, DeviceState::Error)
        )
    }
}

/// Result of a successful dispatched action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The device's persisted state before this action.
    pub previous_state: DeviceState,
    /// The device's persisted state after this action.
    pub new_state: DeviceState,
    /// Wall-clock timestamp the action was applied.
    pub ts: u64,
    /// Raw reply command byte from the device.
    pub protocol_reply_command: u8,
}

/// The façade: ties a dispatcher, registry, and telemetry sink together
/// behind the single `dispatch_action` entry point operators call.
pub struct ActionFacade<E: Environment, R: DeviceRegistry, S: TelemetrySink> {
    dispatcher: Dispatcher<E>,
    registry: R,
    sink: S,
    env: E,
}

impl<E: Environment, R: DeviceRegistry, S: TelemetrySink> ActionFacade<E, R, S> {
    /// Build a façade over the given dispatcher dependencies.
    #[must_use]
    pub fn new(env: E, registry: R, sink: S) -> Self {
        let dispatcher = Dispatcher::new(env.clone());
        Self { dispatcher, registry, sink, env }
    }

    /// Apply an operator-requested action to a device, after checking the
    /// pre-condition table against the device's latest persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::InvalidTransition`] if `action` is not
    /// permitted from the device's current state, [`FacadeError::Dispatch`]
    /// if the underlying wire exchange fails, and [`FacadeError::Sink`] if
    /// persisting the new state afterward fails.
    pub async fn dispatch_action(
        &self,
        device_id: u64,
        current_state: DeviceState,
        action: Action,
    ) -> Result<ActionOutcome, FacadeError> {
        if !action.permitted_from(current_state) {
            return Err(FacadeError::InvalidTransition {
                action: action.name().to_string(),
                current_state,
            });
        }

        let device = self
            .registry
            .get_device(device_id)
            .map_err(|e| FacadeError::Dispatch(e.into()))?
            .ok_or(FacadeError::Dispatch(crate::error::DispatchError::DeviceNotProvisioned(
                device_id,
            )))?;

        let (command, action_body_byte) = action.wire_command();
        let body: Vec<u8> = action_body_byte.into_iter().collect();

        let reply = self.dispatcher.dispatch(device.port, command, &body).await?;

        let new_state = action.expected_new_state();
        let ts = self.env.wall_clock_secs();
        self.sink.record_state(device_id, new_state, ts).await?;

        Ok(ActionOutcome {
            previous_state: current_state,
            new_state,
            ts,
            protocol_reply_command: reply.command,
        })
    }
}
