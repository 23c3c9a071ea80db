//! Mower fleet backend: production glue around [`mowerlink_core`].
//!
//! [`supervisor::ListenerSupervisor`] binds one TCP listener per
//! provisioned device and spawns a [`session::Session`] for every accepted
//! socket. [`system_env::SystemEnv`] is the production
//! [`mowerlink_core::Environment`]: real system time, `tokio` sleep, and OS
//! cryptographic randomness.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handlers;
pub mod memory;
pub mod notifications;
pub mod registry_file;
pub mod session;
pub mod supervisor;
pub mod system_env;

pub use error::SessionError;
pub use memory::{DeviceTelemetry, MemoryRegistry, MemorySink};
pub use session::Session;
pub use supervisor::ListenerSupervisor;
pub use system_env::SystemEnv;
