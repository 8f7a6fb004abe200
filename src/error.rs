//! Crate error taxonomy.
//!
//! Setup errors (`MalformedDescriptor`, `UnsupportedTopology`, `HandshakeFailed`)
//! are fatal to a connection attempt and quarantine the device id for the rest
//! of the session. Transport errors split into `TransportTimeout`, which is
//! counted against a per-binding ceiling, and `TransportError`, which tears
//! down the current binding immediately but leaves the device eligible for a
//! later search cycle.
//!
//! None of these reach the caller of [`Gamepad::update`](crate::Gamepad::update);
//! the connection manager converts them into registry entries and state
//! transitions.

use thiserror::Error;

/// Errors produced while parsing descriptors, classifying, initializing, or
/// polling a device.
#[derive(Debug, Error)]
pub enum Error {
    /// Descriptor bytes could not be parsed into a consistent topology.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(&'static str),

    /// A configuration or interface index outside the parsed topology.
    #[error("descriptor index out of range")]
    IndexOutOfRange,

    /// The classified family needs endpoints or interfaces the device lacks.
    #[error("unsupported topology: {0}")]
    UnsupportedTopology(&'static str),

    /// A family-specific initialization sequence did not complete.
    #[error("handshake failed: {0}")]
    HandshakeFailed(&'static str),

    /// A bounded transport read or write expired.
    #[error("transport timeout")]
    TransportTimeout,

    /// Any non-timeout transport failure.
    #[error("transport error: {0}")]
    TransportError(String),
}

impl Error {
    /// Whether this is the transient timeout condition rather than a hard
    /// transport failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TransportTimeout)
    }
}

/// A specialized `Result` for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
