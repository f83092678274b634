//! Error types for the data engine.

use thiserror::Error;

/// Errors raised while decoding or composing an action frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer shorter than the fixed part being read.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Category, action or OUI do not identify a NAN action frame.
    #[error("not a NAN action frame")]
    BadHeader,

    /// Action subtype outside the data path and schedule set.
    #[error("unknown action subtype: {0:#04x}")]
    UnknownSubtype(u8),

    /// Attribute length runs past the end of the frame.
    #[error("attribute {id:#04x} declares {declared} bytes, {available} available")]
    AttributeOverrun {
        /// Attribute id.
        id: u8,
        /// Declared body length.
        declared: usize,
        /// Remaining bytes.
        available: usize,
    },

    /// A mandatory attribute is absent.
    #[error("missing {0} attribute")]
    MissingAttribute(&'static str),

    /// Attribute combination cannot be interpreted.
    #[error("contradictory attributes: {0}")]
    Contradictory(&'static str),

    /// A field carries a value outside its defined range.
    #[error("invalid {field}: {value:#04x}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: u8,
    },
}

/// Errors reported by the frame transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The management queue cannot take another frame.
    #[error("transmit queue full")]
    QueueFull,

    /// No usable link to the destination.
    #[error("link down")]
    LinkDown,
}

/// Invalid engine configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Session limit is zero.
    #[error("max_ndp_sessions must be at least 1")]
    NoSessions,

    /// A timeout is zero.
    #[error("{0} must be non-zero")]
    ZeroTimeout(&'static str),

    /// A retry limit is zero.
    #[error("{0} must be at least 1")]
    ZeroRetryLimit(&'static str),
}

/// Top-level engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine has been shut down.
    #[error("engine not initialized")]
    NotInitialized,

    /// The link is already negotiating another session.
    #[error("data link busy with another negotiation")]
    Busy,

    /// No free link or session slot.
    #[error("no free data link or data path slot")]
    Resources,

    /// Referenced link or session does not exist.
    #[error("no matching data link or data path")]
    NotFound,

    /// Command or frame parameters are not acceptable.
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),

    /// Event dropped on purpose (duplicate, stale or unsolicited).
    #[error("ignored: {0}")]
    Ignored(&'static str),

    /// Event does not fit the current protocol state.
    #[error("unexpected in current state")]
    UnexpectedState,

    /// Frame decode error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
