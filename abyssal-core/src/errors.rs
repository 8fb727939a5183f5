//! Domain-specific error types.
//!
//! Each engine gets its own error enum so callers can match on the precise
//! failure instead of threading string errors through `anyhow`. Error types
//! that cross a crate boundary (codec, book, sizing) derive `thiserror`;
//! service-level glue uses `anyhow::Result` the way the binaries do.

use thiserror::Error;

/// Errors produced by the wire-level codec (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CodecError {
    /// A change-value input fell outside the encodable range `[-1, 1)`.
    #[error("change value {0} out of encodable range [-1, 1)")]
    ChangeValueOutOfRange(f64),

    /// An orderbook-value input fell outside the encodable range `[-1024, 1024)`.
    #[error("orderbook value {0} out of encodable range [-1024, 1024)")]
    OrderbookValueOutOfRange(f64),

    /// `mid_price_cents` fell outside `[0, 1_000_000.00]`.
    #[error("mid price {0} cents out of range [0, 100_000_000]")]
    MidPriceOutOfRange(u32),

    /// The buffer handed to a decode routine was the wrong length.
    #[error("wire buffer has {actual} bytes, expected {expected}")]
    ShortBuffer { expected: usize, actual: usize },
}

/// Errors produced while maintaining the dense order book (§3.2, §4.1).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookError {
    /// A side did not contain exactly `LEVELS_PER_SIDE` entries after a
    /// snapshot or delta was applied. Fatal for the current session.
    #[error("{side} side has {actual} levels, expected {expected}")]
    LevelCountViolation {
        side: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The depth feed delivered an `update` frame before any `snapshot`.
    #[error("received update before an initial snapshot")]
    MissingSnapshot,

    /// A depth-feed JSON frame could not be parsed.
    #[error("malformed depth frame: {0}")]
    MalformedFrame(String),
}

/// Errors produced by the position-sizing policy (§4.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SizingError {
    /// The requested (or overrun-adjusted) size fell below `MIN_CONTRACT`.
    #[error("size {requested} below minimum contract {min_contract} after adjustment")]
    BelowMinimum { requested: f64, min_contract: f64 },
}

/// Errors raised while assembling configuration from the environment (§6.4).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
}
