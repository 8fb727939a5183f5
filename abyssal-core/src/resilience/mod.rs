//! Transient-failure handling (§5, §7 "Transient transport"): WebSocket
//! reconnection and broker-poll retry both back off the same way.

pub mod backoff;

pub use backoff::{BackoffConfig, ExponentialBackoff};
