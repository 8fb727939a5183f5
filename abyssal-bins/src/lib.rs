//! Shared bootstrap code for the `depth-engine`, `decision-relay` and
//! `lifecycle-engine` binaries.

pub mod common;
