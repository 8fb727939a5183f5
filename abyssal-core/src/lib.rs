//! `abyssal-core`: the order-book state engine and the order-and-trade
//! lifecycle engine that back a real-time market-making pipeline (see
//! `SPEC_FULL.md` for the full system description).
//!
//! Three services are built from this crate: a Depth Engine (`book`,
//! `depth_engine`, `frame`, `codec`), a Decision Relay (`relay`), and a
//! Lifecycle Engine (`lifecycle`). The broker transport, exchange
//! transport, configuration, resilience and monitoring modules are the
//! ambient stack shared by all three binaries in `abyssal-bins`.

pub mod book;
pub mod broker;
pub mod codec;
pub mod config;
pub mod depth_engine;
pub mod errors;
pub mod exchange;
pub mod frame;
pub mod lifecycle;
pub mod monitoring;
pub mod relay;
pub mod resilience;
