//! Zenoh bridge for IO-Link masters.
//!
//! This bridge polls the process data of sensors attached to IO-Link masters
//! over their REST API, decodes it into engineering values and publishes
//! data-changed events to Zenoh. It also relays output commands (switching a
//! port on or off) from the bus or from the [`api::BridgeApi`] to the masters.
//!
//! # Key Expressions
//!
//! ```text
//! instruments_ti                           all readings
//! instrument/<device>                      readings of one device
//! instrument/<unit>/<device>/temperature   readings of one device of a unit
//! instrument/<device>/iolink/<port>        output commands ("1" / "0")
//! iolink/@/status                          bridge status
//! iolink/@/commands/result                 outcome of each output command
//! ```

pub mod address;
pub mod api;
pub mod backoff;
pub mod cache;
pub mod commands;
pub mod config;
pub mod context;
pub mod decode;
pub mod events;
pub mod poller;
pub mod relay;
