//! Core domain + application logic for the Telegram reminder relay.
//!
//! This crate is intentionally framework-agnostic. Telegram and the HTTP
//! surface live behind ports (traits) implemented in adapter crates.

pub mod broadcast;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod store;

pub use errors::{Error, Result};
