//! Core of the episode bot: catalog, deep-link routing, batch emission and
//! durable delayed deletion of sent messages.
//!
//! This crate is framework-agnostic. The chat transport lives behind
//! [`messaging::port::MessagingPort`], implemented in the adapter crate.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod deletion;
pub mod domain;
pub mod emission;
pub mod errors;
pub mod frontend;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod mocks;
pub mod payload;

pub use errors::{Error, Result};
