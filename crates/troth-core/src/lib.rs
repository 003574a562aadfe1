//! Core types and trait definitions for the Troth account-lifecycle service.
//!
//! This crate stays free of HTTP and database dependencies. Every other
//! crate depends on it; it pulls in nothing heavier than serde and chrono.

pub mod error;
pub mod orchestrator;
pub mod owned;
pub mod pairing;
pub mod person;
pub mod registry;
pub mod store;

pub use error::{Error, Result};
