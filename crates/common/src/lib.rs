//! Shared types, error definitions, and utilities used across all clawden crates.

pub mod error;
pub mod time;

pub use error::{ClawdenError, Error, FromMessage, Result};
