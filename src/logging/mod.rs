//! Structured logging with consent context.
//!
//! Provides logging macros and utilities that include the ad unit id and,
//! for network exchanges, a request id in every log message.

pub mod structured;

pub use structured::*;
