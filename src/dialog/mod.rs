//! Consent dialog module.

pub mod controller;

pub use controller::*;
