//! Advertising identity module.
//!
//! Owns the device advertising identity and keeps it fresh:
//! - Identity value types
//! - Platform identity sources (with fallback chaining)
//! - Coalesced background refresh with change notification

pub mod advertising;
pub mod manager;
pub mod source;

pub use advertising::*;
pub use manager::*;
pub use source::*;
