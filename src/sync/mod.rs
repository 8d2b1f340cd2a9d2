//! Sync protocol module.
//!
//! Wire codec and gating for the two network handshakes:
//! - Status sync (request builder, response parser, server overrides)
//! - Consent dialog load
//! - The `should_sync` rate-limit predicate
//! - The transport boundary

pub mod fields;
pub mod overrides;
pub mod policy;
pub mod request;
pub mod response;
pub mod transport;

pub use overrides::*;
pub use policy::*;
pub use request::*;
pub use response::*;
pub use transport::*;
