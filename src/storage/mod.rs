//! Storage module.
//!
//! Key-value backends, the persisted consent snapshot and its repository.

pub mod backend;
pub mod macros;
pub mod models;
pub mod store;

pub use backend::*;
pub use macros::*;
pub use models::*;
pub use store::*;
