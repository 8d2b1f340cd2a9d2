//! Consent Core - consent and advertising-identity sync engine
//!
//! This crate tracks a user's personal-data consent for an ad SDK host,
//! keeps it in step with the ad server, and tells the host when data
//! collection is allowed. The implementation prioritizes:
//!
//! 1. **Durability** - Every state change is persisted before anyone hears of it
//! 2. **Logging** - Every decision point logged with ad unit and request context
//! 3. **Non-blocking hosts** - Network and identity work never runs on the caller's lock
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `consent` - Status model, transitions and the orchestrator
//! - `identity` - Advertising identity ownership and refresh
//! - `sync` - Sync gating, request building, response parsing, transport seam
//! - `dialog` - Consent dialog load/show lifecycle
//! - `storage` - Snapshot model and key-value persistence
//! - `config` - Engine configuration
//! - `logging` - Structured logging with ad unit context

pub mod config;
pub mod consent;
pub mod dialog;
pub mod error;
pub mod identity;
pub mod logging;
pub mod storage;
pub mod sync;

pub use config::EngineConfig;
pub use consent::{
    ConsentChangeEvent, ConsentChangeReason, ConsentOrchestrator, ConsentStatus,
    PersonalDataHooks,
};
pub use error::{DialogError, NetworkError, StoreError};

/// Initialize the process-wide logger.
///
/// Safe to call more than once; only the first call installs a logger.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}
