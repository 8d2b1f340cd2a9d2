//! Consent state machine.
//!
//! - `status` / `reason` - the consent vocabulary
//! - `transition` - pure snapshot transitions
//! - `orchestrator` - sequencing, persistence and fan-out
//! - `events` / `hooks` - what the host observes

pub mod events;
pub mod hooks;
pub mod orchestrator;
pub mod reason;
pub mod status;
pub mod transition;

pub use events::*;
pub use hooks::*;
pub use orchestrator::*;
pub use reason::*;
pub use status::*;
pub use transition::*;
