//! Advertising identity value types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a platform identity source reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformIdentity {
    pub platform_id: String,
    pub do_not_track: bool,
}

impl PlatformIdentity {
    pub fn new(platform_id: &str, do_not_track: bool) -> Self {
        Self {
            platform_id: platform_id.to_string(),
            do_not_track,
        }
    }
}

/// The device advertising identity.
///
/// Replaced wholesale on every refresh; the surrogate id survives refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdvertisingIdentity {
    pub platform_id: String,
    pub surrogate_id: String,
    pub do_not_track: bool,
}

impl AdvertisingIdentity {
    /// Fresh identity: no platform id, new surrogate id, tracking allowed.
    pub fn generate() -> Self {
        Self {
            platform_id: String::new(),
            surrogate_id: Uuid::new_v4().to_string(),
            do_not_track: false,
        }
    }

    /// New identity carrying `platform`'s values and this surrogate id.
    pub fn refreshed_with(&self, platform: PlatformIdentity) -> Self {
        Self {
            platform_id: platform.platform_id,
            surrogate_id: self.surrogate_id.clone(),
            do_not_track: platform.do_not_track,
        }
    }
}
