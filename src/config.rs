//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default minimum interval between unforced syncs (5 minutes).
pub const DEFAULT_SYNC_DELAY_MS: u64 = 300_000;

/// Default capacity of each subscriber's change-event queue.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Host serving the sync and dialog endpoints
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_sync_path")]
    pub sync_path: String,

    #[serde(default = "default_dialog_path")]
    pub dialog_path: String,

    /// Ad unit used for initialization; empty falls back to the cached one
    #[serde(default)]
    pub ad_unit_id: String,

    #[serde(default = "default_sdk_version")]
    pub sdk_version: String,

    #[serde(default)]
    pub bundle_id: String,

    /// Language code used for localized links and the dialog request
    #[serde(default = "default_language")]
    pub language: String,

    /// App engine metadata (e.g. "unity", "2021.3")
    #[serde(default)]
    pub app_engine_name: String,

    #[serde(default)]
    pub app_engine_version: String,

    #[serde(default)]
    pub wrapper_version: String,

    /// Minimum interval between unforced syncs, until the server overrides it
    #[serde(default = "default_sync_delay_ms")]
    pub sync_delay_ms: u64,

    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Log every identity refresh at info level (test switch)
    #[serde(default)]
    pub verbose_identity_logging: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            sync_path: default_sync_path(),
            dialog_path: default_dialog_path(),
            ad_unit_id: String::new(),
            sdk_version: default_sdk_version(),
            bundle_id: String::new(),
            language: default_language(),
            app_engine_name: String::new(),
            app_engine_version: String::new(),
            wrapper_version: String::new(),
            sync_delay_ms: default_sync_delay_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            verbose_identity_logging: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_ad_unit(mut self, ad_unit_id: &str) -> Self {
        self.ad_unit_id = ad_unit_id.to_string();
        self
    }
}

fn default_host() -> String {
    "ads.example.com".to_string()
}

fn default_sync_path() -> String {
    "/m/gdpr_sync".to_string()
}

fn default_dialog_path() -> String {
    "/m/gdpr_consent_dialog".to_string()
}

fn default_sdk_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_sync_delay_ms() -> u64 {
    DEFAULT_SYNC_DELAY_MS
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}
