//! Response parsing for the sync and consent-dialog handshakes.

use crate::error::{DialogError, NetworkError};
use crate::sync::fields::{flag, optional_string, parse_object, required_string};
use crate::sync::overrides::ServerOverrides;

/// Parsed status-sync response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub is_gdpr_region: bool,
    pub is_whitelisted: bool,
    pub overrides: ServerOverrides,
    pub current_vendor_list_version: String,
    pub current_vendor_list_link: String,
    pub current_privacy_policy_version: String,
    pub current_privacy_policy_link: String,
    pub current_vendor_list_iab_format: Option<String>,
    pub current_vendor_list_iab_hash: String,
    pub call_again_after_secs: Option<String>,
    pub extras: Option<String>,
    pub consent_change_reason: Option<String>,
}

impl SyncResponse {
    pub fn parse(body: &str) -> Result<Self, NetworkError> {
        let obj = parse_object(body)?;

        // Only a literal "0" (or false) takes the user out of the region.
        let is_gdpr_region = match obj.get("is_gdpr_region") {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(value) => crate::sync::fields::value_to_string(value).trim() != "0",
            None => true,
        };

        Ok(Self {
            is_gdpr_region,
            is_whitelisted: flag(&obj, "is_whitelisted"),
            overrides: ServerOverrides::from_json(&obj),
            current_vendor_list_version: required_string(&obj, "current_vendor_list_version")?,
            current_vendor_list_link: required_string(&obj, "current_vendor_list_link")?,
            current_privacy_policy_version: required_string(
                &obj,
                "current_privacy_policy_version",
            )?,
            current_privacy_policy_link: required_string(&obj, "current_privacy_policy_link")?,
            current_vendor_list_iab_format: optional_string(&obj, "current_vendor_list_iab_format"),
            current_vendor_list_iab_hash: required_string(&obj, "current_vendor_list_iab_hash")?,
            call_again_after_secs: optional_string(&obj, "call_again_after_secs"),
            extras: optional_string(&obj, "extras"),
            consent_change_reason: optional_string(&obj, "consent_change_reason"),
        })
    }
}

/// Parsed consent-dialog response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogResponse {
    pub html: String,
}

impl DialogResponse {
    /// Malformed or missing `dialog_html` is a bad body; a blank one is an
    /// empty payload.
    pub fn parse(body: &str) -> Result<Self, DialogError> {
        let obj = parse_object(body)?;
        let html = required_string(&obj, "dialog_html")?;
        if html.trim().is_empty() {
            return Err(DialogError::EmptyPayload);
        }
        Ok(Self { html })
    }
}
