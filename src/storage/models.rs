//! Persisted consent model.
//!
//! The snapshot is read and written as a whole; it is the only record of
//! consent state that survives a restart.

use serde::{Deserialize, Serialize};

use crate::consent::{ConsentChangeReason, ConsentStatus};
use crate::storage::macros::substitute_language_macro;

/// Durable aggregate of all consent-related fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentSnapshot {
    // Identity fields
    pub ad_unit_id: String,
    pub cached_last_ad_unit_id_used_for_init: String,
    /// Platform id captured while the status is `ExplicitYes`
    pub ifa: Option<String>,
    pub consent_status_before_dnt: Option<ConsentStatus>,

    // Status fields
    pub consent_status: ConsentStatus,
    pub last_successfully_synced_consent_status: Option<ConsentStatus>,
    pub last_changed_ms: Option<i64>,
    pub consent_change_reason: ConsentChangeReason,
    pub should_reacquire_consent: bool,

    // Regulatory fields
    pub gdpr_applies: Option<bool>,
    pub force_gdpr_applies: bool,

    // Server-authoritative fields
    pub is_whitelisted: bool,
    pub current_vendor_list_version: Option<String>,
    pub current_vendor_list_link: Option<String>,
    pub current_vendor_list_iab_format: Option<String>,
    pub current_vendor_list_iab_hash: Option<String>,
    pub current_privacy_policy_version: Option<String>,
    pub current_privacy_policy_link: Option<String>,
    pub consented_vendor_list_version: Option<String>,
    pub consented_vendor_list_iab_format: Option<String>,
    pub consented_privacy_policy_version: Option<String>,
    pub extras: Option<String>,
}

impl ConsentSnapshot {
    /// Region applicability with the sticky force flag folded in.
    pub fn effective_gdpr_applies(&self) -> Option<bool> {
        if self.force_gdpr_applies {
            Some(true)
        } else {
            self.gdpr_applies
        }
    }

    /// Copy the server's current versions into the consented fields.
    pub(crate) fn record_consented_versions(&mut self) {
        self.consented_vendor_list_version = self.current_vendor_list_version.clone();
        self.consented_privacy_policy_version = self.current_privacy_policy_version.clone();
        self.consented_vendor_list_iab_format = self.current_vendor_list_iab_format.clone();
    }

    pub(crate) fn clear_consented_versions(&mut self) {
        self.consented_vendor_list_version = None;
        self.consented_privacy_policy_version = None;
        self.consented_vendor_list_iab_format = None;
    }

    /// Read-only view handed to hosts, with localized links.
    pub fn consent_data(&self, language: &str) -> ConsentData {
        ConsentData {
            current_vendor_list_version: self.current_vendor_list_version.clone(),
            current_vendor_list_link: self
                .current_vendor_list_link
                .as_deref()
                .map(|link| substitute_language_macro(link, language)),
            current_privacy_policy_version: self.current_privacy_policy_version.clone(),
            current_privacy_policy_link: self
                .current_privacy_policy_link
                .as_deref()
                .map(|link| substitute_language_macro(link, language)),
            current_vendor_list_iab_format: self.current_vendor_list_iab_format.clone(),
            consented_vendor_list_version: self.consented_vendor_list_version.clone(),
            consented_privacy_policy_version: self.consented_privacy_policy_version.clone(),
            consented_vendor_list_iab_format: self.consented_vendor_list_iab_format.clone(),
        }
    }
}

/// Vendor list and privacy policy information exposed to hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentData {
    pub current_vendor_list_version: Option<String>,
    pub current_vendor_list_link: Option<String>,
    pub current_privacy_policy_version: Option<String>,
    pub current_privacy_policy_link: Option<String>,
    pub current_vendor_list_iab_format: Option<String>,
    pub consented_vendor_list_version: Option<String>,
    pub consented_privacy_policy_version: Option<String>,
    pub consented_vendor_list_iab_format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let snapshot = ConsentSnapshot::default();
        assert_eq!(snapshot.consent_status, ConsentStatus::Unknown);
        assert!(snapshot.ad_unit_id.is_empty());
        assert_eq!(snapshot.gdpr_applies, None);
        assert_eq!(snapshot.effective_gdpr_applies(), None);
    }

    #[test]
    fn test_force_overrides_stored_region() {
        let mut snapshot = ConsentSnapshot {
            gdpr_applies: Some(false),
            ..Default::default()
        };
        assert_eq!(snapshot.effective_gdpr_applies(), Some(false));
        snapshot.force_gdpr_applies = true;
        assert_eq!(snapshot.effective_gdpr_applies(), Some(true));
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let snapshot: ConsentSnapshot =
            serde_json::from_str(r#"{"consent_status": "explicit_no", "gdpr_applies": true}"#)
                .unwrap();
        assert_eq!(snapshot.consent_status, ConsentStatus::ExplicitNo);
        assert_eq!(snapshot.gdpr_applies, Some(true));
        assert!(!snapshot.force_gdpr_applies);
        assert_eq!(snapshot.consent_change_reason, ConsentChangeReason::None);
    }

    #[test]
    fn test_consent_data_localizes_links() {
        let snapshot = ConsentSnapshot {
            current_vendor_list_link: Some("https://vendors.example/%%LANGUAGE%%/list".into()),
            current_privacy_policy_link: Some("https://policy.example/?lang=%%LANGUAGE%%".into()),
            ..Default::default()
        };
        let data = snapshot.consent_data("de");
        assert_eq!(
            data.current_vendor_list_link.as_deref(),
            Some("https://vendors.example/de/list")
        );
        assert_eq!(
            data.current_privacy_policy_link.as_deref(),
            Some("https://policy.example/?lang=de")
        );
    }
}
