//! Consent status values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The user's consent status for personal data processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    #[default]
    Unknown,
    ExplicitYes,
    ExplicitNo,
    /// Soft grant by a non-whitelisted publisher: no prompt, no collection.
    PotentialWhitelist,
    #[serde(rename = "dnt")]
    DoNotTrack,
}

impl ConsentStatus {
    /// Wire value sent to and received from the server.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ConsentStatus::Unknown => "unknown",
            ConsentStatus::ExplicitYes => "explicit_yes",
            ConsentStatus::ExplicitNo => "explicit_no",
            ConsentStatus::PotentialWhitelist => "potential_whitelist",
            ConsentStatus::DoNotTrack => "dnt",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "unknown" => Some(ConsentStatus::Unknown),
            "explicit_yes" => Some(ConsentStatus::ExplicitYes),
            "explicit_no" => Some(ConsentStatus::ExplicitNo),
            "potential_whitelist" => Some(ConsentStatus::PotentialWhitelist),
            "dnt" => Some(ConsentStatus::DoNotTrack),
            _ => None,
        }
    }

    /// Entering this status records the consented vendor list and policy versions.
    pub(crate) fn records_consented_versions(&self, from: ConsentStatus) -> bool {
        match self {
            ConsentStatus::ExplicitNo | ConsentStatus::PotentialWhitelist => true,
            ConsentStatus::ExplicitYes => from != ConsentStatus::PotentialWhitelist,
            _ => false,
        }
    }

    /// Entering this status wipes the consented versions.
    pub(crate) fn clears_consented_versions(&self) -> bool {
        matches!(self, ConsentStatus::DoNotTrack | ConsentStatus::Unknown)
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConsentStatus; 5] = [
        ConsentStatus::Unknown,
        ConsentStatus::ExplicitYes,
        ConsentStatus::ExplicitNo,
        ConsentStatus::PotentialWhitelist,
        ConsentStatus::DoNotTrack,
    ];

    #[test]
    fn test_wire_values() {
        for status in ALL {
            assert_eq!(ConsentStatus::from_wire(status.as_wire()), Some(status));
        }
        assert_eq!(ConsentStatus::from_wire("DNT"), None);
        assert_eq!(ConsentStatus::from_wire("DoNotTrack"), None);
    }

    #[test]
    fn test_serde_uses_wire_value() {
        assert_eq!(
            serde_json::to_string(&ConsentStatus::DoNotTrack).unwrap(),
            r#""dnt""#
        );
        let parsed: ConsentStatus = serde_json::from_str(r#""potential_whitelist""#).unwrap();
        assert_eq!(parsed, ConsentStatus::PotentialWhitelist);
    }

    #[test]
    fn test_consented_version_rules() {
        use crate::consent::status::ConsentStatus::*;
        assert!(ExplicitYes.records_consented_versions(Unknown));
        assert!(!ExplicitYes.records_consented_versions(PotentialWhitelist));
        assert!(ExplicitNo.records_consented_versions(ExplicitYes));
        assert!(PotentialWhitelist.records_consented_versions(Unknown));
        assert!(!Unknown.records_consented_versions(ExplicitYes));
        assert!(Unknown.clears_consented_versions());
        assert!(DoNotTrack.clears_consented_versions());
        assert!(!ExplicitNo.clears_consented_versions());
    }
}
