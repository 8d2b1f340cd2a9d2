//! Consent change reasons.
//!
//! Reasons are persisted and sent to the server as their description text.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConsentChangeReason {
    #[default]
    None,
    GrantedByUser,
    GrantedByWhitelistedPub,
    GrantedByNotWhitelistedPub,
    DeniedByUser,
    DeniedByPub,
    DeniedByDntOn,
    DntOff,
    IfaChanged,
    RevokedByServer,
    ReacquireByServer,
    PrivacyPolicyChanged,
    /// Free-form reason supplied by the server.
    Server(String),
}

const KNOWN: [ConsentChangeReason; 11] = [
    ConsentChangeReason::GrantedByUser,
    ConsentChangeReason::GrantedByWhitelistedPub,
    ConsentChangeReason::GrantedByNotWhitelistedPub,
    ConsentChangeReason::DeniedByUser,
    ConsentChangeReason::DeniedByPub,
    ConsentChangeReason::DeniedByDntOn,
    ConsentChangeReason::DntOff,
    ConsentChangeReason::IfaChanged,
    ConsentChangeReason::RevokedByServer,
    ConsentChangeReason::ReacquireByServer,
    ConsentChangeReason::PrivacyPolicyChanged,
];

impl ConsentChangeReason {
    pub fn description(&self) -> &str {
        match self {
            ConsentChangeReason::None => "",
            ConsentChangeReason::GrantedByUser => "Consent was explicitly granted by the user",
            ConsentChangeReason::GrantedByWhitelistedPub => {
                "Consent was explicitly granted by a whitelisted publisher"
            }
            ConsentChangeReason::GrantedByNotWhitelistedPub => {
                "Consent was explicitly granted by a publisher who is not whitelisted"
            }
            ConsentChangeReason::DeniedByUser => "Consent was explicitly denied by the user",
            ConsentChangeReason::DeniedByPub => "Consent was explicitly denied by the publisher",
            ConsentChangeReason::DeniedByDntOn => {
                "Limit ad tracking was enabled and consent implicitly denied by the user"
            }
            ConsentChangeReason::DntOff => "Limit ad tracking was disabled",
            ConsentChangeReason::IfaChanged => "Consent needs to be reacquired because the IFA changed",
            ConsentChangeReason::RevokedByServer => "Consent was revoked by the server",
            ConsentChangeReason::ReacquireByServer => "Server requires consent to be reacquired",
            ConsentChangeReason::PrivacyPolicyChanged => {
                "Consent needs to be reacquired because the privacy policy has changed"
            }
            ConsentChangeReason::Server(text) => text,
        }
    }

    /// Server-supplied text, or `fallback` when the server sent none.
    pub fn from_server(text: Option<&str>, fallback: ConsentChangeReason) -> Self {
        match text.map(str::trim) {
            Some(t) if !t.is_empty() => ConsentChangeReason::from(t.to_string()),
            _ => fallback,
        }
    }
}

impl From<String> for ConsentChangeReason {
    fn from(text: String) -> Self {
        if text.is_empty() {
            return ConsentChangeReason::None;
        }
        KNOWN
            .iter()
            .find(|r| r.description() == text)
            .cloned()
            .unwrap_or(ConsentChangeReason::Server(text))
    }
}

impl From<ConsentChangeReason> for String {
    fn from(reason: ConsentChangeReason) -> Self {
        reason.description().to_string()
    }
}

impl fmt::Display for ConsentChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
