//! Server-driven consent overrides.
//!
//! The wire carries three independent booleans with an implicit priority.
//! They are decoded once into a single `ServerOverride` so the rest of the
//! engine never sees more than one.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::consent::ConsentChangeReason;
use crate::sync::fields::{flag, optional_string, value_is_set};

/// At most one consent override per server event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerOverride {
    #[default]
    NoOverride,
    /// Move to `ExplicitNo`
    ForceNo(ConsentChangeReason),
    /// Move to `Unknown`
    Invalidate(ConsentChangeReason),
    /// Keep the status, but require a new prompt
    Reacquire(ConsentChangeReason),
}

impl ServerOverride {
    /// Decode the three wire flags; `force_explicit_no` beats
    /// `invalidate_consent`, which beats `reacquire_consent`.
    pub fn decode(
        force_explicit_no: bool,
        invalidate_consent: bool,
        reacquire_consent: bool,
        reason: Option<&str>,
    ) -> Self {
        if force_explicit_no {
            ServerOverride::ForceNo(ConsentChangeReason::from_server(
                reason,
                ConsentChangeReason::RevokedByServer,
            ))
        } else if invalidate_consent {
            ServerOverride::Invalidate(ConsentChangeReason::from_server(
                reason,
                ConsentChangeReason::ReacquireByServer,
            ))
        } else if reacquire_consent {
            ServerOverride::Reacquire(ConsentChangeReason::from_server(
                reason,
                ConsentChangeReason::ReacquireByServer,
            ))
        } else {
            ServerOverride::NoOverride
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerOverride::NoOverride => "none",
            ServerOverride::ForceNo(_) => "force_explicit_no",
            ServerOverride::Invalidate(_) => "invalidate_consent",
            ServerOverride::Reacquire(_) => "reacquire_consent",
        }
    }
}

/// Header names used when overrides ride on ad responses.
pub const HEADER_FORCE_EXPLICIT_NO: &str = "x-force-explicit-no";
pub const HEADER_INVALIDATE_CONSENT: &str = "x-invalidate-consent";
pub const HEADER_REACQUIRE_CONSENT: &str = "x-reacquire-consent";
pub const HEADER_CONSENT_CHANGE_REASON: &str = "x-consent-change-reason";
pub const HEADER_FORCE_GDPR_APPLIES: &str = "x-force-gdpr-applies";

/// All server signals that can affect consent in one event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerOverrides {
    pub action: ServerOverride,
    pub force_gdpr_applies: bool,
}

impl ServerOverrides {
    pub fn is_empty(&self) -> bool {
        self.action == ServerOverride::NoOverride && !self.force_gdpr_applies
    }

    /// Decode from a sync response body object.
    pub fn from_json(obj: &Map<String, Value>) -> Self {
        let reason = optional_string(obj, "consent_change_reason");
        Self {
            action: ServerOverride::decode(
                flag(obj, "force_explicit_no"),
                flag(obj, "invalidate_consent"),
                flag(obj, "reacquire_consent"),
                reason.as_deref(),
            ),
            force_gdpr_applies: flag(obj, "force_gdpr_applies"),
        }
    }

    /// Decode from ad-response headers (names matched case-insensitively).
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        let lookup = |name: &str| -> Option<&str> {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        };
        let is_set = |name: &str| {
            lookup(name)
                .map(|v| value_is_set(&Value::String(v.to_string())))
                .unwrap_or(false)
        };

        Self {
            action: ServerOverride::decode(
                is_set(HEADER_FORCE_EXPLICIT_NO),
                is_set(HEADER_INVALIDATE_CONSENT),
                is_set(HEADER_REACQUIRE_CONSENT),
                lookup(HEADER_CONSENT_CHANGE_REASON),
            ),
            force_gdpr_applies: is_set(HEADER_FORCE_GDPR_APPLIES),
        }
    }
}
