//! Request builders for the sync and consent-dialog handshakes.
//!
//! Requests carry everything as query parameters. Two values are only known
//! to the transport at send time, so the sync request carries template
//! tokens that `resolve_templates` fills in.

use url::Url;

use crate::config::EngineConfig;
use crate::error::NetworkError;
use crate::identity::AdvertisingIdentity;
use crate::storage::ConsentSnapshot;

/// Token replaced with "1"/"0" for the do-not-track flag.
pub const DNT_TEMPLATE: &str = "tmpl_do_not_track";

/// Token replaced with the surrogate device id.
pub const SURROGATE_ID_TEMPLATE: &str = "tmpl_surrogate_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Sync,
    ConsentDialog,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Sync => "sync",
            RequestKind::ConsentDialog => "dialog",
        }
    }
}

/// A request ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub kind: RequestKind,
    pub url: String,
}

impl HttpRequest {
    /// Value of a query parameter, for inspection and tests.
    pub fn param(&self, name: &str) -> Option<String> {
        let url = Url::parse(&self.url).ok()?;
        let value = url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned());
        value
    }
}

/// Ordered query parameters; empty values are dropped.
#[derive(Debug, Default)]
struct Params(Vec<(&'static str, String)>);

impl Params {
    fn add(&mut self, name: &'static str, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.0.push((name, value));
        }
    }

    fn add_opt(&mut self, name: &'static str, value: Option<&str>) {
        if let Some(v) = value {
            self.add(name, v);
        }
    }

    fn into_url(self, config: &EngineConfig, path: &str) -> Result<String, NetworkError> {
        let base = format!("https://{}{}", config.host, path);
        Url::parse_with_params(&base, self.0.iter().map(|(k, v)| (*k, v.as_str())))
            .map(|url| url.to_string())
            .map_err(|e| NetworkError::Unspecified(format!("invalid request url {}: {}", base, e)))
    }
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Builds the status-sync request from the full snapshot.
pub struct SyncRequestBuilder<'a> {
    config: &'a EngineConfig,
    snapshot: &'a ConsentSnapshot,
    forced_gdpr_applies_changed: bool,
}

impl<'a> SyncRequestBuilder<'a> {
    pub fn new(config: &'a EngineConfig, snapshot: &'a ConsentSnapshot) -> Self {
        Self {
            config,
            snapshot,
            forced_gdpr_applies_changed: false,
        }
    }

    pub fn forced_gdpr_applies_changed(mut self, changed: bool) -> Self {
        self.forced_gdpr_applies_changed = changed;
        self
    }

    pub fn build(&self) -> Result<HttpRequest, NetworkError> {
        let s = self.snapshot;
        let mut params = Params::default();

        params.add("id", s.ad_unit_id.as_str());
        params.add("nv", self.config.sdk_version.as_str());
        params.add("e_name", self.config.app_engine_name.as_str());
        params.add("e_ver", self.config.app_engine_version.as_str());
        params.add("w_ver", self.config.wrapper_version.as_str());
        if let Some(ms) = s.last_changed_ms {
            params.add("last_changed_ms", ms.to_string());
        }
        params.add_opt(
            "last_consent_status",
            s.last_successfully_synced_consent_status.map(|c| c.as_wire()),
        );
        params.add("current_consent_status", s.consent_status.as_wire());
        params.add("consent_change_reason", s.consent_change_reason.description());
        params.add_opt(
            "consented_vendor_list_version",
            s.consented_vendor_list_version.as_deref(),
        );
        params.add_opt(
            "consented_privacy_policy_version",
            s.consented_privacy_policy_version.as_deref(),
        );
        params.add_opt(
            "cached_vendor_list_iab_hash",
            s.current_vendor_list_iab_hash.as_deref(),
        );
        params.add_opt("extras", s.extras.as_deref());
        params.add_opt("udid", s.ifa.as_deref());
        params.add_opt("gdpr_applies", s.gdpr_applies.map(bool_param));
        params.add("force_gdpr_applies", bool_param(s.force_gdpr_applies));
        if self.forced_gdpr_applies_changed {
            params.add("forced_gdpr_applies_changed", "1");
        }
        params.add("bundle", self.config.bundle_id.as_str());
        params.add("dnt", DNT_TEMPLATE);
        params.add("mid", SURROGATE_ID_TEMPLATE);

        Ok(HttpRequest {
            kind: RequestKind::Sync,
            url: params.into_url(self.config, &self.config.sync_path)?,
        })
    }
}

/// Builds the consent-dialog load request.
pub struct DialogRequestBuilder<'a> {
    config: &'a EngineConfig,
    snapshot: &'a ConsentSnapshot,
}

impl<'a> DialogRequestBuilder<'a> {
    pub fn new(config: &'a EngineConfig, snapshot: &'a ConsentSnapshot) -> Self {
        Self { config, snapshot }
    }

    pub fn build(&self) -> Result<HttpRequest, NetworkError> {
        let s = self.snapshot;
        let mut params = Params::default();

        params.add("id", s.ad_unit_id.as_str());
        params.add("current_consent_status", s.consent_status.as_wire());
        params.add("nv", self.config.sdk_version.as_str());
        params.add("language", self.config.language.as_str());
        params.add_opt("gdpr_applies", s.gdpr_applies.map(bool_param));
        params.add("force_gdpr_applies", bool_param(s.force_gdpr_applies));
        params.add_opt(
            "consented_vendor_list_version",
            s.consented_vendor_list_version.as_deref(),
        );
        params.add_opt(
            "consented_privacy_policy_version",
            s.consented_privacy_policy_version.as_deref(),
        );
        params.add("bundle", self.config.bundle_id.as_str());

        Ok(HttpRequest {
            kind: RequestKind::ConsentDialog,
            url: params.into_url(self.config, &self.config.dialog_path)?,
        })
    }
}

/// Fill the send-time template tokens of a request url.
pub fn resolve_templates(url: &str, identity: &AdvertisingIdentity) -> String {
    url.replace(DNT_TEMPLATE, bool_param(identity.do_not_track))
        .replace(SURROGATE_ID_TEMPLATE, &identity.surrogate_id)
}
