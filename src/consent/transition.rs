//! Consent state transition procedure.
//!
//! Pure snapshot mutation; persistence, side effects and notification are
//! sequenced by the orchestrator around it.

use crate::consent::reason::ConsentChangeReason;
use crate::consent::status::ConsentStatus;
use crate::storage::ConsentSnapshot;
use crate::sync::SyncResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub old_status: ConsentStatus,
    pub new_status: ConsentStatus,
}

/// Move `snapshot` to `target`.
///
/// Returns `None` without touching the snapshot when the status is already
/// `target` and no reacquire is pending.
pub fn apply_transition(
    snapshot: &mut ConsentSnapshot,
    target: ConsentStatus,
    reason: ConsentChangeReason,
    platform_id: &str,
    now_ms: i64,
) -> Option<TransitionOutcome> {
    let old_status = snapshot.consent_status;
    if old_status == target && !snapshot.should_reacquire_consent {
        return None;
    }

    snapshot.last_changed_ms = Some(now_ms);
    snapshot.consent_change_reason = reason;
    snapshot.consent_status = target;

    if target.records_consented_versions(old_status) {
        snapshot.record_consented_versions();
    } else if target.clears_consented_versions() {
        snapshot.clear_consented_versions();
    }

    if target == ConsentStatus::ExplicitYes {
        snapshot.ifa = Some(platform_id.to_string()).filter(|id| !id.is_empty());
    } else {
        snapshot.ifa = None;
    }

    if target == ConsentStatus::DoNotTrack && old_status != ConsentStatus::DoNotTrack {
        snapshot.consent_status_before_dnt = Some(old_status);
    }

    snapshot.should_reacquire_consent = false;

    Some(TransitionOutcome {
        old_status,
        new_status: target,
    })
}

/// Status to restore when do-not-track is switched off.
pub fn status_after_dnt(snapshot: &ConsentSnapshot) -> ConsentStatus {
    match snapshot.consent_status_before_dnt {
        Some(ConsentStatus::ExplicitNo) => ConsentStatus::ExplicitNo,
        _ => ConsentStatus::Unknown,
    }
}

/// Fold the server-authoritative fields of a sync response into `snapshot`.
///
/// Consent overrides are not applied here.
pub fn apply_sync_response(
    snapshot: &mut ConsentSnapshot,
    response: &SyncResponse,
    synced_status: ConsentStatus,
) {
    if snapshot.gdpr_applies.is_none() {
        snapshot.gdpr_applies = Some(response.is_gdpr_region);
    }

    snapshot.is_whitelisted = response.is_whitelisted;
    snapshot.current_vendor_list_version = Some(response.current_vendor_list_version.clone());
    snapshot.current_vendor_list_link = Some(response.current_vendor_list_link.clone());
    snapshot.current_privacy_policy_version =
        Some(response.current_privacy_policy_version.clone());
    snapshot.current_privacy_policy_link = Some(response.current_privacy_policy_link.clone());

    let hash_changed = snapshot.current_vendor_list_iab_hash.as_deref()
        != Some(response.current_vendor_list_iab_hash.as_str());
    if hash_changed {
        if let Some(format) = &response.current_vendor_list_iab_format {
            snapshot.current_vendor_list_iab_format = Some(format.clone());
        }
    }
    snapshot.current_vendor_list_iab_hash = Some(response.current_vendor_list_iab_hash.clone());

    if let Some(extras) = &response.extras {
        snapshot.extras = Some(extras.clone());
    }

    snapshot.last_successfully_synced_consent_status = Some(synced_status);

    if synced_status != ConsentStatus::ExplicitYes {
        snapshot.ifa = None;
    }
}

/// Whether personal data may be collected.
pub fn can_collect(snapshot: &ConsentSnapshot, do_not_track: bool) -> bool {
    match snapshot.effective_gdpr_applies() {
        None => false,
        Some(false) => true,
        Some(true) => snapshot.consent_status == ConsentStatus::ExplicitYes && !do_not_track,
    }
}

/// Whether the host should prompt the user.
pub fn should_show_dialog(snapshot: &ConsentSnapshot) -> bool {
    match snapshot.effective_gdpr_applies() {
        None | Some(false) => false,
        Some(true) => {
            snapshot.should_reacquire_consent
                || snapshot.consent_status == ConsentStatus::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ServerOverrides;
    use crate::consent::status::ConsentStatus::*;

    const ALL: [ConsentStatus; 5] = [Unknown, ExplicitYes, ExplicitNo, PotentialWhitelist, DoNotTrack];

    fn with_server_versions(status: ConsentStatus) -> ConsentSnapshot {
        ConsentSnapshot {
            consent_status: status,
            current_vendor_list_version: Some("vl-2".into()),
            current_privacy_policy_version: Some("pp-5".into()),
            current_vendor_list_iab_format: Some("iab".into()),
            consented_vendor_list_version: Some("vl-1".into()),
            consented_privacy_policy_version: Some("pp-1".into()),
            consented_vendor_list_iab_format: Some("old".into()),
            ..Default::default()
        }
    }

    fn response() -> SyncResponse {
        SyncResponse {
            is_gdpr_region: true,
            is_whitelisted: false,
            overrides: ServerOverrides::default(),
            current_vendor_list_version: "vl-9".into(),
            current_vendor_list_link: "https://v".into(),
            current_privacy_policy_version: "pp-9".into(),
            current_privacy_policy_link: "https://p".into(),
            current_vendor_list_iab_format: Some("fmt-9".into()),
            current_vendor_list_iab_hash: "hash-9".into(),
            call_again_after_secs: None,
            extras: None,
            consent_change_reason: None,
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut snapshot = with_server_versions(ExplicitNo);
        let before = snapshot.clone();
        assert_eq!(
            apply_transition(&mut snapshot, ExplicitNo, ConsentChangeReason::DeniedByUser, "", 1),
            None
        );
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_same_status_with_reacquire_proceeds() {
        let mut snapshot = with_server_versions(ExplicitNo);
        snapshot.should_reacquire_consent = true;
        let outcome =
            apply_transition(&mut snapshot, ExplicitNo, ConsentChangeReason::DeniedByUser, "", 7);
        assert!(outcome.is_some());
        assert!(!snapshot.should_reacquire_consent);
        assert_eq!(snapshot.last_changed_ms, Some(7));
    }

    #[test]
    fn test_consented_versions_recorded_or_cleared() {
        for from in ALL {
            for target in ALL {
                if from == target {
                    continue;
                }
                let mut snapshot = with_server_versions(from);
                apply_transition(&mut snapshot, target, ConsentChangeReason::None, "ifa", 1)
                    .unwrap();

                let recorded = matches!(target, ExplicitNo | PotentialWhitelist)
                    || (target == ExplicitYes && from != PotentialWhitelist);
                if recorded {
                    assert_eq!(snapshot.consented_vendor_list_version.as_deref(), Some("vl-2"));
                    assert_eq!(snapshot.consented_privacy_policy_version.as_deref(), Some("pp-5"));
                    assert_eq!(snapshot.consented_vendor_list_iab_format.as_deref(), Some("iab"));
                } else if matches!(target, Unknown | DoNotTrack) {
                    assert_eq!(snapshot.consented_vendor_list_version, None);
                    assert_eq!(snapshot.consented_privacy_policy_version, None);
                    assert_eq!(snapshot.consented_vendor_list_iab_format, None);
                } else {
                    // PotentialWhitelist -> ExplicitYes keeps the soft-grant versions
                    assert_eq!(snapshot.consented_vendor_list_version.as_deref(), Some("vl-1"));
                }
            }
        }
    }

    #[test]
    fn test_ifa_only_under_explicit_yes() {
        let mut snapshot = ConsentSnapshot::default();
        apply_transition(&mut snapshot, ExplicitYes, ConsentChangeReason::GrantedByUser, "ifa-1", 1);
        assert_eq!(snapshot.ifa.as_deref(), Some("ifa-1"));

        apply_transition(&mut snapshot, ExplicitNo, ConsentChangeReason::DeniedByUser, "ifa-1", 2);
        assert_eq!(snapshot.ifa, None);

        apply_transition(&mut snapshot, ExplicitYes, ConsentChangeReason::GrantedByUser, "", 3);
        assert_eq!(snapshot.ifa, None);
    }

    #[test]
    fn test_dnt_records_prior_status() {
        let mut snapshot = ConsentSnapshot {
            consent_status: ExplicitYes,
            ..Default::default()
        };
        apply_transition(&mut snapshot, DoNotTrack, ConsentChangeReason::DeniedByDntOn, "", 1);
        assert_eq!(snapshot.consent_status_before_dnt, Some(ExplicitYes));
        assert_eq!(status_after_dnt(&snapshot), Unknown);

        snapshot.consent_status_before_dnt = Some(ExplicitNo);
        assert_eq!(status_after_dnt(&snapshot), ExplicitNo);
    }

    #[test]
    fn test_dnt_reentry_keeps_prior_status() {
        let mut snapshot = ConsentSnapshot {
            consent_status: DoNotTrack,
            consent_status_before_dnt: Some(ExplicitNo),
            should_reacquire_consent: true,
            ..Default::default()
        };
        apply_transition(&mut snapshot, DoNotTrack, ConsentChangeReason::DeniedByDntOn, "", 1);
        assert_eq!(snapshot.consent_status_before_dnt, Some(ExplicitNo));
    }

    #[test]
    fn test_sync_response_learns_region_once() {
        let mut snapshot = ConsentSnapshot::default();
        let mut resp = response();
        resp.is_gdpr_region = false;
        apply_sync_response(&mut snapshot, &resp, Unknown);
        assert_eq!(snapshot.gdpr_applies, Some(false));

        resp.is_gdpr_region = true;
        apply_sync_response(&mut snapshot, &resp, Unknown);
        assert_eq!(snapshot.gdpr_applies, Some(false));
    }

    #[test]
    fn test_iab_format_follows_hash() {
        let mut snapshot = ConsentSnapshot {
            current_vendor_list_iab_hash: Some("hash-9".into()),
            current_vendor_list_iab_format: Some("fmt-old".into()),
            ..Default::default()
        };
        apply_sync_response(&mut snapshot, &response(), Unknown);
        assert_eq!(snapshot.current_vendor_list_iab_format.as_deref(), Some("fmt-old"));

        let mut resp = response();
        resp.current_vendor_list_iab_hash = "hash-10".into();
        apply_sync_response(&mut snapshot, &resp, Unknown);
        assert_eq!(snapshot.current_vendor_list_iab_format.as_deref(), Some("fmt-9"));
        assert_eq!(snapshot.current_vendor_list_iab_hash.as_deref(), Some("hash-10"));
    }

    #[test]
    fn test_sync_clears_ifa_unless_explicit_yes() {
        let mut snapshot = ConsentSnapshot {
            consent_status: ExplicitYes,
            ifa: Some("ifa".into()),
            ..Default::default()
        };
        apply_sync_response(&mut snapshot, &response(), ExplicitYes);
        assert_eq!(snapshot.ifa.as_deref(), Some("ifa"));
        assert_eq!(snapshot.last_successfully_synced_consent_status, Some(ExplicitYes));

        apply_sync_response(&mut snapshot, &response(), Unknown);
        assert_eq!(snapshot.ifa, None);
    }

    #[test]
    fn test_extras_kept_when_absent() {
        let mut snapshot = ConsentSnapshot {
            extras: Some("keep".into()),
            ..Default::default()
        };
        apply_sync_response(&mut snapshot, &response(), Unknown);
        assert_eq!(snapshot.extras.as_deref(), Some("keep"));

        let mut resp = response();
        resp.extras = Some("new".into());
        apply_sync_response(&mut snapshot, &resp, Unknown);
        assert_eq!(snapshot.extras.as_deref(), Some("new"));
    }

    #[test]
    fn test_can_collect() {
        let mut snapshot = ConsentSnapshot::default();
        assert!(!can_collect(&snapshot, false));

        snapshot.gdpr_applies = Some(false);
        assert!(can_collect(&snapshot, true));

        snapshot.gdpr_applies = Some(true);
        assert!(!can_collect(&snapshot, false));
        snapshot.consent_status = ExplicitYes;
        assert!(can_collect(&snapshot, false));
        assert!(!can_collect(&snapshot, true));

        snapshot.consent_status = PotentialWhitelist;
        assert!(!can_collect(&snapshot, false));
    }

    #[test]
    fn test_should_show_dialog() {
        let mut snapshot = ConsentSnapshot::default();
        assert!(!should_show_dialog(&snapshot));

        snapshot.gdpr_applies = Some(false);
        snapshot.should_reacquire_consent = true;
        assert!(!should_show_dialog(&snapshot));

        snapshot.gdpr_applies = Some(true);
        assert!(should_show_dialog(&snapshot));

        snapshot.should_reacquire_consent = false;
        snapshot.consent_status = ExplicitNo;
        assert!(!should_show_dialog(&snapshot));

        snapshot.consent_status = Unknown;
        assert!(should_show_dialog(&snapshot));
    }
}
