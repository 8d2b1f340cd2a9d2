//! Sync gating.

/// Lower bound for a server-provided sync delay.
pub const MIN_SYNC_DELAY_MS: u64 = 1_000;

/// Everything `should_sync` looks at.
#[derive(Debug, Clone, Copy)]
pub struct SyncInputs<'a> {
    pub in_flight: bool,
    /// Region applicability with the force flag folded in
    pub gdpr_applies: Option<bool>,
    pub force: bool,
    pub last_sync_time_ms: Option<i64>,
    pub sync_delay_ms: u64,
    /// Consented platform id cached in the snapshot
    pub ifa: Option<&'a str>,
    pub do_not_track: bool,
    pub now_ms: i64,
}

/// Decide whether a status sync should be sent now.
///
/// # Decision order
/// 1. A sync in flight -> no
/// 2. Region unknown -> yes, we need to learn it
/// 3. Region does not apply -> no
/// 4. Forced -> yes
/// 5. Do-not-track with no cached ifa -> no, nothing new to report
/// 6. Never synced -> yes
/// 7. Otherwise only once the delay has elapsed
pub fn should_sync(inputs: &SyncInputs<'_>) -> bool {
    if inputs.in_flight {
        return false;
    }
    match inputs.gdpr_applies {
        None => return true,
        Some(false) => return false,
        Some(true) => {}
    }
    if inputs.force {
        return true;
    }
    if inputs.do_not_track && inputs.ifa.map_or(true, str::is_empty) {
        return false;
    }
    match inputs.last_sync_time_ms {
        None => true,
        Some(last) => {
            let elapsed = inputs.now_ms.saturating_sub(last);
            elapsed > 0 && elapsed as u64 > inputs.sync_delay_ms
        }
    }
}

/// Sync delay requested by the server through `call_again_after_secs`.
///
/// Returns `None` (keep the current delay) for non-positive or unparsable
/// values.
pub fn sync_delay_override(call_again_after_secs: Option<&str>) -> Option<u64> {
    let raw = call_again_after_secs?.trim();
    let secs = match raw.parse::<i64>() {
        Ok(secs) => secs as f64,
        Err(_) => raw.parse::<f64>().ok().filter(|s| s.is_finite())?,
    };
    if secs <= 0.0 {
        return None;
    }
    let ms = (secs * 1000.0).min(u64::MAX as f64) as u64;
    Some(ms.max(MIN_SYNC_DELAY_MS))
}
