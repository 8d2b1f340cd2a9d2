//! Side effects run when personal data collection is allowed.

/// Best-effort host callbacks. Both default to doing nothing.
pub trait PersonalDataHooks: Send + Sync {
    /// Refresh derived geo/locale metadata.
    fn refresh_location(&self) {}

    /// Report the one-time "app opened" conversion.
    fn track_app_open(&self) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PersonalDataHooks for NoopHooks {}
