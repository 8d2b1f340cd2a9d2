//! Platform identity sources.

use parking_lot::Mutex;

use crate::identity::advertising::PlatformIdentity;

/// A platform-specific provider of the advertising identifier.
///
/// `Ok(None)` means the source has nothing to offer right now. Errors are
/// logged by the caller and treated the same way.
pub trait IdentitySource: Send + Sync {
    fn name(&self) -> &str;
    fn fetch(&self) -> anyhow::Result<Option<PlatformIdentity>>;
}

/// Tries each source in order and returns the first that yields an identity.
pub struct FallbackIdentitySource {
    sources: Vec<Box<dyn IdentitySource>>,
}

impl FallbackIdentitySource {
    pub fn new(sources: Vec<Box<dyn IdentitySource>>) -> Self {
        Self { sources }
    }
}

impl IdentitySource for FallbackIdentitySource {
    fn name(&self) -> &str {
        "fallback"
    }

    fn fetch(&self) -> anyhow::Result<Option<PlatformIdentity>> {
        for source in &self.sources {
            match source.fetch() {
                Ok(Some(identity)) => {
                    log::debug!("IDENTITY_SOURCE_HIT source={}", source.name());
                    return Ok(Some(identity));
                }
                Ok(None) => {
                    log::debug!("IDENTITY_SOURCE_EMPTY source={}", source.name());
                }
                Err(e) => {
                    log::warn!("IDENTITY_SOURCE_FAILED source={} error={:#}", source.name(), e);
                }
            }
        }
        Ok(None)
    }
}

/// Source fed by the host, for platforms that push identifier updates.
#[derive(Debug, Default)]
pub struct ManualIdentitySource {
    value: Mutex<Option<PlatformIdentity>>,
}

impl ManualIdentitySource {
    pub fn new(initial: Option<PlatformIdentity>) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }

    pub fn set(&self, identity: Option<PlatformIdentity>) {
        *self.value.lock() = identity;
    }
}

impl IdentitySource for ManualIdentitySource {
    fn name(&self) -> &str {
        "manual"
    }

    fn fetch(&self) -> anyhow::Result<Option<PlatformIdentity>> {
        Ok(self.value.lock().clone())
    }
}
