//! Consent snapshot repository.

use std::sync::Arc;

use crate::error::StoreError;
use crate::storage::backend::KeyValueStore;
use crate::storage::models::ConsentSnapshot;

/// Key under which the whole snapshot is stored.
pub const SNAPSHOT_KEY: &str = "consent_snapshot";

/// Reads and writes the consent snapshot as one document.
#[derive(Clone)]
pub struct ConsentStateStore {
    backend: Arc<dyn KeyValueStore>,
}

impl ConsentStateStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load the stored snapshot.
    ///
    /// Anything unreadable counts as "nothing stored" and yields defaults.
    pub fn load(&self) -> ConsentSnapshot {
        let raw = match self.backend.get(SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::info!("SNAPSHOT_LOAD found=false");
                return ConsentSnapshot::default();
            }
            Err(e) => {
                log::warn!("SNAPSHOT_LOAD_FAILED error={}", e);
                return ConsentSnapshot::default();
            }
        };

        match serde_json::from_str::<ConsentSnapshot>(&raw) {
            Ok(snapshot) => {
                log::info!(
                    "SNAPSHOT_LOAD found=true status={} gdpr_applies={:?}",
                    snapshot.consent_status,
                    snapshot.gdpr_applies
                );
                snapshot
            }
            Err(e) => {
                log::warn!("SNAPSHOT_DECODE_FAILED error={}", e);
                ConsentSnapshot::default()
            }
        }
    }

    /// Durably write the full snapshot.
    pub fn save(&self, snapshot: &ConsentSnapshot) -> Result<(), StoreError> {
        let raw = serde_json::to_string(snapshot)?;
        self.backend.put(SNAPSHOT_KEY, &raw)?;
        log::debug!(
            "SNAPSHOT_SAVED status={} bytes={}",
            snapshot.consent_status,
            raw.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::ConsentStatus;
    use crate::storage::backend::MemoryKeyValueStore;

    #[test]
    fn test_fresh_store_yields_defaults() {
        let store = ConsentStateStore::new(Arc::new(MemoryKeyValueStore::new()));
        assert_eq!(store.load(), ConsentSnapshot::default());
    }

    #[test]
    fn test_save_then_load() {
        let store = ConsentStateStore::new(Arc::new(MemoryKeyValueStore::new()));
        let snapshot = ConsentSnapshot {
            ad_unit_id: "unit".into(),
            consent_status: ConsentStatus::ExplicitYes,
            ifa: Some("ifa-1".into()),
            gdpr_applies: Some(true),
            ..Default::default()
        };
        store.save(&snapshot).unwrap();
        assert_eq!(store.load(), snapshot);
    }

    #[test]
    fn test_type_mismatch_falls_back_to_defaults() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        backend
            .put(SNAPSHOT_KEY, r#"{"consent_status": 42, "force_gdpr_applies": "yes"}"#)
            .unwrap();
        let store = ConsentStateStore::new(backend);
        assert_eq!(store.load(), ConsentSnapshot::default());
    }

    #[test]
    fn test_garbage_falls_back_to_defaults() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        backend.put(SNAPSHOT_KEY, "not json").unwrap();
        let store = ConsentStateStore::new(backend);
        assert_eq!(store.load().consent_status, ConsentStatus::Unknown);
    }
}
