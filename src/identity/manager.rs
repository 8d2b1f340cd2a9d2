//! Advertising identity ownership and coalesced refresh.
//!
//! `current()` never blocks: it hands back the cached identity and wakes the
//! refresh worker unless a refresh is already pending or running. A single
//! long-lived worker thread serves every refresh. A refresh that produces a
//! different identity (or the first refresh after construction) is reported
//! to the single change listener with `(old, new)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::identity::advertising::AdvertisingIdentity;
use crate::identity::source::IdentitySource;
use crate::storage::backend::KeyValueStore;

/// Key under which the identity is persisted.
pub const IDENTITY_KEY: &str = "advertising_identity";

/// Called with `(old, new)` after a refresh.
pub type IdentityChangeListener =
    Arc<dyn Fn(&AdvertisingIdentity, &AdvertisingIdentity) + Send + Sync>;

pub struct IdentityManager {
    inner: Arc<Inner>,
}

/// Refresh bookkeeping shared with the worker.
#[derive(Default)]
struct WorkerState {
    /// A refresh is waiting for the worker
    requested: bool,
    /// A refresh is running, on the worker or inline
    in_flight: bool,
    started: bool,
    shutdown: bool,
}

impl WorkerState {
    fn busy(&self) -> bool {
        self.requested || self.in_flight
    }
}

struct Inner {
    current: RwLock<AdvertisingIdentity>,
    worker: Mutex<WorkerState>,
    wake: Condvar,
    idle: Condvar,
    refreshed_once: AtomicBool,
    listener: Mutex<Option<IdentityChangeListener>>,
    source: Arc<dyn IdentitySource>,
    backend: Arc<dyn KeyValueStore>,
    verbose: bool,
}

impl IdentityManager {
    /// Load the persisted identity, or create and persist a fresh one.
    pub fn new(source: Arc<dyn IdentitySource>, backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_verbose_logging(source, backend, false)
    }

    pub fn with_verbose_logging(
        source: Arc<dyn IdentitySource>,
        backend: Arc<dyn KeyValueStore>,
        verbose: bool,
    ) -> Self {
        let initial = match load_identity(backend.as_ref()) {
            Some(identity) => identity,
            None => {
                let identity = AdvertisingIdentity::generate();
                persist_identity(backend.as_ref(), &identity);
                log::info!("IDENTITY_CREATED surrogate_id={}", identity.surrogate_id);
                identity
            }
        };

        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(initial),
                worker: Mutex::new(WorkerState::default()),
                wake: Condvar::new(),
                idle: Condvar::new(),
                refreshed_once: AtomicBool::new(false),
                listener: Mutex::new(None),
                source,
                backend,
                verbose,
            }),
        }
    }

    /// Cached identity; triggers a background refresh.
    pub fn current(&self) -> AdvertisingIdentity {
        let identity = self.cached();
        self.refresh();
        identity
    }

    /// Cached identity without side effects.
    pub fn cached(&self) -> AdvertisingIdentity {
        self.inner.current.read().clone()
    }

    /// Register the change listener, replacing any previous one.
    pub fn on_change(&self, listener: IdentityChangeListener) {
        *self.inner.listener.lock() = Some(listener);
    }

    /// Ask the worker for a refresh, starting it on first use.
    ///
    /// Returns false when a refresh is already pending or running (the
    /// request is coalesced into it) or the worker could not be started.
    pub fn refresh(&self) -> bool {
        let mut worker = self.inner.worker.lock();
        if worker.busy() {
            log::debug!("IDENTITY_REFRESH_COALESCED");
            return false;
        }

        if !worker.started {
            let inner = Arc::clone(&self.inner);
            let spawned = thread::Builder::new()
                .name("identity-refresh".to_string())
                .spawn(move || inner.worker_loop());
            if let Err(e) = spawned {
                log::warn!("IDENTITY_REFRESH_SPAWN_FAILED error={}", e);
                return false;
            }
            worker.started = true;
        }

        worker.requested = true;
        self.inner.wake.notify_one();
        true
    }

    /// Refresh on the calling thread, waiting out any refresh pending or
    /// running.
    pub fn refresh_blocking(&self) {
        {
            let mut worker = self.inner.worker.lock();
            while worker.busy() {
                self.inner.idle.wait(&mut worker);
            }
            worker.in_flight = true;
        }
        self.inner.run_refresh();
        self.inner.finish();
    }
}

impl Drop for IdentityManager {
    fn drop(&mut self) {
        self.inner.worker.lock().shutdown = true;
        self.inner.wake.notify_all();
    }
}

impl Inner {
    fn worker_loop(&self) {
        loop {
            {
                let mut worker = self.worker.lock();
                while !worker.requested && !worker.shutdown {
                    self.wake.wait(&mut worker);
                }
                if worker.shutdown {
                    return;
                }
                worker.requested = false;
                worker.in_flight = true;
            }
            self.run_refresh();
            self.finish();
        }
    }

    fn run_refresh(&self) {
        let platform = match self.source.fetch() {
            Ok(Some(platform)) => platform,
            Ok(None) => {
                log::debug!("IDENTITY_REFRESH_EMPTY source={}", self.source.name());
                return;
            }
            Err(e) => {
                log::warn!(
                    "IDENTITY_REFRESH_FAILED source={} error={:#}",
                    self.source.name(),
                    e
                );
                return;
            }
        };

        let (old, new) = {
            let mut current = self.current.write();
            let old = current.clone();
            let new = old.refreshed_with(platform);
            *current = new.clone();
            (old, new)
        };
        persist_identity(self.backend.as_ref(), &new);

        let first = !self.refreshed_once.swap(true, Ordering::SeqCst);
        let changed = old != new;

        if self.verbose {
            log::info!(
                "IDENTITY_REFRESHED platform_id={} dnt={} changed={} first={}",
                new.platform_id,
                new.do_not_track,
                changed,
                first
            );
        } else {
            log::debug!(
                "IDENTITY_REFRESHED dnt={} changed={} first={}",
                new.do_not_track,
                changed,
                first
            );
        }

        if !(changed || first) {
            return;
        }

        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(&old, &new);
        }
    }

    fn finish(&self) {
        self.worker.lock().in_flight = false;
        self.idle.notify_all();
    }
}

fn load_identity(backend: &dyn KeyValueStore) -> Option<AdvertisingIdentity> {
    match backend.get(IDENTITY_KEY) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                log::warn!("IDENTITY_DECODE_FAILED error={}", e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log::warn!("IDENTITY_LOAD_FAILED error={}", e);
            None
        }
    }
}

fn persist_identity(backend: &dyn KeyValueStore, identity: &AdvertisingIdentity) {
    let result = serde_json::to_string(identity)
        .map_err(Into::into)
        .and_then(|raw| backend.put(IDENTITY_KEY, &raw));
    if let Err(e) = result {
        log::warn!("IDENTITY_PERSIST_FAILED error={}", e);
    }
}
