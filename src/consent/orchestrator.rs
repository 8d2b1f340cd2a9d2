//! Consent orchestrator.
//!
//! Coordinates the consent state machine:
//! 1. Status transitions (grant, revoke, dialog, identity changes)
//! 2. Server overrides from sync responses and ad-response headers
//! 3. Sync scheduling and completion
//! 4. Change fan-out to subscribers
//!
//! All mutation happens under one mutex. Each mutation commits the full
//! snapshot before anything else happens; transport calls, host hooks and
//! event publication run only after the mutex is released.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::config::EngineConfig;
use crate::consent::events::{ConsentChangeEvent, EventPublisher};
use crate::consent::hooks::PersonalDataHooks;
use crate::consent::reason::ConsentChangeReason;
use crate::consent::status::ConsentStatus;
use crate::consent::transition::{
    apply_sync_response, apply_transition, can_collect, should_show_dialog, status_after_dnt,
};
use crate::dialog::{DialogAction, DialogController, DialogLoadListener, DialogPresenter};
use crate::error::{DialogError, NetworkError};
use crate::identity::{AdvertisingIdentity, IdentityManager};
use crate::{log_debug, log_error, log_info, log_warn};
use crate::logging::structured::LogContext;
use crate::storage::{ConsentData, ConsentSnapshot, ConsentStateStore, KeyValueStore};
use crate::sync::{
    should_sync, sync_delay_override, DialogRequestBuilder, ServerOverride, ServerOverrides,
    SyncInputs, SyncRequestBuilder, SyncResponse, Transport,
};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mutable engine state guarded by the orchestrator mutex.
struct EngineState {
    snapshot: ConsentSnapshot,
    sync_in_flight: bool,
    last_sync_request_ms: Option<i64>,
    sync_delay_ms: u64,
    force_gdpr_applies_changed: bool,
    app_open_tracked: bool,
}

/// Work deferred until the mutex is released.
#[derive(Default)]
struct Effects {
    events: Vec<ConsentChangeEvent>,
    refresh_location: bool,
    track_app_open: bool,
    /// `Some(force)` requests a sync; a forced request wins.
    sync: Option<bool>,
}

impl Effects {
    fn request_sync(&mut self, force: bool) {
        self.sync = Some(self.sync.unwrap_or(false) || force);
    }
}

pub struct ConsentOrchestrator {
    config: EngineConfig,
    ctx: LogContext,
    store: ConsentStateStore,
    identity: Arc<IdentityManager>,
    transport: Arc<dyn Transport>,
    hooks: Arc<dyn PersonalDataHooks>,
    dialog: DialogController,
    events: EventPublisher,
    state: Mutex<EngineState>,
    committed: RwLock<ConsentSnapshot>,
    me: Weak<ConsentOrchestrator>,
}

impl ConsentOrchestrator {
    /// Build the orchestrator.
    ///
    /// Persistence and the identity manager must exist first. The
    /// orchestrator registers itself as the identity change listener and
    /// starts an identity refresh.
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn KeyValueStore>,
        identity: Arc<IdentityManager>,
        transport: Arc<dyn Transport>,
        hooks: Arc<dyn PersonalDataHooks>,
    ) -> Arc<Self> {
        let store = ConsentStateStore::new(backend);
        let mut snapshot = store.load();

        if !config.ad_unit_id.is_empty() {
            snapshot.ad_unit_id = config.ad_unit_id.clone();
            snapshot.cached_last_ad_unit_id_used_for_init = config.ad_unit_id.clone();
        } else if snapshot.ad_unit_id.is_empty() {
            snapshot.ad_unit_id = snapshot.cached_last_ad_unit_id_used_for_init.clone();
        }

        let ctx = LogContext::new(&snapshot.ad_unit_id);
        if let Err(e) = store.save(&snapshot) {
            log::error!("{} SNAPSHOT_SAVE_FAILED stage=init error={}", ctx, e);
        }

        log::info!(
            "{} CONSENT_ENGINE_INIT status={} gdpr_applies={:?} force_gdpr_applies={}",
            ctx,
            snapshot.consent_status,
            snapshot.gdpr_applies,
            snapshot.force_gdpr_applies
        );

        let orchestrator = Arc::new_cyclic(|me| Self {
            dialog: DialogController::new(Arc::clone(&transport)),
            events: EventPublisher::new(config.event_channel_capacity),
            state: Mutex::new(EngineState {
                snapshot: snapshot.clone(),
                sync_in_flight: false,
                last_sync_request_ms: None,
                sync_delay_ms: config.sync_delay_ms,
                force_gdpr_applies_changed: false,
                app_open_tracked: false,
            }),
            committed: RwLock::new(snapshot),
            config,
            ctx,
            store,
            identity,
            transport,
            hooks,
            me: me.clone(),
        });

        let weak = Arc::downgrade(&orchestrator);
        orchestrator
            .identity
            .on_change(Arc::new(move |old: &AdvertisingIdentity, new: &AdvertisingIdentity| {
                if let Some(orchestrator) = weak.upgrade() {
                    orchestrator.on_identity_changed(old, new);
                }
            }));
        orchestrator.reconcile_do_not_track();
        orchestrator.identity.refresh();

        orchestrator
    }

    /// Apply a do-not-track state no listener saw, e.g. one picked up by a
    /// refresh that ran before this orchestrator was built.
    fn reconcile_do_not_track(&self) {
        let identity = self.identity.cached();
        if !identity.do_not_track {
            return;
        }

        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            if state.snapshot.consent_status == ConsentStatus::DoNotTrack {
                return;
            }
            log_info!(
                self.ctx,
                "IDENTITY_RECONCILED",
                dnt = true,
                status = state.snapshot.consent_status
            );
            if self.transition_locked(
                &mut state,
                ConsentStatus::DoNotTrack,
                ConsentChangeReason::DeniedByDntOn,
                &mut effects,
            ) {
                effects.request_sync(true);
            }
        }
        self.dispatch(effects);
    }

    // ----------------------------------------------------------------------
    // Queries
    // ----------------------------------------------------------------------

    pub fn personal_info_consent_status(&self) -> ConsentStatus {
        self.committed.read().consent_status
    }

    /// Region applicability; once forced it is always `Some(true)`.
    pub fn gdpr_applies(&self) -> Option<bool> {
        self.committed.read().effective_gdpr_applies()
    }

    pub fn should_show_consent_dialog(&self) -> bool {
        should_show_dialog(&self.committed.read())
    }

    pub fn can_collect_personal_information(&self) -> bool {
        let identity = self.identity.current();
        can_collect(&self.committed.read(), identity.do_not_track)
    }

    /// Last committed snapshot.
    pub fn snapshot(&self) -> ConsentSnapshot {
        self.committed.read().clone()
    }

    /// Vendor list and privacy policy details with links localized to the
    /// configured language.
    pub fn consent_data(&self) -> ConsentData {
        self.committed.read().consent_data(&self.config.language)
    }

    /// Same as `consent_data` with links localized to `language`.
    pub fn consent_data_for_language(&self, language: &str) -> ConsentData {
        self.committed.read().consent_data(language)
    }

    /// Receive `(old, new, can_collect)` change events on a bounded queue.
    pub fn subscribe(&self) -> Receiver<ConsentChangeEvent> {
        let rx = self.events.subscribe();
        log_debug!(
            self.ctx,
            "CONSENT_SUBSCRIBED",
            subscribers = self.events.subscriber_count()
        );
        rx
    }

    // ----------------------------------------------------------------------
    // Consent changes
    // ----------------------------------------------------------------------

    /// Publisher-driven grant. Whitelisted publishers grant outright,
    /// others only soft-grant.
    pub fn grant_consent(&self) {
        if self.identity.current().do_not_track {
            log::warn!("{} CONSENT_GRANT_BLOCKED reason=do_not_track", self.ctx);
            return;
        }

        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            let (target, reason) = if state.snapshot.is_whitelisted {
                (
                    ConsentStatus::ExplicitYes,
                    ConsentChangeReason::GrantedByWhitelistedPub,
                )
            } else {
                (
                    ConsentStatus::PotentialWhitelist,
                    ConsentChangeReason::GrantedByNotWhitelistedPub,
                )
            };
            self.transition_locked(&mut state, target, reason, &mut effects);
            effects.request_sync(true);
        }
        self.dispatch(effects);
    }

    /// Publisher-driven revoke.
    pub fn revoke_consent(&self) {
        if self.identity.current().do_not_track {
            log::warn!("{} CONSENT_REVOKE_BLOCKED reason=do_not_track", self.ctx);
            return;
        }

        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            self.transition_locked(
                &mut state,
                ConsentStatus::ExplicitNo,
                ConsentChangeReason::DeniedByPub,
                &mut effects,
            );
            effects.request_sync(true);
        }
        self.dispatch(effects);
    }

    /// User decision from the consent dialog. Only `ExplicitYes` and
    /// `ExplicitNo` are accepted.
    pub fn change_consent_state_from_dialog(&self, status: ConsentStatus) {
        let reason = match status {
            ConsentStatus::ExplicitYes => ConsentChangeReason::GrantedByUser,
            ConsentStatus::ExplicitNo => ConsentChangeReason::DeniedByUser,
            other => {
                log::error!(
                    "{} DIALOG_STATUS_REJECTED status={} reason=invalid_status",
                    self.ctx,
                    other
                );
                return;
            }
        };

        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            self.transition_locked(&mut state, status, reason, &mut effects);
            effects.request_sync(true);
        }
        self.dispatch(effects);
    }

    /// Treat the user as in-region from now on. Irreversible.
    pub fn force_gdpr_applies(&self) {
        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            self.force_gdpr_applies_locked(&mut state, &mut effects);
        }
        self.dispatch(effects);
    }

    /// React to an advertising identity refresh.
    pub fn on_identity_changed(&self, old: &AdvertisingIdentity, new: &AdvertisingIdentity) {
        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();

            if !old.do_not_track && new.do_not_track {
                log::info!("{} IDENTITY_CHANGED dnt=on", self.ctx);
                self.transition_locked(
                    &mut state,
                    ConsentStatus::DoNotTrack,
                    ConsentChangeReason::DeniedByDntOn,
                    &mut effects,
                );
                effects.request_sync(true);
            } else if old.do_not_track && !new.do_not_track {
                let target = status_after_dnt(&state.snapshot);
                log::info!("{} IDENTITY_CHANGED dnt=off restore={}", self.ctx, target);
                if self.transition_locked(
                    &mut state,
                    target,
                    ConsentChangeReason::DntOff,
                    &mut effects,
                ) {
                    effects.request_sync(false);
                }
            } else if !new.do_not_track
                && old.platform_id != new.platform_id
                && state.snapshot.consent_status == ConsentStatus::ExplicitYes
            {
                log::info!("{} IDENTITY_CHANGED ifa_changed=true", self.ctx);
                let changed = self.transition_with(
                    &mut state,
                    ConsentStatus::Unknown,
                    ConsentChangeReason::IfaChanged,
                    &mut effects,
                    |snapshot| snapshot.last_successfully_synced_consent_status = None,
                );
                if changed {
                    state.last_sync_request_ms = None;
                    effects.request_sync(false);
                }
            } else {
                log::debug!(
                    "{} IDENTITY_CHANGED action=none dnt={}",
                    self.ctx,
                    new.do_not_track
                );
            }
        }
        self.dispatch(effects);
    }

    /// Apply overrides that arrived outside a sync, e.g. on ad responses.
    pub fn apply_server_overrides(&self, overrides: &ServerOverrides) {
        if overrides.is_empty() {
            return;
        }

        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            if overrides.force_gdpr_applies {
                self.force_gdpr_applies_locked(&mut state, &mut effects);
            }
            if self.apply_override_locked(&mut state, &overrides.action, &mut effects) {
                effects.request_sync(true);
            }
        }
        self.dispatch(effects);
    }

    // ----------------------------------------------------------------------
    // Sync
    // ----------------------------------------------------------------------

    /// Send a status sync if `should_sync` allows it.
    pub fn request_sync(&self, force: bool) {
        let identity = self.identity.current();
        let now = now_ms();

        let (request, synced_status, ctx) = {
            let mut state = self.state.lock();
            let inputs = SyncInputs {
                in_flight: state.sync_in_flight,
                gdpr_applies: state.snapshot.effective_gdpr_applies(),
                force,
                last_sync_time_ms: state.last_sync_request_ms,
                sync_delay_ms: state.sync_delay_ms,
                ifa: state.snapshot.ifa.as_deref(),
                do_not_track: identity.do_not_track,
                now_ms: now,
            };
            if !should_sync(&inputs) {
                log_debug!(
                    self.ctx,
                    "SYNC_SKIPPED",
                    force = force,
                    in_flight = state.sync_in_flight,
                    gdpr_applies = inputs.gdpr_applies
                );
                return;
            }

            let request = match SyncRequestBuilder::new(&self.config, &state.snapshot)
                .forced_gdpr_applies_changed(state.force_gdpr_applies_changed)
                .build()
            {
                Ok(request) => request,
                Err(e) => {
                    log::error!("{} SYNC_BUILD_FAILED error={}", self.ctx, e);
                    return;
                }
            };

            state.sync_in_flight = true;
            state.last_sync_request_ms = Some(now);
            let request_ctx = self.ctx.for_new_request(request.kind.as_str());
            (request, state.snapshot.consent_status, request_ctx)
        };

        log::info!(
            "{} SYNC_DISPATCHED status={} force={}",
            ctx,
            synced_status,
            force
        );

        let me = self.me.clone();
        self.transport.send(
            request,
            Box::new(move |result| {
                if let Some(orchestrator) = me.upgrade() {
                    orchestrator.on_sync_complete(synced_status, result, &ctx);
                }
            }),
        );
    }

    fn on_sync_complete(
        &self,
        synced_status: ConsentStatus,
        result: Result<String, NetworkError>,
        ctx: &LogContext,
    ) {
        let response = match result.and_then(|body| SyncResponse::parse(&body)) {
            Ok(response) => response,
            Err(e) => {
                self.state.lock().sync_in_flight = false;
                log_warn!(ctx, "SYNC_FAILED", reason = e.reason_code(), error = e);
                return;
            }
        };

        let mut effects = Effects::default();
        {
            let mut state = self.state.lock();
            state.sync_in_flight = false;

            let dnt = self.identity.cached().do_not_track;
            let could_collect = can_collect(&state.snapshot, dnt);

            let mut working = state.snapshot.clone();
            apply_sync_response(&mut working, &response, synced_status);
            if let Some(delay) = sync_delay_override(response.call_again_after_secs.as_deref()) {
                log::info!("{} SYNC_DELAY_UPDATED delay_ms={}", ctx, delay);
                state.sync_delay_ms = delay;
            }
            state.force_gdpr_applies_changed = false;
            self.commit_locked(&mut state, working);

            let can_collect_now = can_collect(&state.snapshot, dnt);
            if could_collect != can_collect_now {
                let status = state.snapshot.consent_status;
                self.note_collection_locked(&mut state, can_collect_now, &mut effects);
                effects.events.push(event(status, status, can_collect_now));
            }

            log::info!(
                "{} SYNC_COMPLETE synced_status={} gdpr_applies={:?} whitelisted={} override={}",
                ctx,
                synced_status,
                state.snapshot.gdpr_applies,
                state.snapshot.is_whitelisted,
                response.overrides.action.as_str()
            );

            if response.overrides.force_gdpr_applies {
                self.force_gdpr_applies_locked(&mut state, &mut effects);
            }
            self.apply_override_locked(&mut state, &response.overrides.action, &mut effects);

            if state.snapshot.consent_status == ConsentStatus::PotentialWhitelist
                && state.snapshot.is_whitelisted
                && self.transition_locked(
                    &mut state,
                    ConsentStatus::ExplicitYes,
                    ConsentChangeReason::GrantedByWhitelistedPub,
                    &mut effects,
                )
            {
                effects.request_sync(true);
            }
        }
        self.dispatch(effects);
    }

    // ----------------------------------------------------------------------
    // Consent dialog
    // ----------------------------------------------------------------------

    pub fn load_consent_dialog(&self, listener: Arc<dyn DialogLoadListener>) {
        let snapshot = self.snapshot();
        if snapshot.effective_gdpr_applies() == Some(false) {
            log::info!("{} DIALOG_LOAD_SKIPPED reason=gdpr_does_not_apply", self.ctx);
            listener.on_dialog_failed(DialogError::NotNeeded);
            return;
        }

        match DialogRequestBuilder::new(&self.config, &snapshot).build() {
            Ok(request) => self.dialog.load(request, listener, &self.ctx),
            Err(e) => {
                log::error!("{} DIALOG_BUILD_FAILED error={}", self.ctx, e);
                listener.on_dialog_failed(DialogError::Network(e));
            }
        }
    }

    pub fn is_consent_dialog_ready(&self) -> bool {
        self.dialog.is_ready()
    }

    pub fn show_consent_dialog(&self, presenter: &dyn DialogPresenter) -> Result<(), DialogError> {
        self.dialog.show(presenter, &self.ctx)
    }

    /// Feed back what the user did in the presented dialog.
    pub fn handle_dialog_action(&self, action: DialogAction) {
        match action {
            DialogAction::ConsentYes => {
                self.change_consent_state_from_dialog(ConsentStatus::ExplicitYes)
            }
            DialogAction::ConsentNo => {
                self.change_consent_state_from_dialog(ConsentStatus::ExplicitNo)
            }
            DialogAction::Close => log::info!("{} DIALOG_CLOSED", self.ctx),
        }
    }

    // ----------------------------------------------------------------------
    // Internals (caller holds the state mutex)
    // ----------------------------------------------------------------------

    fn transition_locked(
        &self,
        state: &mut EngineState,
        target: ConsentStatus,
        reason: ConsentChangeReason,
        effects: &mut Effects,
    ) -> bool {
        self.transition_with(state, target, reason, effects, |_| {})
    }

    /// Run the transition procedure; `prepare` adjusts the working copy
    /// before the status change so both land in the same commit.
    fn transition_with(
        &self,
        state: &mut EngineState,
        target: ConsentStatus,
        reason: ConsentChangeReason,
        effects: &mut Effects,
        prepare: impl FnOnce(&mut ConsentSnapshot),
    ) -> bool {
        let identity = self.identity.cached();
        let mut working = state.snapshot.clone();

        if working.consent_status == target && !working.should_reacquire_consent {
            log::debug!(
                "{} CONSENT_TRANSITION_SKIPPED status={} reason=unchanged",
                self.ctx,
                target
            );
            return false;
        }

        prepare(&mut working);
        let outcome = match apply_transition(
            &mut working,
            target,
            reason.clone(),
            &identity.platform_id,
            now_ms(),
        ) {
            Some(outcome) => outcome,
            None => return false,
        };

        if !self.commit_locked(state, working) {
            return false;
        }

        let can_collect_now = can_collect(&state.snapshot, identity.do_not_track);
        log_info!(
            self.ctx,
            "CONSENT_TRANSITION",
            old = outcome.old_status,
            new = outcome.new_status,
            reason = reason.description(),
            can_collect = can_collect_now
        );

        self.note_collection_locked(state, can_collect_now, effects);
        effects.events.push(event(
            outcome.old_status,
            outcome.new_status,
            can_collect_now,
        ));
        true
    }

    fn force_gdpr_applies_locked(&self, state: &mut EngineState, effects: &mut Effects) -> bool {
        if state.snapshot.force_gdpr_applies {
            log::debug!("{} FORCE_GDPR_APPLIES_SKIPPED reason=already_forced", self.ctx);
            return false;
        }

        let dnt = self.identity.cached().do_not_track;
        let could_collect = can_collect(&state.snapshot, dnt);

        let mut working = state.snapshot.clone();
        working.force_gdpr_applies = true;
        if !self.commit_locked(state, working) {
            return false;
        }
        state.force_gdpr_applies_changed = true;

        let can_collect_now = can_collect(&state.snapshot, dnt);
        log::info!(
            "{} FORCE_GDPR_APPLIES can_collect={} changed={}",
            self.ctx,
            can_collect_now,
            could_collect != can_collect_now
        );
        if could_collect != can_collect_now {
            let status = state.snapshot.consent_status;
            self.note_collection_locked(state, can_collect_now, effects);
            effects.events.push(event(status, status, can_collect_now));
        }
        effects.request_sync(true);
        true
    }

    /// Returns true if the status changed.
    fn apply_override_locked(
        &self,
        state: &mut EngineState,
        action: &ServerOverride,
        effects: &mut Effects,
    ) -> bool {
        match action {
            ServerOverride::NoOverride => false,
            ServerOverride::ForceNo(reason) => {
                self.transition_locked(state, ConsentStatus::ExplicitNo, reason.clone(), effects)
            }
            ServerOverride::Invalidate(reason) => {
                self.transition_locked(state, ConsentStatus::Unknown, reason.clone(), effects)
            }
            ServerOverride::Reacquire(reason) => {
                if !state.snapshot.should_reacquire_consent {
                    let mut working = state.snapshot.clone();
                    working.should_reacquire_consent = true;
                    if self.commit_locked(state, working) {
                        log::info!(
                            "{} CONSENT_REACQUIRE_REQUIRED reason={:?}",
                            self.ctx,
                            reason.description()
                        );
                    }
                }
                false
            }
        }
    }

    /// Durably write `working`; only then does it become the live state.
    fn commit_locked(&self, state: &mut EngineState, working: ConsentSnapshot) -> bool {
        match self.store.save(&working) {
            Ok(()) => {
                *self.committed.write() = working.clone();
                state.snapshot = working;
                true
            }
            Err(e) => {
                log_error!(self.ctx, "SNAPSHOT_SAVE_FAILED", action = "rollback", error = e);
                false
            }
        }
    }

    fn note_collection_locked(
        &self,
        state: &mut EngineState,
        can_collect: bool,
        effects: &mut Effects,
    ) {
        if !can_collect {
            return;
        }
        effects.refresh_location = true;
        if !state.app_open_tracked {
            state.app_open_tracked = true;
            effects.track_app_open = true;
        }
    }

    /// Run deferred work. Must be called without the state mutex held.
    fn dispatch(&self, effects: Effects) {
        if effects.refresh_location {
            self.hooks.refresh_location();
        }
        if effects.track_app_open {
            self.hooks.track_app_open();
        }
        self.events.publish(&effects.events);
        if let Some(force) = effects.sync {
            self.request_sync(force);
        }
    }
}

fn event(old: ConsentStatus, new: ConsentStatus, can_collect: bool) -> ConsentChangeEvent {
    ConsentChangeEvent {
        old_status: old,
        new_status: new,
        can_collect_personal_information: can_collect,
    }
}
