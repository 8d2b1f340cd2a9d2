//! Consent dialog payload cache.
//!
//! Holds at most one rendered-prompt payload. A payload is single use: once
//! shown it must be loaded again.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::error::{DialogError, NetworkError};
use crate::log_warn;
use crate::logging::structured::LogContext;
use crate::sync::request::HttpRequest;
use crate::sync::response::DialogResponse;
use crate::sync::transport::Transport;

/// Load outcome callbacks. Invoked outside the controller's lock.
pub trait DialogLoadListener: Send + Sync {
    fn on_dialog_loaded(&self);
    fn on_dialog_failed(&self, error: DialogError);
}

/// Renders the opaque dialog HTML. Returns false if it could not be shown.
pub trait DialogPresenter: Send + Sync {
    fn present(&self, html: &str) -> bool;
}

/// What the user did in the presented dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    ConsentYes,
    ConsentNo,
    Close,
}

impl DialogAction {
    /// Map a trigger reported by the presentation layer.
    pub fn from_trigger(trigger: &str) -> Option<Self> {
        match trigger {
            "consentYes" => Some(DialogAction::ConsentYes),
            "consentNo" => Some(DialogAction::ConsentNo),
            "close" => Some(DialogAction::Close),
            _ => None,
        }
    }
}

#[derive(Default)]
struct DialogState {
    html: Option<String>,
    in_flight: bool,
    listener: Option<Arc<dyn DialogLoadListener>>,
}

pub struct DialogController {
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<DialogState>>,
}

impl DialogController {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(DialogState::default())),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().html.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().in_flight
    }

    /// Fetch the dialog unless it is already cached or being fetched.
    ///
    /// While a fetch is in flight the latest listener replaces the previous
    /// one and no new request is made.
    pub fn load(
        &self,
        request: HttpRequest,
        listener: Arc<dyn DialogLoadListener>,
        ctx: &LogContext,
    ) {
        {
            let mut state = self.state.lock();
            if state.html.is_some() {
                drop(state);
                log::debug!("{} DIALOG_LOAD_CACHED", ctx);
                notify_loaded_later(listener, ctx);
                return;
            }
            state.listener = Some(listener);
            if state.in_flight {
                log::info!("{} DIALOG_LOAD_IN_FLIGHT action=skip", ctx);
                return;
            }
            state.in_flight = true;
        }

        let ctx = ctx.for_new_request(request.kind.as_str());
        log::info!("{} DIALOG_LOAD_START", ctx);
        let state = Arc::clone(&self.state);
        self.transport.send(
            request,
            Box::new(move |result| complete_load(&state, &ctx, result)),
        );
    }

    /// Hand the cached payload to the presenter and reset to not-ready.
    pub fn show(&self, presenter: &dyn DialogPresenter, ctx: &LogContext) -> Result<(), DialogError> {
        let html = match self.state.lock().html.clone() {
            Some(html) if !html.is_empty() => html,
            _ => {
                log::warn!("{} DIALOG_SHOW_REJECTED reason=not_ready", ctx);
                return Err(DialogError::NotReady);
            }
        };

        if !presenter.present(&html) {
            log::warn!("{} DIALOG_SHOW_REJECTED reason=presenter_refused", ctx);
            return Err(DialogError::PresentationRefused);
        }

        self.state.lock().html = None;
        log::info!("{} DIALOG_SHOWN bytes={}", ctx, html.len());
        Ok(())
    }
}

/// Report a cached payload off the caller's thread.
fn notify_loaded_later(listener: Arc<dyn DialogLoadListener>, ctx: &LogContext) {
    let deferred = Arc::clone(&listener);
    let spawned = thread::Builder::new()
        .name("dialog-callback".to_string())
        .spawn(move || deferred.on_dialog_loaded());
    if let Err(e) = spawned {
        log_warn!(ctx, "DIALOG_CALLBACK_SPAWN_FAILED", action = "inline", error = e);
        listener.on_dialog_loaded();
    }
}

fn complete_load(
    state: &Mutex<DialogState>,
    ctx: &LogContext,
    result: Result<String, NetworkError>,
) {
    let parsed = result
        .map_err(DialogError::from)
        .and_then(|body| DialogResponse::parse(&body));

    let (listener, outcome) = {
        let mut state = state.lock();
        state.in_flight = false;
        let outcome = match parsed {
            Ok(response) => {
                state.html = Some(response.html);
                Ok(())
            }
            Err(e) => {
                state.html = None;
                Err(e)
            }
        };
        (state.listener.take(), outcome)
    };

    match outcome {
        Ok(()) => {
            log::info!("{} DIALOG_LOAD_COMPLETE", ctx);
            if let Some(listener) = listener {
                listener.on_dialog_loaded();
            }
        }
        Err(e) => {
            log::warn!(
                "{} DIALOG_LOAD_FAILED reason={} error={}",
                ctx,
                e.reason_code(),
                e
            );
            if let Some(listener) = listener {
                listener.on_dialog_failed(e);
            }
        }
    }
}
