//! Structured logging utilities.
//!
//! Every line reads `<ctx> EVENT_NAME key=value ...` so a whole sync
//! exchange can be grepped by its request id.

use std::fmt;

use uuid::Uuid;

/// Logging context for the engine.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub ad_unit_id: String,
    pub request_id: Option<String>,
}

impl LogContext {
    pub fn new(ad_unit_id: &str) -> Self {
        Self {
            ad_unit_id: ad_unit_id.to_string(),
            request_id: None,
        }
    }

    pub fn with_request(&self, request_id: &str) -> Self {
        Self {
            ad_unit_id: self.ad_unit_id.clone(),
            request_id: Some(request_id.to_string()),
        }
    }

    /// Context for a fresh network exchange with a short random request id.
    pub fn for_new_request(&self, kind: &str) -> Self {
        let id = format!("{}-{}", kind, &Uuid::new_v4().to_string()[..8]);
        self.with_request(&id)
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ad_unit = if self.ad_unit_id.is_empty() {
            "-"
        } else {
            self.ad_unit_id.as_str()
        };
        match &self.request_id {
            Some(rid) => write!(f, "[ad_unit={}] [req={}]", ad_unit, rid),
            None => write!(f, "[ad_unit={}]", ad_unit),
        }
    }
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::info!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),+), $($value),+)
        );
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::warn!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),+), $($value),+)
        );
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::error!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),+), $($value),+)
        );
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr, $($key:ident = $value:expr),+ $(,)?) => {
        log::debug!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),+), $($value),+)
        );
    };
}
