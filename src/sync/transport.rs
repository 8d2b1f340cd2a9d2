//! Transport boundary.

use crate::error::NetworkError;
use crate::sync::request::HttpRequest;

/// Completion callback: the response body or a coded failure.
pub type Completion = Box<dyn FnOnce(Result<String, NetworkError>) + Send + 'static>;

/// Host-provided HTTP transport.
///
/// `send` must not block on the network. The completion may run on any
/// thread, including synchronously inside `send`.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest, completion: Completion);
}
