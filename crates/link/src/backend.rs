use runtime::BoxFuture;
use thiserror::Error;

use crate::config::LinkRequest;

/// Why a connect or disconnect failed; always non-fatal and user-retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("malformed address: {0}")]
    MalformedAddress(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("device busy: {0}")]
    DeviceBusy(String),
    #[error("rejected by backend: {0}")]
    Rejected(String),
    #[error("a connect or disconnect is already in progress")]
    Busy,
    #[error("already connected; disconnect first")]
    AlreadyConnected,
}

/// Backend acknowledgement of a successful connect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkAck {
    pub message: String,
    /// Connection strings the backend opened, one per configured link.
    pub connections: Vec<String>,
}

/// Transport that opens and closes vehicle links on the backend.
///
/// Implementations must be `Send + Sync` for use across async tasks.
pub trait LinkBackend: Send + Sync {
    fn connect<'a>(&'a self, request: &'a LinkRequest) -> BoxFuture<'a, Result<LinkAck, LinkError>>;

    fn disconnect(&self) -> BoxFuture<'_, Result<(), LinkError>>;
}
