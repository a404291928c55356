use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use runtime::{NotificationBus, Topic};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::backend::{LinkAck, LinkBackend, LinkError};
use crate::config::{LinkEntry, LinkRequest};

/// Connection lifecycle.
///
/// `Disconnected -> Connecting -> {Connected | Disconnected}`;
/// `Connected -> Disconnected` only through an explicit disconnect.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        })
    }
}

/// Point-in-time view of the link, for reconciliation on mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: LinkState,
    /// Reason for the most recent failed connect or disconnect.
    pub last_error: Option<String>,
    pub links: Vec<LinkEntry>,
    pub connections: Vec<String>,
    pub fleet: bool,
}

/// Work bound to a connected link (pollers); stopped on disconnect.
pub trait LinkBound: Send + Sync {
    fn stop(&self);
    fn is_stopped(&self) -> bool;
}

struct Inner {
    state: LinkState,
    disconnecting: bool,
    last_error: Option<String>,
    request: Option<LinkRequest>,
    ack: Option<LinkAck>,
    bound: Vec<Arc<dyn LinkBound>>,
}

/// Owns link configuration and lifecycle; the only place connect and
/// disconnect are issued.
///
/// No automatic reconnection: retrying a failed connect is the caller's job.
pub struct LinkManager {
    backend: Arc<dyn LinkBackend>,
    bus: NotificationBus,
    state_tx: watch::Sender<LinkState>,
    inner: Mutex<Inner>,
}

impl LinkManager {
    pub fn new(backend: Arc<dyn LinkBackend>, bus: NotificationBus) -> Self {
        let (state_tx, _rx) = watch::channel(LinkState::Disconnected);
        Self {
            backend,
            bus,
            state_tx,
            inner: Mutex::new(Inner {
                state: LinkState::Disconnected,
                disconnecting: false,
                last_error: None,
                request: None,
                ack: None,
                bound: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> LinkState {
        self.inner.lock().state
    }

    /// Receiver observing every state transition.
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    pub fn status(&self) -> LinkStatus {
        let inner = self.inner.lock();
        LinkStatus {
            state: inner.state,
            last_error: inner.last_error.clone(),
            links: inner
                .request
                .as_ref()
                .map(LinkRequest::entries)
                .unwrap_or_default(),
            connections: inner
                .ack
                .as_ref()
                .map(|a| a.connections.clone())
                .unwrap_or_default(),
            fleet: inner.request.as_ref().is_some_and(LinkRequest::is_fleet),
        }
    }

    /// Opens the configured link(s).
    ///
    /// On success the state becomes `Connected` and `link-connected` is
    /// published. On failure the state returns to `Disconnected` and the
    /// reason is kept in [`LinkStatus::last_error`].
    pub async fn connect(&self, request: impl Into<LinkRequest>) -> Result<LinkAck, LinkError> {
        let request = request.into();
        {
            let mut inner = self.inner.lock();
            if inner.disconnecting {
                return Err(LinkError::Busy);
            }
            match inner.state {
                LinkState::Connecting => return Err(LinkError::Busy),
                LinkState::Connected => return Err(LinkError::AlreadyConnected),
                LinkState::Disconnected => {}
            }
            if let Err(err) = request.validate() {
                warn!("link config rejected: {err}");
                inner.last_error = Some(err.to_string());
                return Err(err);
            }
            inner.state = LinkState::Connecting;
            inner.last_error = None;
        }
        self.state_tx.send_replace(LinkState::Connecting);
        info!(links = request.configs().len(), fleet = request.is_fleet(), "connecting");

        // Reverts to Disconnected if this future is dropped mid-connect.
        let mut guard = ConnectingGuard {
            manager: self,
            armed: true,
        };
        let result = self.backend.connect(&request).await;
        guard.armed = false;

        match result {
            Ok(ack) => {
                let fleet = request.is_fleet();
                let count = request.configs().len();
                {
                    let mut inner = self.inner.lock();
                    inner.state = LinkState::Connected;
                    inner.request = Some(request);
                    inner.ack = Some(ack.clone());
                }
                self.state_tx.send_replace(LinkState::Connected);
                info!(connections = ?ack.connections, "link connected");
                self.bus.publish(
                    Topic::LinkConnected,
                    json!({ "fleet": fleet, "count": count }),
                );
                Ok(ack)
            }
            Err(err) => {
                {
                    let mut inner = self.inner.lock();
                    inner.state = LinkState::Disconnected;
                    inner.last_error = Some(err.to_string());
                }
                self.state_tx.send_replace(LinkState::Disconnected);
                warn!("link connect failed: {err}");
                Err(err)
            }
        }
    }

    /// Closes the link. A no-op when already disconnected.
    ///
    /// Every bound poller is stopped before the state changes and before
    /// `link-disconnected` is published. A backend failure is recorded and
    /// returned, but the local state still ends up `Disconnected`. If this
    /// future is dropped while the backend call is pending, the local
    /// teardown is finished and `link-disconnected` is still published.
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        let bound = {
            let mut inner = self.inner.lock();
            match inner.state {
                LinkState::Disconnected => return Ok(()),
                LinkState::Connecting => return Err(LinkError::Busy),
                LinkState::Connected => {}
            }
            if inner.disconnecting {
                return Err(LinkError::Busy);
            }
            inner.disconnecting = true;
            std::mem::take(&mut inner.bound)
        };
        for poller in &bound {
            poller.stop();
        }
        {
            let mut inner = self.inner.lock();
            inner.state = LinkState::Disconnected;
            inner.request = None;
            inner.ack = None;
        }
        self.state_tx.send_replace(LinkState::Disconnected);

        let mut guard = DisconnectingGuard {
            manager: self,
            armed: true,
        };
        let result = self.backend.disconnect().await;
        guard.armed = false;

        self.finish_disconnect(result.as_ref().err().map(ToString::to_string));
        match &result {
            Ok(()) => info!(stopped = bound.len(), "link disconnected"),
            Err(err) => warn!("backend disconnect failed, link dropped locally: {err}"),
        }
        self.bus.publish(Topic::LinkDisconnected, json!(null));
        result
    }

    fn finish_disconnect(&self, error: Option<String>) {
        let mut inner = self.inner.lock();
        inner.disconnecting = false;
        if error.is_some() {
            inner.last_error = error;
        }
    }

    /// Binds `work` to the current connection.
    ///
    /// Returns `false` (and stops `work` at once) when not connected. Work
    /// that has already stopped is released here rather than held until the
    /// next disconnect.
    pub fn attach(&self, work: Arc<dyn LinkBound>) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != LinkState::Connected || inner.disconnecting {
            drop(inner);
            work.stop();
            return false;
        }
        inner.bound.retain(|w| !w.is_stopped());
        inner.bound.push(work);
        true
    }

    pub fn bound_count(&self) -> usize {
        self.inner.lock().bound.len()
    }
}

struct ConnectingGuard<'a> {
    manager: &'a LinkManager,
    armed: bool,
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut inner = self.manager.inner.lock();
            inner.state = LinkState::Disconnected;
            inner.last_error = Some("connect cancelled".to_string());
        }
        self.manager.state_tx.send_replace(LinkState::Disconnected);
    }
}

struct DisconnectingGuard<'a> {
    manager: &'a LinkManager,
    armed: bool,
}

impl Drop for DisconnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.manager
            .finish_disconnect(Some("disconnect cancelled".to_string()));
        warn!("disconnect cancelled before the backend answered, link dropped locally");
        self.manager.bus.publish(Topic::LinkDisconnected, json!(null));
    }
}
