use foundation::Timestamp;
use futures_util::StreamExt;
use runtime::{FeedEvent, SharedEventFeed};
use serde_json::Value;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::BackendError;

/// Why an event stream ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The stop signal fired (or its sender was dropped).
    Stopped,
    /// The server closed the socket or the read failed.
    Closed,
}

/// Tails the backend's analysis WebSocket into an [`runtime::EventFeed`].
///
/// One call to [`EventStream::run`] is one connection; reconnecting is the
/// caller's job.
#[derive(Debug, Clone)]
pub struct EventStream {
    url: String,
    feed: SharedEventFeed,
}

impl EventStream {
    pub fn new(url: impl Into<String>, feed: SharedEventFeed) -> Self {
        Self {
            url: url.into(),
            feed,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> Result<StreamEnd, BackendError> {
        if *stop.borrow() {
            return Ok(StreamEnd::Stopped);
        }
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| BackendError::Transport(format!("event stream connect failed: {e}")))?;
        info!(url = %self.url, "event stream connected");
        let (_write, mut read) = ws.split();

        loop {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        return Ok(StreamEnd::Stopped);
                    }
                }
                item = read.next() => {
                    let msg = match item {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => {
                            warn!(error = %e, "event stream read failed");
                            return Ok(StreamEnd::Closed);
                        }
                        None => return Ok(StreamEnd::Closed),
                    };
                    match msg {
                        Message::Text(text) => self.feed.lock().push(parse_frame(&text)),
                        Message::Close(_) => {
                            debug!("event stream closed by server");
                            return Ok(StreamEnd::Closed);
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Turns one text frame into a feed entry.
///
/// JSON frames contribute `timestamp` and the first of `message`, `text`
/// or `result`; anything else is kept verbatim with a local timestamp.
pub fn parse_frame(text: &str) -> FeedEvent {
    let local = || Timestamp::now().0.to_string();
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) else {
        return FeedEvent::new(local(), text);
    };
    let timestamp = match obj.get("timestamp") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => local(),
    };
    let message = ["message", "text", "result"]
        .iter()
        .find_map(|key| match obj.get(*key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(v) if !v.is_null() => Some(v.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| text.to_string());
    FeedEvent::new(timestamp, message)
}

#[cfg(test)]
mod tests {
    use super::parse_frame;

    #[test]
    fn json_frame_fields() {
        let e = parse_frame(r#"{"timestamp":"12:00:01","message":"person detected"}"#);
        assert_eq!(e.timestamp, "12:00:01");
        assert_eq!(e.message, "person detected");

        let e = parse_frame(r#"{"timestamp":17,"result":{"count":2}}"#);
        assert_eq!(e.timestamp, "17");
        assert_eq!(e.message, r#"{"count":2}"#);
    }

    #[test]
    fn non_json_frame_is_kept_raw() {
        let e = parse_frame("analysis started");
        assert_eq!(e.message, "analysis started");
        assert!(!e.timestamp.is_empty());
    }
}
