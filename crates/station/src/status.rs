use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            StatusLevel::Info => f.write_str(&self.text),
            StatusLevel::Error => write!(f, "error: {}", self.text),
        }
    }
}

/// One-shot status message shared by the panels. A newer message replaces
/// an unread one; [`StatusLine::take`] clears it.
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    current: Arc<Mutex<Option<StatusMessage>>>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, text: impl Into<String>) {
        self.set(StatusLevel::Info, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.set(StatusLevel::Error, text.into());
    }

    fn set(&self, level: StatusLevel, text: String) {
        *self.current.lock() = Some(StatusMessage { level, text });
    }

    pub fn peek(&self) -> Option<StatusMessage> {
        self.current.lock().clone()
    }

    pub fn take(&self) -> Option<StatusMessage> {
        self.current.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::{StatusLevel, StatusLine};

    #[test]
    fn take_clears_and_newest_wins() {
        let status = StatusLine::new();
        status.info("connecting");
        status.error("port busy");
        let shared = status.clone();
        let msg = shared.take().unwrap();
        assert_eq!(msg.level, StatusLevel::Error);
        assert_eq!(msg.to_string(), "error: port busy");
        assert!(status.take().is_none());
    }
}
