//! In-process notification sink for tests

use crate::push::{Notification, NotificationSink};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Sink that records every call, with a configurable set of open windows
#[derive(Debug, Default)]
pub struct RecordingSink {
    windows: Mutex<Vec<String>>,
    shown: Mutex<Vec<Notification>>,
    closed: Mutex<Vec<Notification>>,
    opened: Mutex<Vec<String>>,
}

impl RecordingSink {
    /// Sink with no open windows
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a window at `url` is open
    pub fn with_window(self, url: impl Into<String>) -> Self {
        self.windows.lock().push(url.into());
        self
    }

    /// Notifications shown so far
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().clone()
    }

    /// Notifications closed so far
    pub fn closed(&self) -> Vec<Notification> {
        self.closed.lock().clone()
    }

    /// Windows opened so far
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn show(&self, notification: &Notification) {
        self.shown.lock().push(notification.clone());
    }

    async fn close(&self, notification: &Notification) {
        self.closed.lock().push(notification.clone());
    }

    async fn focus_window(&self, url: &str) -> bool {
        self.windows.lock().iter().any(|open| open == url)
    }

    async fn open_window(&self, url: &str) {
        self.windows.lock().push(url.to_string());
        self.opened.lock().push(url.to_string());
    }
}
