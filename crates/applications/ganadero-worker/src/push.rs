//! Push notifications and notification clicks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_TITLE: &str = "ERP Ganadero";
const DEFAULT_BODY: &str = "Nueva notificación";
const DEFAULT_URL: &str = "/";

/// Optional fields a push message may carry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    /// Notification title
    pub title: Option<String>,
    /// Notification text
    pub body: Option<String>,
    /// Page to open on click
    pub url: Option<String>,
}

impl PushPayload {
    /// Parse raw push data. Missing or malformed data yields an empty payload.
    pub fn parse(data: Option<&[u8]>) -> Self {
        let Some(data) = data.filter(|d| !d.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_slice(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Malformed push payload; showing default notification");
                Self::default()
            }
        }
    }
}

/// A notification as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Title line
    pub title: String,
    /// Body text
    pub body: String,
    /// Large icon
    pub icon: String,
    /// Monochrome badge
    pub badge: String,
    /// Vibration pattern in milliseconds
    pub vibrate: Vec<u32>,
    /// Page opened on click
    pub url: String,
}

impl From<PushPayload> for Notification {
    fn from(payload: PushPayload) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: payload.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
            icon: "/icon-192.png".to_string(),
            badge: "/icon-72.png".to_string(),
            vibrate: vec![200, 100, 200],
            url: payload.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        }
    }
}

/// The platform surface notifications and windows are shown on
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Display `notification`
    async fn show(&self, notification: &Notification);

    /// Dismiss `notification`
    async fn close(&self, notification: &Notification);

    /// Focus an open window showing `url`; `false` if there is none
    async fn focus_window(&self, url: &str) -> bool;

    /// Open a new window at `url`
    async fn open_window(&self, url: &str);
}

/// Sink for headless runs: every call becomes a log line
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn show(&self, notification: &Notification) {
        info!(title = %notification.title, body = %notification.body, url = %notification.url, "Notification");
    }

    async fn close(&self, notification: &Notification) {
        debug!(title = %notification.title, "Notification closed");
    }

    async fn focus_window(&self, _url: &str) -> bool {
        false
    }

    async fn open_window(&self, url: &str) {
        info!(url, "Open window");
    }
}

/// What a click ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// An existing window was focused
    Focused,
    /// A new window was opened
    Opened,
}

/// Turns push messages into notifications and clicks into navigation
pub struct PushHandler {
    sink: Arc<dyn NotificationSink>,
}

impl PushHandler {
    /// Handler showing notifications on `sink`
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Show the notification for raw push `data`
    pub async fn on_push(&self, data: Option<&[u8]>) -> Notification {
        let notification = Notification::from(PushPayload::parse(data));
        self.sink.show(&notification).await;
        notification
    }

    /// Close `notification` and bring its page forward
    pub async fn on_click(&self, notification: &Notification) -> ClickOutcome {
        self.sink.close(notification).await;
        if self.sink.focus_window(&notification.url).await {
            ClickOutcome::Focused
        } else {
            self.sink.open_window(&notification.url).await;
            ClickOutcome::Opened
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingSink;

    #[tokio::test]
    async fn test_empty_payload_uses_defaults() {
        let sink = Arc::new(RecordingSink::new());
        let handler = PushHandler::new(sink.clone());

        let shown = handler.on_push(Some(b"{}")).await;

        assert_eq!(shown.title, "ERP Ganadero");
        assert_eq!(shown.body, "Nueva notificación");
        assert_eq!(shown.url, "/");
        assert_eq!(shown.icon, "/icon-192.png");
        assert_eq!(shown.badge, "/icon-72.png");
        assert_eq!(shown.vibrate, vec![200, 100, 200]);
        assert_eq!(sink.shown(), vec![shown]);
    }

    #[test]
    fn test_missing_or_malformed_data_is_default() {
        assert_eq!(PushPayload::parse(None), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(b"not json")), PushPayload::default());
        assert_eq!(PushPayload::parse(Some(b"[1,2]")), PushPayload::default());
    }

    #[test]
    fn test_payload_fields_override_defaults() {
        let payload = PushPayload::parse(Some(r#"{"title":"Vacunación","url":"/animales/12"}"#.as_bytes()));
        let notification = Notification::from(payload);
        assert_eq!(notification.title, "Vacunación");
        assert_eq!(notification.body, "Nueva notificación");
        assert_eq!(notification.url, "/animales/12");
    }

    #[tokio::test]
    async fn test_click_focuses_existing_window() {
        let sink = Arc::new(RecordingSink::new().with_window("/animales/12"));
        let handler = PushHandler::new(sink.clone());
        let notification = handler.on_push(Some(br#"{"url":"/animales/12"}"#)).await;

        assert_eq!(handler.on_click(&notification).await, ClickOutcome::Focused);
        assert_eq!(sink.closed().len(), 1);
        assert!(sink.opened().is_empty());
    }

    #[tokio::test]
    async fn test_click_opens_window_when_none_matches() {
        let sink = Arc::new(RecordingSink::new());
        let handler = PushHandler::new(sink.clone());
        let notification = handler.on_push(None).await;

        assert_eq!(handler.on_click(&notification).await, ClickOutcome::Opened);
        assert_eq!(sink.opened(), vec!["/".to_string()]);
    }
}
