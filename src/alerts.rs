//! Lifecycle notifications derived from hook events

use std::sync::Arc;

use parking_lot::RwLock;

use crate::hooks::{HookEnvelope, HookEventKind};
use crate::session::short_id;

/// A user-facing notice about something a session did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub session_id: String,
    pub event: String,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn from_envelope(envelope: &HookEnvelope) -> Self {
        let event = event_name(&envelope.event).to_string();
        let cwd = if envelope.cwd.is_empty() {
            "unknown directory"
        } else {
            envelope.cwd.as_str()
        };
        Self {
            session_id: envelope.session_id.clone(),
            title: format!("Copilot: {event}"),
            body: format!("Session {} in {}", short_id(&envelope.session_id), cwd),
            event,
        }
    }
}

fn event_name(kind: &HookEventKind) -> &'static str {
    match kind {
        HookEventKind::SessionStart => "sessionStart",
        HookEventKind::SessionEnd => "sessionEnd",
        HookEventKind::UserPromptSubmitted => "userPromptSubmitted",
        HookEventKind::PreToolUse => "preToolUse",
        HookEventKind::PostToolUse => "postToolUse",
        HookEventKind::ErrorOccurred => "errorOccurred",
        HookEventKind::Other => "other",
    }
}

/// A delivery backend for notifications
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, notification: &Notification) {
        tracing::info!(
            session_id = %notification.session_id,
            event = %notification.event,
            title = %notification.title,
            "{}",
            notification.body
        );
    }
}

/// Fans a notification out to every registered backend
#[derive(Default)]
pub struct NotificationRouter {
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, notifier: Arc<dyn Notifier>) {
        tracing::debug!(notifier = notifier.name(), "Registered notifier");
        self.notifiers.write().push(notifier);
    }

    pub fn len(&self) -> usize {
        self.notifiers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, notification: &Notification) {
        let notifiers = self.notifiers.read().clone();
        for notifier in notifiers {
            notifier.notify(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Notification>>,
    }

    impl Notifier for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn notify(&self, notification: &Notification) {
            self.seen.lock().push(notification.clone());
        }
    }

    fn envelope(event: &str, cwd: &str) -> HookEnvelope {
        HookEnvelope::parse(&format!(
            r#"{{"event":"{event}","sessionId":"0123456789abcdef","cwd":"{cwd}"}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_notification_text() {
        let n = Notification::from_envelope(&envelope("sessionEnd", "/work/app"));
        assert_eq!(n.title, "Copilot: sessionEnd");
        assert_eq!(n.body, "Session 01234567 in /work/app");
        assert_eq!(n.event, "sessionEnd");
    }

    #[test]
    fn test_missing_cwd() {
        let n = Notification::from_envelope(&envelope("preToolUse", ""));
        assert_eq!(n.body, "Session 01234567 in unknown directory");
    }

    #[test]
    fn test_router_fans_out() {
        let router = NotificationRouter::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        router.add(a.clone());
        router.add(b.clone());
        router.add(Arc::new(LogNotifier));

        router.notify(&Notification::from_envelope(&envelope("sessionStart", "/w")));

        assert_eq!(router.len(), 3);
        assert_eq!(a.seen.lock().len(), 1);
        assert_eq!(b.seen.lock().len(), 1);
    }
}
