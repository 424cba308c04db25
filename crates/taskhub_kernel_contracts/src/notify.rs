#![forbid(unsafe_code)]

use crate::push::NotificationPermission;

pub const TOAST_NOT_SUPPORTED: &str = "❌ Notifications not supported on this browser.";
pub const TOAST_BLOCKED: &str = "⚠️ Notifications are blocked. Enable them in browser settings.";
pub const TOAST_PERMISSION_DENIED: &str =
    "⚠️ Permission denied. Enable notifications in browser settings.";
pub const TOAST_ENABLED: &str =
    "🔔 Notifications enabled! You'll be notified about tasks & notes.";
pub const TOAST_ENABLE_FAILED: &str = "❌ Failed to enable notifications.";
pub const TOAST_DISABLED: &str = "🔕 Notifications disabled.";

pub const BELL_TITLE_DENIED: &str = "Notifications blocked (enable in browser settings)";
pub const BELL_TITLE_ACTIVE: &str = "Notifications ON — click to disable";
pub const BELL_TITLE_IDLE: &str = "Enable task notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastSeverity {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ToastMessage {
    pub text: String,
    pub severity: ToastSeverity,
}

impl ToastMessage {
    pub fn new(text: impl Into<String>, severity: ToastSeverity) -> Self {
        Self {
            text: text.into(),
            severity,
        }
    }
}

/// Fire-and-forget toast display.
pub trait ToastSink {
    fn show_message(&mut self, text: &str, severity: ToastSeverity);
}

impl ToastSink for Vec<ToastMessage> {
    fn show_message(&mut self, text: &str, severity: ToastSeverity) {
        self.push(ToastMessage::new(text, severity));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BellState {
    pub active: bool,
    pub denied: bool,
    pub hidden: bool,
    pub title: String,
}

impl BellState {
    pub fn derive(subscription_active: bool, permission: NotificationPermission) -> Self {
        let denied = permission == NotificationPermission::Denied;
        let title = if denied {
            BELL_TITLE_DENIED
        } else if subscription_active {
            BELL_TITLE_ACTIVE
        } else {
            BELL_TITLE_IDLE
        };
        Self {
            active: subscription_active,
            denied,
            hidden: subscription_active,
            title: title.to_string(),
        }
    }
}
