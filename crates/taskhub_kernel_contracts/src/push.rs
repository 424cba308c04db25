#![forbid(unsafe_code)]

use crate::common::validate_text;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const PUSH_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);
pub const PUSH_ENDPOINT_MAX_LEN: usize = 2048;
pub const PUSH_KEY_MAX_LEN: usize = 256;

pub const DEFAULT_PUSH_TITLE: &str = "🚫 Task Cancelled";
pub const DEFAULT_PUSH_BODY: &str = "A task has been cancelled. Tap to view.";
pub const DEFAULT_PUSH_TAG: &str = "taskhub-cancel";
pub const DEFAULT_PUSH_URL: &str = "/";

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct PushEndpoint(String);

impl PushEndpoint {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ContractViolation> {
        let endpoint = endpoint.into();
        validate_text("push_subscription.endpoint", &endpoint, PUSH_ENDPOINT_MAX_LEN)?;
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ContractViolation::InvalidValue {
                field: "push_subscription.endpoint",
                reason: "must be an http(s) url",
            });
        }
        if endpoint.chars().any(char::is_whitespace) {
            return Err(ContractViolation::InvalidValue {
                field: "push_subscription.endpoint",
                reason: "must not contain whitespace",
            });
        }
        Ok(Self(endpoint))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PushEndpoint {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PushEndpoint> for String {
    fn from(value: PushEndpoint) -> Self {
        value.0
    }
}

/// Base64 key material as handed out by the push service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

impl PushKeys {
    pub fn v1(p256dh: String, auth: String) -> Result<Self, ContractViolation> {
        let keys = Self { p256dh, auth };
        keys.validate()?;
        Ok(keys)
    }
}

impl Validate for PushKeys {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_key_material("push_keys.p256dh", &self.p256dh)?;
        validate_key_material("push_keys.auth", &self.auth)
    }
}

fn validate_key_material(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    validate_text(field, value, PUSH_KEY_MAX_LEN)?;
    let base64_like = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'));
    if !base64_like {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be base64 encoded",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PushSubscription {
    pub endpoint: PushEndpoint,
    pub keys: PushKeys,
}

impl PushSubscription {
    pub fn v1(endpoint: PushEndpoint, keys: PushKeys) -> Result<Self, ContractViolation> {
        let sub = Self { endpoint, keys };
        sub.validate()?;
        Ok(sub)
    }
}

impl Validate for PushSubscription {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.keys.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    Default,
    Granted,
    Denied,
}

impl NotificationPermission {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "default" | "prompt" => Some(Self::Default),
            "granted" => Some(Self::Granted),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlatformCapabilities {
    pub notifications: bool,
    pub push_manager: bool,
}

impl PlatformCapabilities {
    pub fn full() -> Self {
        Self {
            notifications: true,
            push_manager: true,
        }
    }

    pub fn none() -> Self {
        Self {
            notifications: false,
            push_manager: false,
        }
    }

    pub fn supports_push(&self) -> bool {
        self.notifications && self.push_manager
    }
}

/// What the service worker shows for one push delivery.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PushNotificationDisplay {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub url: String,
}

impl Default for PushNotificationDisplay {
    fn default() -> Self {
        Self {
            title: DEFAULT_PUSH_TITLE.to_string(),
            body: DEFAULT_PUSH_BODY.to_string(),
            tag: DEFAULT_PUSH_TAG.to_string(),
            url: DEFAULT_PUSH_URL.to_string(),
        }
    }
}
