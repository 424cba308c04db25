#![forbid(unsafe_code)]

use std::fmt;

use crate::push::{PushEndpoint, PushSubscription};

/// One row of the `unsubscribe_codes` table, as returned by `select code, id`.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChallengeCodeRow {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub code: String,
}

impl fmt::Debug for ChallengeCodeRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeCodeRow")
            .field("id", &self.id)
            .field("code", &"<redacted>")
            .finish()
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    match <RawId as serde::Deserialize>::deserialize(deserializer)? {
        RawId::Text(text) => Ok(text),
        RawId::Number(n) => Ok(n.to_string()),
    }
}

/// Payload for an upsert-by-endpoint into `push_subscriptions`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PushSubscriptionUpsert {
    pub endpoint: PushEndpoint,
    pub p256dh: String,
    pub auth: String,
    pub updated_at_ms: u64,
}

impl PushSubscriptionUpsert {
    pub fn from_subscription(sub: &PushSubscription, updated_at_ms: u64) -> Self {
        Self {
            endpoint: sub.endpoint.clone(),
            p256dh: sub.keys.p256dh.clone(),
            auth: sub.keys.auth.clone(),
            updated_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PushSubscriptionRow {
    pub endpoint: PushEndpoint,
    pub p256dh: String,
    pub auth: String,
    pub updated_at_ms: u64,
    #[serde(default)]
    pub done_task_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    Transport { kind: &'static str },
    Status { code: u16 },
    Decode,
    Storage(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { kind } => write!(f, "backend transport error: {kind}"),
            Self::Status { code } => write!(f, "backend returned status {code}"),
            Self::Decode => write!(f, "backend response could not be decoded"),
            Self::Storage(detail) => write!(f, "backend storage error: {detail}"),
        }
    }
}

impl std::error::Error for BackendError {}
