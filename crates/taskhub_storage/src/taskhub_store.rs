#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};
use taskhub_kernel_contracts::backend::{
    ChallengeCodeRow, PushSubscriptionRow, PushSubscriptionUpsert,
};
use taskhub_kernel_contracts::push::{PushEndpoint, PushKeys};
use taskhub_kernel_contracts::ContractViolation;

pub const TABLE_UNSUBSCRIBE_CODES: &str = "unsubscribe_codes";
pub const TABLE_PUSH_SUBSCRIPTIONS: &str = "push_subscriptions";

const DONE_TASK_ID_MAX_LEN: usize = 128;
const DONE_TASK_IDS_MAX: usize = 4_096;

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    DuplicateKey { table: &'static str, key: String },
    NotFound { table: &'static str, key: String },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey { table, key } => write!(f, "{table}: duplicate key {key}"),
            Self::NotFound { table, key } => write!(f, "{table}: no row for {key}"),
            Self::ContractViolation(v) => write!(f, "contract violation: {v}"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Short stable fingerprint of a push endpoint, safe to log.
pub fn subscription_id(endpoint: &PushEndpoint) -> String {
    let digest = Sha256::digest(endpoint.as_str().as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// In-memory rendition of the two hosted tables the notification flow uses.
#[derive(Debug, Default)]
pub struct TaskHubStore {
    unsubscribe_codes: BTreeMap<String, String>,
    push_subscriptions: BTreeMap<PushEndpoint, PushSubscriptionRow>,
}

impl TaskHubStore {
    pub fn new_in_memory() -> Self {
        Self {
            unsubscribe_codes: BTreeMap::new(),
            push_subscriptions: BTreeMap::new(),
        }
    }

    pub fn insert_unsubscribe_code_row(&mut self, row: ChallengeCodeRow) -> Result<(), StorageError> {
        if row.id.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "unsubscribe_codes.id",
                reason: "must not be empty",
            }
            .into());
        }
        if row.code.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "unsubscribe_codes.code",
                reason: "must not be empty",
            }
            .into());
        }
        if self.unsubscribe_codes.contains_key(&row.id) {
            return Err(StorageError::DuplicateKey {
                table: TABLE_UNSUBSCRIBE_CODES,
                key: row.id,
            });
        }
        self.unsubscribe_codes.insert(row.id, row.code);
        Ok(())
    }

    /// `select code, id` over the whole table.
    pub fn unsubscribe_code_rows(&self) -> Vec<ChallengeCodeRow> {
        self.unsubscribe_codes
            .iter()
            .map(|(id, code)| ChallengeCodeRow {
                id: id.clone(),
                code: code.clone(),
            })
            .collect()
    }

    pub fn delete_unsubscribe_code_row(&mut self, id: &str) -> bool {
        self.unsubscribe_codes.remove(id).is_some()
    }

    /// Create-or-update keyed by endpoint. Key material and timestamp are
    /// overwritten; `done_task_ids` survive.
    pub fn upsert_push_subscription_row(
        &mut self,
        input: PushSubscriptionUpsert,
    ) -> Result<UpsertOutcome, StorageError> {
        PushKeys::v1(input.p256dh.clone(), input.auth.clone())?;
        match self.push_subscriptions.get_mut(&input.endpoint) {
            Some(row) => {
                row.p256dh = input.p256dh;
                row.auth = input.auth;
                row.updated_at_ms = input.updated_at_ms;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let row = PushSubscriptionRow {
                    endpoint: input.endpoint.clone(),
                    p256dh: input.p256dh,
                    auth: input.auth,
                    updated_at_ms: input.updated_at_ms,
                    done_task_ids: Vec::new(),
                };
                self.push_subscriptions.insert(input.endpoint, row);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    pub fn push_subscription_row(&self, endpoint: &PushEndpoint) -> Option<&PushSubscriptionRow> {
        self.push_subscriptions.get(endpoint)
    }

    pub fn push_subscription_rows(&self) -> Vec<&PushSubscriptionRow> {
        self.push_subscriptions.values().collect()
    }

    pub fn delete_push_subscription_row(&mut self, endpoint: &PushEndpoint) -> bool {
        self.push_subscriptions.remove(endpoint).is_some()
    }

    pub fn update_push_subscription_done_task_ids(
        &mut self,
        endpoint: &PushEndpoint,
        done_task_ids: Vec<String>,
    ) -> Result<(), StorageError> {
        if done_task_ids.len() > DONE_TASK_IDS_MAX {
            return Err(ContractViolation::InvalidValue {
                field: "push_subscriptions.done_task_ids",
                reason: "must be <= 4096 entries",
            }
            .into());
        }
        let mut deduped: Vec<String> = Vec::with_capacity(done_task_ids.len());
        for id in done_task_ids {
            if id.trim().is_empty() || id.len() > DONE_TASK_ID_MAX_LEN {
                return Err(ContractViolation::InvalidValue {
                    field: "push_subscriptions.done_task_ids",
                    reason: "entries must be non-empty and <= 128 bytes",
                }
                .into());
            }
            if !deduped.contains(&id) {
                deduped.push(id);
            }
        }
        let Some(row) = self.push_subscriptions.get_mut(endpoint) else {
            return Err(StorageError::NotFound {
                table: TABLE_PUSH_SUBSCRIPTIONS,
                key: subscription_id(endpoint),
            });
        };
        row.done_task_ids = deduped;
        Ok(())
    }
}
