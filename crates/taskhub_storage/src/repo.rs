#![forbid(unsafe_code)]

use taskhub_kernel_contracts::backend::{
    ChallengeCodeRow, PushSubscriptionRow, PushSubscriptionUpsert,
};
use taskhub_kernel_contracts::push::PushEndpoint;

use crate::taskhub_store::{StorageError, TaskHubStore, UpsertOutcome};

/// Typed repository interface for the `unsubscribe_codes` table.
pub trait UnsubscribeCodeRepo {
    fn unsub_code_insert_row(&mut self, row: ChallengeCodeRow) -> Result<(), StorageError>;

    fn unsub_code_rows(&self) -> Vec<ChallengeCodeRow>;

    fn unsub_code_delete_row(&mut self, id: &str) -> bool;
}

/// Typed repository interface for the `push_subscriptions` table.
pub trait PushSubscriptionRepo {
    fn push_sub_upsert_row(
        &mut self,
        input: PushSubscriptionUpsert,
    ) -> Result<UpsertOutcome, StorageError>;

    fn push_sub_row(&self, endpoint: &PushEndpoint) -> Option<&PushSubscriptionRow>;

    fn push_sub_rows(&self) -> Vec<&PushSubscriptionRow>;

    fn push_sub_delete_row(&mut self, endpoint: &PushEndpoint) -> bool;

    fn push_sub_update_done_task_ids(
        &mut self,
        endpoint: &PushEndpoint,
        done_task_ids: Vec<String>,
    ) -> Result<(), StorageError>;
}

impl UnsubscribeCodeRepo for TaskHubStore {
    fn unsub_code_insert_row(&mut self, row: ChallengeCodeRow) -> Result<(), StorageError> {
        self.insert_unsubscribe_code_row(row)
    }

    fn unsub_code_rows(&self) -> Vec<ChallengeCodeRow> {
        self.unsubscribe_code_rows()
    }

    fn unsub_code_delete_row(&mut self, id: &str) -> bool {
        self.delete_unsubscribe_code_row(id)
    }
}

impl PushSubscriptionRepo for TaskHubStore {
    fn push_sub_upsert_row(
        &mut self,
        input: PushSubscriptionUpsert,
    ) -> Result<UpsertOutcome, StorageError> {
        self.upsert_push_subscription_row(input)
    }

    fn push_sub_row(&self, endpoint: &PushEndpoint) -> Option<&PushSubscriptionRow> {
        self.push_subscription_row(endpoint)
    }

    fn push_sub_rows(&self) -> Vec<&PushSubscriptionRow> {
        self.push_subscription_rows()
    }

    fn push_sub_delete_row(&mut self, endpoint: &PushEndpoint) -> bool {
        self.delete_push_subscription_row(endpoint)
    }

    fn push_sub_update_done_task_ids(
        &mut self,
        endpoint: &PushEndpoint,
        done_task_ids: Vec<String>,
    ) -> Result<(), StorageError> {
        self.update_push_subscription_done_task_ids(endpoint, done_task_ids)
    }
}
