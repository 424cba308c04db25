#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use taskhub_kernel_contracts::backend::{
    BackendError, ChallengeCodeRow, PushSubscriptionUpsert,
};
use taskhub_kernel_contracts::push::PushEndpoint;
use taskhub_storage::repo::{PushSubscriptionRepo, UnsubscribeCodeRepo};
use taskhub_storage::taskhub_store::{StorageError, TaskHubStore};

/// `select code, id` over the challenge code table.
pub trait UnsubCodeBackend {
    fn select_codes(&self) -> Result<Vec<ChallengeCodeRow>, BackendError>;
}

/// Subscription table operations keyed by endpoint.
pub trait PushSubscriptionBackend {
    fn upsert_subscription(&self, input: PushSubscriptionUpsert) -> Result<(), BackendError>;

    /// Returns whether a row existed.
    fn delete_subscription(&self, endpoint: &PushEndpoint) -> Result<bool, BackendError>;

    fn update_done_task_ids(
        &self,
        endpoint: &PushEndpoint,
        done_task_ids: Vec<String>,
    ) -> Result<(), BackendError>;
}

impl<T> UnsubCodeBackend for Arc<T>
where
    T: UnsubCodeBackend + ?Sized,
{
    fn select_codes(&self) -> Result<Vec<ChallengeCodeRow>, BackendError> {
        (**self).select_codes()
    }
}

impl<T> PushSubscriptionBackend for Arc<T>
where
    T: PushSubscriptionBackend + ?Sized,
{
    fn upsert_subscription(&self, input: PushSubscriptionUpsert) -> Result<(), BackendError> {
        (**self).upsert_subscription(input)
    }

    fn delete_subscription(&self, endpoint: &PushEndpoint) -> Result<bool, BackendError> {
        (**self).delete_subscription(endpoint)
    }

    fn update_done_task_ids(
        &self,
        endpoint: &PushEndpoint,
        done_task_ids: Vec<String>,
    ) -> Result<(), BackendError> {
        (**self).update_done_task_ids(endpoint, done_task_ids)
    }
}

/// Backend served from the in-process store.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    store: Arc<Mutex<TaskHubStore>>,
}

impl LocalBackend {
    pub fn new_in_memory() -> Self {
        Self {
            store: Arc::new(Mutex::new(TaskHubStore::new_in_memory())),
        }
    }

    pub fn with_store(store: Arc<Mutex<TaskHubStore>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<Mutex<TaskHubStore>> {
        self.store.clone()
    }

    pub fn seed_unsubscribe_codes<I>(&self, rows: I) -> Result<usize, BackendError>
    where
        I: IntoIterator<Item = ChallengeCodeRow>,
    {
        let mut store = self.lock()?;
        let mut inserted = 0;
        for row in rows {
            store.unsub_code_insert_row(row).map_err(storage_error)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    fn lock(&self) -> Result<MutexGuard<'_, TaskHubStore>, BackendError> {
        self.store
            .lock()
            .map_err(|_| BackendError::Storage("store lock poisoned".to_string()))
    }
}

fn storage_error(err: StorageError) -> BackendError {
    BackendError::Storage(err.to_string())
}

impl UnsubCodeBackend for LocalBackend {
    fn select_codes(&self) -> Result<Vec<ChallengeCodeRow>, BackendError> {
        Ok(self.lock()?.unsub_code_rows())
    }
}

impl PushSubscriptionBackend for LocalBackend {
    fn upsert_subscription(&self, input: PushSubscriptionUpsert) -> Result<(), BackendError> {
        self.lock()?
            .push_sub_upsert_row(input)
            .map(|_| ())
            .map_err(storage_error)
    }

    fn delete_subscription(&self, endpoint: &PushEndpoint) -> Result<bool, BackendError> {
        Ok(self.lock()?.push_sub_delete_row(endpoint))
    }

    fn update_done_task_ids(
        &self,
        endpoint: &PushEndpoint,
        done_task_ids: Vec<String>,
    ) -> Result<(), BackendError> {
        self.lock()?
            .push_sub_update_done_task_ids(endpoint, done_task_ids)
            .map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_backend_01_local_backend_shares_store() {
        let backend = LocalBackend::new_in_memory();
        let clone = backend.clone();
        backend
            .seed_unsubscribe_codes(vec![ChallengeCodeRow {
                id: "1".to_string(),
                code: "Il1|!O0".to_string(),
            }])
            .unwrap();
        assert_eq!(clone.select_codes().unwrap().len(), 1);
    }

    #[test]
    fn at_backend_02_storage_errors_map_to_backend_errors() {
        let backend = LocalBackend::new_in_memory();
        let endpoint = PushEndpoint::new("https://push.example/x").unwrap();
        assert!(matches!(
            backend.update_done_task_ids(&endpoint, vec!["t".to_string()]),
            Err(BackendError::Storage(_))
        ));
        assert!(!backend.delete_subscription(&endpoint).unwrap());
    }
}
