#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use taskhub_engines::push_codec::VapidPublicKey;
use taskhub_kernel_contracts::backend::PushSubscriptionUpsert;
use taskhub_kernel_contracts::notify::{
    BellState, ToastSeverity, ToastSink, TOAST_BLOCKED, TOAST_ENABLED, TOAST_ENABLE_FAILED,
    TOAST_NOT_SUPPORTED, TOAST_PERMISSION_DENIED,
};
use taskhub_kernel_contracts::push::{NotificationPermission, PushSubscription};
use taskhub_kernel_contracts::ContractViolation;
use taskhub_storage::taskhub_store::subscription_id;
use tracing::{debug, info, warn};

use crate::backend::PushSubscriptionBackend;
use crate::push_platform::PushPlatform;
use crate::unsub_challenge::UnsubscribeAction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushManagerConfig {
    pub vapid_public_key: String,
}

impl PushManagerConfig {
    pub fn mvp_v1(vapid_public_key: impl Into<String>) -> Self {
        Self {
            vapid_public_key: vapid_public_key.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// A subscription is active; disabling goes through the unsubscribe challenge.
    ChallengeRequired,
    Unsupported,
    Blocked,
    PermissionRefused,
    Enabled,
    EnableFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadRefresh {
    NoSubscription,
    Refreshed,
    RefreshFailed,
}

pub struct PushSubscriptionManager<P, B>
where
    P: PushPlatform,
    B: PushSubscriptionBackend,
{
    vapid: VapidPublicKey,
    platform: P,
    backend: B,
    done_task_ids: BTreeSet<String>,
}

impl<P, B> PushSubscriptionManager<P, B>
where
    P: PushPlatform,
    B: PushSubscriptionBackend,
{
    pub fn new(config: PushManagerConfig, platform: P, backend: B) -> Result<Self, ContractViolation> {
        let vapid = VapidPublicKey::from_base64url(&config.vapid_public_key).map_err(|_| {
            ContractViolation::InvalidValue {
                field: "push_manager_config.vapid_public_key",
                reason: "must be a base64url uncompressed P-256 public key",
            }
        })?;
        Ok(Self {
            vapid,
            platform,
            backend,
            done_task_ids: BTreeSet::new(),
        })
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_subscribed(&self) -> bool {
        self.platform.current_subscription().is_some()
    }

    /// False without prompting when the platform cannot notify or the user
    /// already refused.
    pub fn request_permission(&mut self) -> bool {
        if !self.platform.capabilities().supports_push() {
            return false;
        }
        match self.platform.permission() {
            NotificationPermission::Granted => true,
            NotificationPermission::Denied => false,
            NotificationPermission::Default => {
                self.platform.request_permission() == NotificationPermission::Granted
            }
        }
    }

    /// Reuses the current subscription when there is one, then mirrors it
    /// into the backend. A failed mirror is logged; the subscription stands.
    pub fn subscribe(&mut self, updated_at_ms: u64) -> Option<PushSubscription> {
        let sub = match self.platform.current_subscription() {
            Some(existing) => existing,
            None => match self.platform.subscribe(&self.vapid) {
                Ok(sub) => sub,
                Err(err) => {
                    warn!(error = %err, "push subscribe failed");
                    return None;
                }
            },
        };
        let id = subscription_id(&sub.endpoint);
        match self
            .backend
            .upsert_subscription(PushSubscriptionUpsert::from_subscription(&sub, updated_at_ms))
        {
            Ok(()) => info!(subscription_id = %id, "push subscription saved"),
            Err(err) => warn!(subscription_id = %id, error = %err, "failed to save push subscription"),
        }
        self.sync_done_task_ids_inner(&sub);
        Some(sub)
    }

    /// Removes the backend row, then revokes the device subscription.
    /// Also used directly by system cleanup paths.
    pub fn unsubscribe(&mut self) {
        let Some(sub) = self.platform.current_subscription() else {
            return;
        };
        let id = subscription_id(&sub.endpoint);
        match self.backend.delete_subscription(&sub.endpoint) {
            Ok(existed) => debug!(subscription_id = %id, existed, "push subscription row deleted"),
            Err(err) => warn!(subscription_id = %id, error = %err, "failed to delete push subscription row"),
        }
        match self.platform.unsubscribe() {
            Ok(_) => info!(subscription_id = %id, "unsubscribed"),
            Err(err) => warn!(subscription_id = %id, error = %err, "local unsubscribe failed"),
        }
    }

    pub fn toggle<T>(&mut self, toasts: &mut T, updated_at_ms: u64) -> ToggleOutcome
    where
        T: ToastSink + ?Sized,
    {
        if !self.platform.capabilities().supports_push() {
            toasts.show_message(TOAST_NOT_SUPPORTED, ToastSeverity::Error);
            return ToggleOutcome::Unsupported;
        }
        if self.platform.permission() == NotificationPermission::Denied {
            toasts.show_message(TOAST_BLOCKED, ToastSeverity::Warn);
            return ToggleOutcome::Blocked;
        }
        if self.is_subscribed() {
            return ToggleOutcome::ChallengeRequired;
        }
        if !self.request_permission() {
            toasts.show_message(TOAST_PERMISSION_DENIED, ToastSeverity::Warn);
            return ToggleOutcome::PermissionRefused;
        }
        match self.subscribe(updated_at_ms) {
            Some(_) => {
                toasts.show_message(TOAST_ENABLED, ToastSeverity::Success);
                ToggleOutcome::Enabled
            }
            None => {
                toasts.show_message(TOAST_ENABLE_FAILED, ToastSeverity::Error);
                ToggleOutcome::EnableFailed
            }
        }
    }

    /// Application start: an existing subscription is re-upserted so the
    /// stored row stays fresh.
    pub fn refresh_on_load(&mut self, updated_at_ms: u64) -> LoadRefresh {
        if !self.platform.capabilities().supports_push() {
            return LoadRefresh::NoSubscription;
        }
        let Some(sub) = self.platform.current_subscription() else {
            return LoadRefresh::NoSubscription;
        };
        let id = subscription_id(&sub.endpoint);
        let outcome = match self
            .backend
            .upsert_subscription(PushSubscriptionUpsert::from_subscription(&sub, updated_at_ms))
        {
            Ok(()) => {
                info!(subscription_id = %id, "push subscription refreshed");
                LoadRefresh::Refreshed
            }
            Err(err) => {
                warn!(subscription_id = %id, error = %err, "push subscription re-upsert failed");
                LoadRefresh::RefreshFailed
            }
        };
        self.sync_done_task_ids_inner(&sub);
        outcome
    }

    pub fn set_task_done(&mut self, task_id: impl Into<String>, done: bool) {
        let task_id = task_id.into();
        if done {
            if !is_valid_done_task_id(&task_id) {
                warn!(len = task_id.len(), "ignoring malformed done task id");
                return;
            }
            self.done_task_ids.insert(task_id);
        } else {
            self.done_task_ids.remove(&task_id);
        }
        let ids: Vec<String> = self.done_task_ids.iter().cloned().collect();
        self.sync_done_task_ids(ids);
    }

    /// Pushes the completed-task list to the current subscription row. No-op
    /// without an active subscription; failures are logged.
    /// Malformed ids are dropped before the local set is replaced; an
    /// oversized list leaves the local set untouched.
    pub fn sync_done_task_ids(&mut self, done_task_ids: Vec<String>) -> bool {
        let submitted = done_task_ids.len();
        let kept: BTreeSet<String> = done_task_ids
            .into_iter()
            .filter(|id| is_valid_done_task_id(id))
            .collect();
        if kept.len() > DONE_TASK_IDS_MAX {
            warn!(count = kept.len(), "done task list too large; not synced");
            return false;
        }
        let dropped = submitted - kept.len();
        if dropped > 0 {
            debug!(dropped, "dropped malformed or duplicate done task ids");
        }
        self.done_task_ids = kept;
        match self.platform.current_subscription() {
            Some(sub) => self.sync_done_task_ids_inner(&sub),
            None => false,
        }
    }

    fn sync_done_task_ids_inner(&self, sub: &PushSubscription) -> bool {
        let ids: Vec<String> = self.done_task_ids.iter().cloned().collect();
        match self.backend.update_done_task_ids(&sub.endpoint, ids) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    subscription_id = %subscription_id(&sub.endpoint),
                    error = %err,
                    "could not sync done tasks"
                );
                false
            }
        }
    }

    pub fn bell_state(&self) -> BellState {
        BellState::derive(self.is_subscribed(), self.platform.permission())
    }
}

const DONE_TASK_ID_MAX_LEN: usize = 128;
const DONE_TASK_IDS_MAX: usize = 4_096;

fn is_valid_done_task_id(id: &str) -> bool {
    !id.trim().is_empty() && id.len() <= DONE_TASK_ID_MAX_LEN && !id.chars().any(char::is_control)
}

impl<P, B> UnsubscribeAction for PushSubscriptionManager<P, B>
where
    P: PushPlatform,
    B: PushSubscriptionBackend,
{
    fn unsubscribe_confirmed(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::push_platform::SimulatedPushPlatform;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use taskhub_kernel_contracts::notify::{ToastMessage, BELL_TITLE_ACTIVE, BELL_TITLE_DENIED};
    use taskhub_kernel_contracts::push::PlatformCapabilities;
    use taskhub_storage::repo::PushSubscriptionRepo;

    fn vapid_key() -> String {
        let mut raw = [3u8; 65];
        raw[0] = 0x04;
        URL_SAFE_NO_PAD.encode(raw)
    }

    fn manager(
        platform: SimulatedPushPlatform,
    ) -> (PushSubscriptionManager<SimulatedPushPlatform, LocalBackend>, LocalBackend) {
        let backend = LocalBackend::new_in_memory();
        let m = PushSubscriptionManager::new(
            PushManagerConfig::mvp_v1(vapid_key()),
            platform,
            backend.clone(),
        )
        .unwrap();
        (m, backend)
    }

    fn row_count(backend: &LocalBackend) -> usize {
        backend.store().lock().unwrap().push_sub_rows().len()
    }

    #[test]
    fn at_push_mgr_01_rejects_malformed_vapid_key() {
        let r = PushSubscriptionManager::new(
            PushManagerConfig::mvp_v1("short"),
            SimulatedPushPlatform::new("https://push.example/send"),
            LocalBackend::new_in_memory(),
        );
        assert!(r.is_err());
    }

    #[test]
    fn at_push_mgr_02_scenario_e_repeat_subscribe_updates_single_row() {
        let (mut m, backend) = manager(
            SimulatedPushPlatform::new("https://push.example/send")
                .with_permission(NotificationPermission::Granted),
        );
        let first = m.subscribe(1_000).unwrap();
        let second = m.subscribe(5_000).unwrap();
        assert_eq!(first, second);
        assert_eq!(row_count(&backend), 1);
        let store = backend.store();
        let store = store.lock().unwrap();
        assert_eq!(store.push_sub_row(&first.endpoint).unwrap().updated_at_ms, 5_000);
    }

    #[test]
    fn at_push_mgr_03_toggle_routes_active_subscription_to_challenge() {
        let (mut m, backend) = manager(SimulatedPushPlatform::new("https://push.example/send"));
        let mut toasts: Vec<ToastMessage> = Vec::new();
        assert_eq!(m.toggle(&mut toasts, 10), ToggleOutcome::Enabled);
        assert_eq!(toasts.last().unwrap().text, TOAST_ENABLED);

        assert_eq!(m.toggle(&mut toasts, 20), ToggleOutcome::ChallengeRequired);
        assert!(m.is_subscribed());
        assert_eq!(row_count(&backend), 1);
        assert_eq!(toasts.len(), 1);
    }

    #[test]
    fn at_push_mgr_04_toggle_failure_paths_toast() {
        let (mut none, _) = manager(
            SimulatedPushPlatform::new("https://push.example/send")
                .with_capabilities(PlatformCapabilities::none()),
        );
        let mut toasts: Vec<ToastMessage> = Vec::new();
        assert_eq!(none.toggle(&mut toasts, 1), ToggleOutcome::Unsupported);
        assert_eq!(toasts[0].severity, ToastSeverity::Error);
        assert!(!none.request_permission());

        let (mut denied, _) = manager(
            SimulatedPushPlatform::new("https://push.example/send")
                .with_permission(NotificationPermission::Denied),
        );
        assert_eq!(denied.toggle(&mut toasts, 1), ToggleOutcome::Blocked);
        assert_eq!(denied.bell_state().title, BELL_TITLE_DENIED);

        let (mut refused, _) = manager(
            SimulatedPushPlatform::new("https://push.example/send")
                .with_prompt_answer(NotificationPermission::Denied),
        );
        assert_eq!(refused.toggle(&mut toasts, 1), ToggleOutcome::PermissionRefused);
        assert_eq!(toasts.last().unwrap().text, TOAST_PERMISSION_DENIED);

        let (mut failing, backend) = manager(SimulatedPushPlatform::new("https://push.example/send"));
        failing.platform_mut().set_fail_subscribe(true);
        assert_eq!(failing.toggle(&mut toasts, 1), ToggleOutcome::EnableFailed);
        assert_eq!(toasts.last().unwrap().text, TOAST_ENABLE_FAILED);
        assert_eq!(row_count(&backend), 0);
    }

    #[test]
    fn at_push_mgr_05_unsubscribe_removes_row_then_revokes() {
        let (mut m, backend) = manager(
            SimulatedPushPlatform::new("https://push.example/send")
                .with_permission(NotificationPermission::Granted),
        );
        m.subscribe(1).unwrap();
        assert_eq!(m.bell_state().title, BELL_TITLE_ACTIVE);
        m.unsubscribe_confirmed();
        assert!(!m.is_subscribed());
        assert_eq!(row_count(&backend), 0);
        m.unsubscribe();
    }

    #[test]
    fn at_push_mgr_06_refresh_on_load_reupserts_missing_row() {
        let (mut m, backend) = manager(
            SimulatedPushPlatform::new("https://push.example/send")
                .with_permission(NotificationPermission::Granted),
        );
        assert_eq!(m.refresh_on_load(1), LoadRefresh::NoSubscription);
        let sub = m.subscribe(1).unwrap();
        backend.delete_subscription(&sub.endpoint).unwrap();
        assert_eq!(m.refresh_on_load(9), LoadRefresh::Refreshed);
        let store = backend.store();
        assert_eq!(
            store.lock().unwrap().push_sub_row(&sub.endpoint).unwrap().updated_at_ms,
            9
        );
    }

    #[test]
    fn at_push_mgr_07_done_tasks_sync_only_when_subscribed() {
        let (mut m, backend) = manager(
            SimulatedPushPlatform::new("https://push.example/send")
                .with_permission(NotificationPermission::Granted),
        );
        assert!(!m.sync_done_task_ids(vec!["t1".to_string()]));
        let sub = m.subscribe(1).unwrap();
        m.set_task_done("t2", true);
        m.set_task_done("t1", false);
        let store = backend.store();
        let store = store.lock().unwrap();
        assert_eq!(
            store.push_sub_row(&sub.endpoint).unwrap().done_task_ids,
            vec!["t2".to_string()]
        );
    }

    #[test]
    fn at_push_mgr_08_invalid_done_ids_are_not_kept() {
        let (mut m, backend) = manager(
            SimulatedPushPlatform::new("https://push.example/send")
                .with_permission(NotificationPermission::Granted),
        );
        let sub = m.subscribe(1).unwrap();
        assert!(m.sync_done_task_ids(vec![
            "t1".to_string(),
            " ".to_string(),
            "x".repeat(129),
            "t1".to_string(),
            "bad\nid".to_string(),
        ]));
        assert_eq!(m.done_task_ids.iter().collect::<Vec<_>>(), vec!["t1"]);
        {
            let store = backend.store();
            let store = store.lock().unwrap();
            assert_eq!(
                store.push_sub_row(&sub.endpoint).unwrap().done_task_ids,
                vec!["t1".to_string()]
            );
        }

        m.set_task_done("", true);
        m.set_task_done("y".repeat(200), true);
        assert_eq!(m.done_task_ids.len(), 1);

        let too_many: Vec<String> = (0..4_097).map(|i| format!("t{i}")).collect();
        assert!(!m.sync_done_task_ids(too_many));
        assert_eq!(m.done_task_ids.iter().collect::<Vec<_>>(), vec!["t1"]);
    }
}
