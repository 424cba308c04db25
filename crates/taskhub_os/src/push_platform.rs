#![forbid(unsafe_code)]

use std::fmt;

use taskhub_engines::push_codec::{encode_key_material, VapidPublicKey};
use taskhub_kernel_contracts::push::{
    NotificationPermission, PlatformCapabilities, PushEndpoint, PushKeys, PushSubscription,
};
use taskhub_kernel_contracts::ContractViolation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    Unsupported,
    PermissionDenied,
    SubscribeFailed(String),
    UnsubscribeFailed(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "push messaging is not supported"),
            Self::PermissionDenied => write!(f, "notification permission not granted"),
            Self::SubscribeFailed(detail) => write!(f, "subscribe failed: {detail}"),
            Self::UnsubscribeFailed(detail) => write!(f, "unsubscribe failed: {detail}"),
        }
    }
}

impl std::error::Error for PlatformError {}

impl From<ContractViolation> for PlatformError {
    fn from(v: ContractViolation) -> Self {
        PlatformError::SubscribeFailed(v.to_string())
    }
}

/// Device-side push API: permission, subscription lifecycle.
pub trait PushPlatform {
    fn capabilities(&self) -> PlatformCapabilities;

    fn permission(&self) -> NotificationPermission;

    /// Prompts the user when the permission is still undecided.
    fn request_permission(&mut self) -> NotificationPermission;

    fn current_subscription(&self) -> Option<PushSubscription>;

    fn subscribe(
        &mut self,
        application_server_key: &VapidPublicKey,
    ) -> Result<PushSubscription, PlatformError>;

    /// Returns whether a subscription was revoked.
    fn unsubscribe(&mut self) -> Result<bool, PlatformError>;
}

/// Headless push platform for the adapter and tests.
#[derive(Debug, Clone)]
pub struct SimulatedPushPlatform {
    capabilities: PlatformCapabilities,
    permission: NotificationPermission,
    prompt_answer: NotificationPermission,
    subscription: Option<PushSubscription>,
    endpoint_base: String,
    next_seq: u64,
    fail_subscribe: bool,
    prompts: u32,
}

impl SimulatedPushPlatform {
    pub fn new(endpoint_base: impl Into<String>) -> Self {
        Self {
            capabilities: PlatformCapabilities::full(),
            permission: NotificationPermission::Default,
            prompt_answer: NotificationPermission::Granted,
            subscription: None,
            endpoint_base: endpoint_base.into().trim_end_matches('/').to_string(),
            next_seq: 1,
            fail_subscribe: false,
            prompts: 0,
        }
    }

    pub fn with_capabilities(mut self, capabilities: PlatformCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_permission(mut self, permission: NotificationPermission) -> Self {
        self.permission = permission;
        self
    }

    /// What the user answers when prompted.
    pub fn with_prompt_answer(mut self, answer: NotificationPermission) -> Self {
        self.prompt_answer = answer;
        self
    }

    pub fn set_fail_subscribe(&mut self, fail: bool) {
        self.fail_subscribe = fail;
    }

    pub fn prompts(&self) -> u32 {
        self.prompts
    }

    fn mint_subscription(&mut self) -> Result<PushSubscription, PlatformError> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        let endpoint = PushEndpoint::new(format!("{}/{seq:08}", self.endpoint_base))?;

        let mut p256dh = [0u8; 65];
        p256dh[0] = 0x04;
        for (i, b) in p256dh.iter_mut().enumerate().skip(1) {
            *b = (seq as u8).wrapping_mul(31).wrapping_add(i as u8);
        }
        let mut auth = [0u8; 16];
        for (i, b) in auth.iter_mut().enumerate() {
            *b = (seq as u8).wrapping_add((i as u8).wrapping_mul(17));
        }
        let keys = PushKeys::v1(encode_key_material(&p256dh), encode_key_material(&auth))?;
        Ok(PushSubscription::v1(endpoint, keys)?)
    }
}

impl PushPlatform for SimulatedPushPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn request_permission(&mut self) -> NotificationPermission {
        if self.permission == NotificationPermission::Default {
            self.prompts += 1;
            self.permission = self.prompt_answer;
        }
        self.permission
    }

    fn current_subscription(&self) -> Option<PushSubscription> {
        self.subscription.clone()
    }

    fn subscribe(
        &mut self,
        _application_server_key: &VapidPublicKey,
    ) -> Result<PushSubscription, PlatformError> {
        if !self.capabilities.supports_push() {
            return Err(PlatformError::Unsupported);
        }
        if self.permission != NotificationPermission::Granted {
            return Err(PlatformError::PermissionDenied);
        }
        if let Some(existing) = &self.subscription {
            return Ok(existing.clone());
        }
        if self.fail_subscribe {
            return Err(PlatformError::SubscribeFailed(
                "push service unavailable".to_string(),
            ));
        }
        let sub = self.mint_subscription()?;
        self.subscription = Some(sub.clone());
        Ok(sub)
    }

    fn unsubscribe(&mut self) -> Result<bool, PlatformError> {
        Ok(self.subscription.take().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vapid() -> VapidPublicKey {
        let mut raw = [9u8; 65];
        raw[0] = 0x04;
        VapidPublicKey::from_base64url(&taskhub_engines::push_codec::encode_key_material(&raw))
            .unwrap()
    }

    #[test]
    fn at_platform_01_prompt_only_when_undecided() {
        let mut p = SimulatedPushPlatform::new("https://push.example/send");
        assert_eq!(p.request_permission(), NotificationPermission::Granted);
        assert_eq!(p.request_permission(), NotificationPermission::Granted);
        assert_eq!(p.prompts(), 1);

        let mut denied = SimulatedPushPlatform::new("https://push.example/send")
            .with_permission(NotificationPermission::Denied);
        assert_eq!(denied.request_permission(), NotificationPermission::Denied);
        assert_eq!(denied.prompts(), 0);
    }

    #[test]
    fn at_platform_02_subscribe_reuses_existing() {
        let mut p = SimulatedPushPlatform::new("https://push.example/send")
            .with_permission(NotificationPermission::Granted);
        let a = p.subscribe(&vapid()).unwrap();
        let b = p.subscribe(&vapid()).unwrap();
        assert_eq!(a, b);
        assert!(p.unsubscribe().unwrap());
        assert!(!p.unsubscribe().unwrap());
        let c = p.subscribe(&vapid()).unwrap();
        assert_ne!(a.endpoint, c.endpoint);
    }

    #[test]
    fn at_platform_03_subscribe_requires_grant() {
        let mut p = SimulatedPushPlatform::new("https://push.example/send");
        assert_eq!(p.subscribe(&vapid()), Err(PlatformError::PermissionDenied));
    }
}
