#![forbid(unsafe_code)]

pub mod error;
pub mod rest_backend;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use taskhub_engines::unsub_code::RemoteCodeFetch;
use taskhub_engines::unsub_glyph::RenderViewport;
use taskhub_engines::unsub_guard::{AnswerFieldEvent, InterceptKind};
use taskhub_kernel_contracts::backend::{BackendError, ChallengeCodeRow, PushSubscriptionUpsert};
use taskhub_kernel_contracts::notify::{BellState, ToastMessage};
use taskhub_kernel_contracts::push::PushEndpoint;
use taskhub_kernel_contracts::unsub::{ChallengePhase, ChallengeView};
use taskhub_kernel_contracts::MonotonicTimeNs;
use taskhub_os::backend::{LocalBackend, PushSubscriptionBackend, UnsubCodeBackend};
use taskhub_os::notify_flow::{NotificationFlow, NotificationFlowConfig, ToggleFlowOutcome};
use taskhub_os::push_manager::{LoadRefresh, ToggleOutcome};
use taskhub_os::push_platform::SimulatedPushPlatform;
use taskhub_os::unsub_challenge::{EventOutcome, LoadOutcome, LoadTicket, SubmitOutcome};
use taskhub_os::unsub_code_fetch::UnsubCodeFetcher;
use tracing::{debug, info, warn};

pub use error::AdapterError;
use rest_backend::{RestBackend, RestBackendConfig};

/// Development application-server key used when `TASKHUB_VAPID_PUBLIC_KEY` is unset.
pub const DEV_VAPID_PUBLIC_KEY: &str =
    "BAswVXqfxOkOM1h9osfsETZbgKXK7xQ5XoOozfIXPGGGq9D1Gj9kia7T-B1CZ4yx1vsgRWqPtNn-I0htkrfcASY";

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
const SIMULATED_PUSH_ENDPOINT_BASE: &str = "https://push.taskhub.invalid/send";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    InMemory,
    Rest(RestBackendConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    pub bind: SocketAddr,
    pub backend: BackendSelection,
    pub flow: NotificationFlowConfig,
}

impl AdapterConfig {
    pub fn from_env() -> Result<Self, AdapterError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AdapterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("TASKHUB_HTTP_BIND").unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());
        let bind: SocketAddr = bind_raw
            .trim()
            .parse()
            .map_err(|_| AdapterError::Config(format!("TASKHUB_HTTP_BIND is not an address: {bind_raw}")))?;

        let vapid = match non_empty(lookup("TASKHUB_VAPID_PUBLIC_KEY")) {
            Some(key) => key,
            None => {
                warn!("TASKHUB_VAPID_PUBLIC_KEY unset; using the development key");
                DEV_VAPID_PUBLIC_KEY.to_string()
            }
        };
        let mut flow = NotificationFlowConfig::mvp_v1(vapid);
        flow.code_fetch.timeout_ms = lookup("TASKHUB_CODE_FETCH_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| (100..=60_000).contains(v))
            .unwrap_or(4_000);
        let width = lookup("TASKHUB_SURFACE_WIDTH")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| (120..=4_096).contains(v))
            .unwrap_or(flow.challenge.viewport.container_width_css);
        let dpr = lookup("TASKHUB_DEVICE_PIXEL_RATIO")
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite() && (0.5..=8.0).contains(v))
            .unwrap_or(flow.challenge.viewport.device_pixel_ratio);
        flow.challenge.viewport = RenderViewport::new(width, dpr);

        let backend = match non_empty(lookup("TASKHUB_BACKEND_URL")) {
            None => BackendSelection::InMemory,
            Some(url) => {
                let key = non_empty(lookup("TASKHUB_BACKEND_KEY")).ok_or_else(|| {
                    AdapterError::Config("TASKHUB_BACKEND_KEY is required with TASKHUB_BACKEND_URL".to_string())
                })?;
                BackendSelection::Rest(RestBackendConfig::mvp_v1(url, key))
            }
        };

        Ok(Self {
            bind,
            backend,
            flow,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Either the in-process store or the hosted REST tables.
#[derive(Debug, Clone)]
pub enum AdapterBackend {
    Local(LocalBackend),
    Rest(RestBackend),
}

impl AdapterBackend {
    pub fn from_selection(selection: &BackendSelection) -> Result<Self, AdapterError> {
        match selection {
            BackendSelection::InMemory => Ok(Self::Local(LocalBackend::new_in_memory())),
            BackendSelection::Rest(config) => Ok(Self::Rest(RestBackend::new(config.clone())?)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "in_memory",
            Self::Rest(_) => "rest",
        }
    }
}

impl UnsubCodeBackend for AdapterBackend {
    fn select_codes(&self) -> Result<Vec<ChallengeCodeRow>, BackendError> {
        match self {
            Self::Local(b) => b.select_codes(),
            Self::Rest(b) => b.select_codes(),
        }
    }
}

impl PushSubscriptionBackend for AdapterBackend {
    fn upsert_subscription(&self, input: PushSubscriptionUpsert) -> Result<(), BackendError> {
        match self {
            Self::Local(b) => b.upsert_subscription(input),
            Self::Rest(b) => b.upsert_subscription(input),
        }
    }

    fn delete_subscription(&self, endpoint: &PushEndpoint) -> Result<bool, BackendError> {
        match self {
            Self::Local(b) => b.delete_subscription(endpoint),
            Self::Rest(b) => b.delete_subscription(endpoint),
        }
    }

    fn update_done_task_ids(
        &self,
        endpoint: &PushEndpoint,
        done_task_ids: Vec<String>,
    ) -> Result<(), BackendError> {
        match self {
            Self::Local(b) => b.update_done_task_ids(endpoint, done_task_ids),
            Self::Rest(b) => b.update_done_task_ids(endpoint, done_task_ids),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub backend: String,
    pub challenge_phase: ChallengePhase,
    pub subscribed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeResponse {
    pub view: ChallengeView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputRequest {
    pub event: AnswerFieldEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<InterceptKind>,
    pub view: ChallengeView,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub outcome: SubmitOutcome,
    pub view: ChallengeView,
    pub toasts: Vec<ToastMessage>,
    pub bell: BellState,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseResponse {
    pub closed: bool,
    pub view: ChallengeView,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerenderRequest {
    pub surface_width_css: Option<u32>,
    pub device_pixel_ratio: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleResponse {
    pub outcome: ToggleOutcome,
    pub bell: BellState,
    pub toasts: Vec<ToastMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<ChallengeResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub refresh: LoadRefresh,
    pub bell: BellState,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoneTasksRequest {
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoneTasksResponse {
    pub synced: bool,
}

/// Code fetch detached from the runtime so the lock is not held across the wait.
pub struct PendingLoad {
    ticket: LoadTicket,
    fetcher: UnsubCodeFetcher,
    backend: Arc<AdapterBackend>,
}

impl PendingLoad {
    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    pub async fn fetch(self) -> FetchedCodes {
        let fetch = self.fetcher.fetch_rows(self.backend).await;
        FetchedCodes {
            ticket: self.ticket,
            fetch,
        }
    }
}

pub struct FetchedCodes {
    ticket: LoadTicket,
    fetch: RemoteCodeFetch,
}

pub enum ToggleStart {
    Done(ToggleResponse),
    /// Disabling: load the challenge, then call `finish_toggle`.
    Challenge(PendingLoad),
}

pub struct AdapterRuntime {
    flow: NotificationFlow<SimulatedPushPlatform, AdapterBackend>,
    rng: StdRng,
    started_at: Instant,
}

impl AdapterRuntime {
    pub fn default_from_env() -> Result<Self, AdapterError> {
        let config = AdapterConfig::from_env()?;
        Self::new(&config)
    }

    pub fn new(config: &AdapterConfig) -> Result<Self, AdapterError> {
        let backend = AdapterBackend::from_selection(&config.backend)?;
        Self::with_parts(config.flow.clone(), backend, StdRng::from_entropy())
    }

    pub fn with_parts(
        flow_config: NotificationFlowConfig,
        backend: AdapterBackend,
        rng: StdRng,
    ) -> Result<Self, AdapterError> {
        info!(backend = backend.kind(), "taskhub adapter runtime starting");
        let platform = SimulatedPushPlatform::new(SIMULATED_PUSH_ENDPOINT_BASE);
        let flow = NotificationFlow::new(flow_config, platform, backend)?;
        Ok(Self {
            flow,
            rng,
            started_at: Instant::now(),
        })
    }

    pub fn flow(&self) -> &NotificationFlow<SimulatedPushPlatform, AdapterBackend> {
        &self.flow
    }

    fn now(&self) -> MonotonicTimeNs {
        MonotonicTimeNs(self.started_at.elapsed().as_nanos() as u64)
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok".to_string(),
            backend: self.flow.code_backend().kind().to_string(),
            challenge_phase: self.flow.challenge().phase(),
            subscribed: self.flow.manager().is_subscribed(),
        }
    }

    pub fn open_challenge(&mut self) -> PendingLoad {
        let ticket = self.flow.open_challenge(self.now());
        self.pending(ticket)
    }

    fn pending(&self, ticket: LoadTicket) -> PendingLoad {
        PendingLoad {
            ticket,
            fetcher: self.flow.fetcher().clone(),
            backend: self.flow.code_backend(),
        }
    }

    pub fn finish_load(&mut self, fetched: FetchedCodes) -> Result<ChallengeResponse, AdapterError> {
        let now = self.now();
        match self
            .flow
            .complete_load(fetched.ticket, fetched.fetch, &mut self.rng, now)?
        {
            LoadOutcome::Ready(size) => {
                debug!(width_px = size.width_px, height_px = size.height_px, "challenge ready");
            }
            LoadOutcome::Stale => {
                debug!(epoch = fetched.ticket.epoch(), "discarded stale challenge load");
            }
        }
        Ok(self.challenge_response())
    }

    pub fn input(&mut self, request: InputRequest) -> Result<InputResponse, AdapterError> {
        let now = self.now();
        let blocked = match self.flow.handle_input(&request.event, now)? {
            EventOutcome::Blocked(kind) => Some(kind),
            EventOutcome::NotReady
            | EventOutcome::Unchanged
            | EventOutcome::Evaluated(_) => None,
        };
        Ok(InputResponse {
            blocked,
            view: self.flow.challenge_view(now),
        })
    }

    pub fn submit(&mut self) -> SubmitResponse {
        let mut toasts: Vec<ToastMessage> = Vec::new();
        let outcome = self.flow.submit(&mut toasts);
        SubmitResponse {
            outcome,
            view: self.flow.challenge_view(self.now()),
            toasts,
            bell: self.flow.bell_state(),
        }
    }

    pub fn close(&mut self) -> CloseResponse {
        let closed = self.flow.close_challenge();
        CloseResponse {
            closed,
            view: self.flow.challenge_view(self.now()),
        }
    }

    pub fn rerender(&mut self, request: RerenderRequest) -> Result<ChallengeResponse, AdapterError> {
        let current = self.flow.challenge().viewport();
        let viewport = match (request.surface_width_css, request.device_pixel_ratio) {
            (None, None) => None,
            (width, dpr) => Some(RenderViewport::new(
                width.unwrap_or(current.container_width_css),
                dpr.unwrap_or(current.device_pixel_ratio),
            )),
        };
        match self.flow.rerender(viewport, &mut self.rng)? {
            Some(_) => Ok(self.challenge_response()),
            None => Err(AdapterError::ChallengeNotOpen),
        }
    }

    pub fn toggle(&mut self) -> ToggleStart {
        let mut toasts: Vec<ToastMessage> = Vec::new();
        let now = self.now();
        match self.flow.toggle(&mut toasts, now, wall_clock_ms()) {
            ToggleFlowOutcome::ChallengeOpened(ticket) => ToggleStart::Challenge(self.pending(ticket)),
            ToggleFlowOutcome::Toggled(outcome) => ToggleStart::Done(ToggleResponse {
                outcome,
                bell: self.flow.bell_state(),
                toasts,
                challenge: None,
            }),
        }
    }

    pub fn finish_toggle(&mut self, fetched: FetchedCodes) -> Result<ToggleResponse, AdapterError> {
        let challenge = self.finish_load(fetched)?;
        Ok(ToggleResponse {
            outcome: ToggleOutcome::ChallengeRequired,
            bell: self.flow.bell_state(),
            toasts: Vec::new(),
            challenge: Some(challenge),
        })
    }

    pub fn bell(&self) -> BellState {
        self.flow.bell_state()
    }

    pub fn refresh(&mut self) -> RefreshResponse {
        let refresh = self.flow.refresh_on_load(wall_clock_ms());
        RefreshResponse {
            refresh,
            bell: self.flow.bell_state(),
        }
    }

    pub fn sync_done_tasks(&mut self, request: DoneTasksRequest) -> DoneTasksResponse {
        DoneTasksResponse {
            synced: self.flow.manager_mut().sync_done_task_ids(request.task_ids),
        }
    }

    /// PNG of the rendered code. Served as a binary body, never embedded in JSON.
    pub fn challenge_png(&self) -> Result<Vec<u8>, AdapterError> {
        if self.flow.challenge().phase() != ChallengePhase::Ready {
            return Err(AdapterError::ChallengeNotOpen);
        }
        self.flow
            .challenge()
            .surface()
            .encode_png()
            .map_err(|err| AdapterError::Render(err.to_string()))
    }

    fn challenge_response(&self) -> ChallengeResponse {
        ChallengeResponse {
            view: self.flow.challenge_view(self.now()),
        }
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use taskhub_kernel_contracts::notify::TOAST_DISABLED;

    const CODE: &str = "Il1|!O0";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn runtime() -> AdapterRuntime {
        let local = LocalBackend::new_in_memory();
        local
            .seed_unsubscribe_codes(vec![ChallengeCodeRow {
                id: "1".to_string(),
                code: CODE.to_string(),
            }])
            .unwrap();
        AdapterRuntime::with_parts(
            NotificationFlowConfig::mvp_v1(DEV_VAPID_PUBLIC_KEY),
            AdapterBackend::Local(local),
            StdRng::seed_from_u64(11),
        )
        .unwrap()
    }

    fn insert(rt: &mut AdapterRuntime, text: &str) {
        for ch in text.chars() {
            rt.input(InputRequest {
                event: AnswerFieldEvent::Insert {
                    text: ch.to_string(),
                    trusted: true,
                },
            })
            .unwrap();
        }
    }

    #[test]
    fn at_adapter_01_config_defaults() {
        let cfg = AdapterConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.backend, BackendSelection::InMemory);
        assert_eq!(cfg.flow.code_fetch.timeout_ms, 4_000);
        assert_eq!(cfg.flow.push.vapid_public_key, DEV_VAPID_PUBLIC_KEY);
    }

    #[test]
    fn at_adapter_02_config_out_of_range_values_fall_back() {
        let cfg = AdapterConfig::from_lookup(lookup(&[
            ("TASKHUB_CODE_FETCH_TIMEOUT_MS", "5"),
            ("TASKHUB_SURFACE_WIDTH", "640"),
            ("TASKHUB_DEVICE_PIXEL_RATIO", "NaN"),
        ]))
        .unwrap();
        assert_eq!(cfg.flow.code_fetch.timeout_ms, 4_000);
        assert_eq!(cfg.flow.challenge.viewport.container_width_css, 640);
        assert_eq!(cfg.flow.challenge.viewport.device_pixel_ratio, 1.0);
    }

    #[test]
    fn at_adapter_03_rest_backend_requires_key() {
        assert!(AdapterConfig::from_lookup(lookup(&[(
            "TASKHUB_BACKEND_URL",
            "https://db.example.co"
        )]))
        .is_err());
        let cfg = AdapterConfig::from_lookup(lookup(&[
            ("TASKHUB_BACKEND_URL", "https://db.example.co"),
            ("TASKHUB_BACKEND_KEY", "anon"),
        ]))
        .unwrap();
        assert!(matches!(cfg.backend, BackendSelection::Rest(_)));
        assert!(AdapterConfig::from_lookup(lookup(&[("TASKHUB_HTTP_BIND", "nowhere")])).is_err());
    }

    #[tokio::test]
    async fn at_adapter_04_toggle_off_runs_challenge_end_to_end() {
        let mut rt = runtime();
        let ToggleStart::Done(enabled) = rt.toggle() else {
            panic!("expected immediate enable");
        };
        assert_eq!(enabled.outcome, ToggleOutcome::Enabled);
        assert!(enabled.bell.active);

        let ToggleStart::Challenge(pending) = rt.toggle() else {
            panic!("expected challenge");
        };
        let fetched = pending.fetch().await;
        let started = rt.finish_toggle(fetched).unwrap();
        let challenge = started.challenge.unwrap();
        assert_eq!(challenge.view.phase, ChallengePhase::Ready);
        assert!(rt.challenge_png().is_ok());
        assert_eq!(challenge.view.expected_len, CODE.chars().count());

        let pasted = rt.input(InputRequest { event: AnswerFieldEvent::Paste }).unwrap();
        assert_eq!(pasted.blocked, Some(InterceptKind::Paste));

        insert(&mut rt, CODE);
        let submitted = rt.submit();
        assert_eq!(submitted.outcome, SubmitOutcome::Unsubscribed);
        assert!(!submitted.bell.active);
        assert_eq!(submitted.toasts.last().unwrap().text, TOAST_DISABLED);

        let json = serde_json::to_string(&submitted).unwrap();
        assert!(!json.contains(CODE));
    }

    #[tokio::test]
    async fn at_adapter_05_closed_before_fetch_returns_no_image() {
        let mut rt = runtime();
        let pending = rt.open_challenge();
        let closed = rt.close();
        assert!(closed.closed);
        let response = rt.finish_load(pending.fetch().await).unwrap();
        assert_eq!(response.view.phase, ChallengePhase::ClosedCancelled);
        assert!(response.view.surface.is_none());
        assert!(matches!(rt.challenge_png(), Err(AdapterError::ChallengeNotOpen)));
    }

    #[tokio::test]
    async fn at_adapter_06_rerender_requires_open_challenge() {
        let mut rt = runtime();
        let request = || RerenderRequest {
            surface_width_css: Some(480),
            device_pixel_ratio: Some(2.0),
        };
        assert!(matches!(rt.rerender(request()), Err(AdapterError::ChallengeNotOpen)));

        let pending = rt.open_challenge();
        rt.finish_load(pending.fetch().await).unwrap();
        let redrawn = rt.rerender(request()).unwrap();
        let surface = redrawn.view.surface.unwrap();
        assert_eq!(surface.width_px, 960);
    }

    #[test]
    fn at_adapter_07_health_and_bell() {
        let rt = runtime();
        let health = rt.health_report();
        assert_eq!(health.backend, "in_memory");
        assert_eq!(health.challenge_phase, ChallengePhase::Closed);
        assert!(!rt.bell().active);
    }

    #[tokio::test]
    async fn at_adapter_08_image_is_png_and_only_while_ready() {
        let mut rt = runtime();
        assert!(matches!(rt.challenge_png(), Err(AdapterError::ChallengeNotOpen)));

        let pending = rt.open_challenge();
        rt.finish_load(pending.fetch().await).unwrap();
        let png = rt.challenge_png().unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);

        rt.close();
        assert!(matches!(rt.challenge_png(), Err(AdapterError::ChallengeNotOpen)));
    }

    #[tokio::test]
    async fn at_adapter_09_json_responses_carry_no_code_fragment() {
        let mut rt = runtime();
        let mut bodies: Vec<String> = Vec::new();

        let ToggleStart::Done(enabled) = rt.toggle() else {
            panic!("expected immediate enable");
        };
        bodies.push(serde_json::to_string(&enabled).unwrap());
        let ToggleStart::Challenge(pending) = rt.toggle() else {
            panic!("expected challenge");
        };
        let started = rt.finish_toggle(pending.fetch().await).unwrap();
        bodies.push(serde_json::to_string(&started).unwrap());
        let redrawn = rt
            .rerender(RerenderRequest {
                surface_width_css: Some(400),
                device_pixel_ratio: Some(3.0),
            })
            .unwrap();
        bodies.push(serde_json::to_string(&redrawn).unwrap());
        bodies.push(serde_json::to_string(&rt.health_report()).unwrap());

        for event in [
            AnswerFieldEvent::Paste,
            AnswerFieldEvent::Insert {
                text: "Ix".to_string(),
                trusted: true,
            },
            AnswerFieldEvent::DeleteBackward,
            AnswerFieldEvent::DeleteBackward,
        ] {
            let response = rt.input(InputRequest { event }).unwrap();
            bodies.push(serde_json::to_string(&response).unwrap());
        }
        bodies.push(serde_json::to_string(&rt.submit()).unwrap());
        bodies.push(serde_json::to_string(&rt.close()).unwrap());

        let chars: Vec<char> = CODE.chars().collect();
        for window in chars.windows(3) {
            let fragment: String = window.iter().collect();
            for body in &bodies {
                assert!(!body.contains(&fragment), "fragment {fragment:?} in {body}");
            }
        }
    }

    #[tokio::test]
    async fn at_adapter_10_oversized_rerender_is_rejected() {
        let mut rt = runtime();
        let pending = rt.open_challenge();
        let ready = rt.finish_load(pending.fetch().await).unwrap();

        let err = rt
            .rerender(RerenderRequest {
                surface_width_css: Some(60_000),
                device_pixel_ratio: Some(4.0),
            })
            .unwrap_err();
        assert!(matches!(err, AdapterError::Contract(_)));
        assert_eq!(
            axum::response::IntoResponse::into_response(err).status(),
            axum::http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            rt.flow().challenge_view(MonotonicTimeNs(0)).surface,
            ready.view.surface
        );
        assert_eq!(rt.flow().challenge().viewport().container_width_css, 320);
    }
}
