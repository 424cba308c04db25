#![forbid(unsafe_code)]

use std::sync::Arc;

use rand::Rng;
use taskhub_engines::raster_surface::RasterSurface;
use taskhub_engines::unsub_code::RemoteCodeFetch;
use taskhub_engines::unsub_glyph::RenderViewport;
use taskhub_engines::unsub_guard::AnswerFieldEvent;
use taskhub_kernel_contracts::notify::{BellState, ToastSink};
use taskhub_kernel_contracts::unsub::{ChallengeView, SurfaceSize};
use taskhub_kernel_contracts::{ContractViolation, MonotonicTimeNs};

use crate::backend::{PushSubscriptionBackend, UnsubCodeBackend};
use crate::push_manager::{LoadRefresh, PushManagerConfig, PushSubscriptionManager, ToggleOutcome};
use crate::push_platform::PushPlatform;
use crate::unsub_challenge::{
    EventOutcome, LoadOutcome, LoadTicket, SubmitOutcome, UnsubChallengeConfig,
    UnsubChallengeController,
};
use crate::unsub_code_fetch::{CodeFetchConfig, UnsubCodeFetcher};

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationFlowConfig {
    pub push: PushManagerConfig,
    pub challenge: UnsubChallengeConfig,
    pub code_fetch: CodeFetchConfig,
}

impl NotificationFlowConfig {
    pub fn mvp_v1(vapid_public_key: impl Into<String>) -> Self {
        Self {
            push: PushManagerConfig::mvp_v1(vapid_public_key),
            challenge: UnsubChallengeConfig::mvp_v1(),
            code_fetch: CodeFetchConfig::mvp_v1(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleFlowOutcome {
    Toggled(ToggleOutcome),
    /// Disabling was requested; the caller now loads the challenge for this ticket.
    ChallengeOpened(LoadTicket),
}

/// Bell toggle wired to the unsubscribe challenge: the only user path to
/// disabling notifications.
pub struct NotificationFlow<P, B>
where
    P: PushPlatform,
    B: UnsubCodeBackend + PushSubscriptionBackend + Clone + Send + Sync + 'static,
{
    manager: PushSubscriptionManager<P, B>,
    challenge: UnsubChallengeController<RasterSurface>,
    fetcher: UnsubCodeFetcher,
    backend: Arc<B>,
}

impl<P, B> NotificationFlow<P, B>
where
    P: PushPlatform,
    B: UnsubCodeBackend + PushSubscriptionBackend + Clone + Send + Sync + 'static,
{
    pub fn new(config: NotificationFlowConfig, platform: P, backend: B) -> Result<Self, ContractViolation> {
        let manager = PushSubscriptionManager::new(config.push, platform, backend.clone())?;
        let challenge = UnsubChallengeController::new(config.challenge, RasterSurface::new())?;
        let fetcher = UnsubCodeFetcher::new(config.code_fetch)?;
        Ok(Self {
            manager,
            challenge,
            fetcher,
            backend: Arc::new(backend),
        })
    }

    pub fn manager(&self) -> &PushSubscriptionManager<P, B> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut PushSubscriptionManager<P, B> {
        &mut self.manager
    }

    pub fn challenge(&self) -> &UnsubChallengeController<RasterSurface> {
        &self.challenge
    }

    pub fn fetcher(&self) -> &UnsubCodeFetcher {
        &self.fetcher
    }

    pub fn code_backend(&self) -> Arc<B> {
        self.backend.clone()
    }

    pub fn toggle<T>(&mut self, toasts: &mut T, now: MonotonicTimeNs, updated_at_ms: u64) -> ToggleFlowOutcome
    where
        T: ToastSink + ?Sized,
    {
        match self.manager.toggle(toasts, updated_at_ms) {
            ToggleOutcome::ChallengeRequired => {
                ToggleFlowOutcome::ChallengeOpened(self.challenge.open(now))
            }
            other => ToggleFlowOutcome::Toggled(other),
        }
    }

    pub fn open_challenge(&mut self, now: MonotonicTimeNs) -> LoadTicket {
        self.challenge.open(now)
    }

    pub fn complete_load<R>(
        &mut self,
        ticket: LoadTicket,
        fetch: RemoteCodeFetch,
        rng: &mut R,
        now: MonotonicTimeNs,
    ) -> Result<LoadOutcome, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        let selection = self.fetcher.select(fetch, rng)?;
        self.challenge.complete_load(ticket, selection, rng, now)
    }

    /// Fetch and install in one step, for callers that own the flow outright.
    pub async fn load_challenge<R>(
        &mut self,
        ticket: LoadTicket,
        rng: &mut R,
        now: MonotonicTimeNs,
    ) -> Result<LoadOutcome, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        let fetch = self.fetcher.fetch_rows(self.backend.clone()).await;
        self.complete_load(ticket, fetch, rng, now)
    }

    pub fn handle_input(
        &mut self,
        event: &AnswerFieldEvent,
        now: MonotonicTimeNs,
    ) -> Result<EventOutcome, ContractViolation> {
        self.challenge.handle_event(event, now)
    }

    pub fn submit<T>(&mut self, toasts: &mut T) -> SubmitOutcome
    where
        T: ToastSink + ?Sized,
    {
        self.challenge.submit(&mut self.manager, toasts)
    }

    pub fn close_challenge(&mut self) -> bool {
        self.challenge.close()
    }

    pub fn rerender<R>(
        &mut self,
        viewport: Option<RenderViewport>,
        rng: &mut R,
    ) -> Result<Option<SurfaceSize>, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        self.challenge.rerender(viewport, rng)
    }

    pub fn challenge_view(&self, now: MonotonicTimeNs) -> ChallengeView {
        self.challenge.view(now)
    }

    pub fn refresh_on_load(&mut self, updated_at_ms: u64) -> LoadRefresh {
        self.manager.refresh_on_load(updated_at_ms)
    }

    pub fn bell_state(&self) -> BellState {
        self.manager.bell_state()
    }
}
