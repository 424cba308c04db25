#![forbid(unsafe_code)]

use rand::Rng;
use taskhub_engines::raster_surface::RasterSurface;
use taskhub_engines::unsub_code::CodeSelection;
use taskhub_engines::unsub_glyph::{
    GlyphColor, GlyphRenderConfig, GlyphRenderer, GlyphSurface, RenderViewport,
};
use taskhub_engines::unsub_guard::{
    AnswerField, AnswerFieldEvent, GuardVerdict, InputGuard, InputGuardConfig, InterceptKind,
};
use taskhub_engines::unsub_match::{evaluate, exact_match, hint_for, HINT_CONFIRM_MISMATCH};
use taskhub_kernel_contracts::notify::{ToastSeverity, ToastSink, TOAST_DISABLED};
use taskhub_kernel_contracts::unsub::{
    Challenge, ChallengePhase, ChallengeView, HintKind, InputHint, MatchState, ProgressClass,
    SurfaceSize,
};
use taskhub_kernel_contracts::{ContractViolation, MonotonicTimeNs};
use tracing::{debug, info};

/// The real unsubscribe, invoked only after a verified challenge.
pub trait UnsubscribeAction {
    fn unsubscribe_confirmed(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsubChallengeConfig {
    pub focus_delay_ms: u64,
    pub viewport: RenderViewport,
    pub guard: InputGuardConfig,
    pub glyph: GlyphRenderConfig,
}

impl UnsubChallengeConfig {
    pub fn mvp_v1() -> Self {
        Self {
            focus_delay_ms: 400,
            viewport: RenderViewport::new(320, 1.0),
            guard: InputGuardConfig::mvp_v1(),
            glyph: GlyphRenderConfig::mvp_v1(),
        }
    }
}

/// Issued by `open`; a load completes only against the ticket of the open
/// challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    epoch: u64,
}

impl LoadTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready(SurfaceSize),
    /// The challenge this load belonged to was closed or superseded.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    NotReady,
    Blocked(InterceptKind),
    Unchanged,
    Evaluated(MatchState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    NotReady,
    Mismatch,
    Unsubscribed,
}

/// Owns the secret for one open/close cycle and drives the modal lifecycle.
pub struct UnsubChallengeController<S = RasterSurface>
where
    S: GlyphSurface,
{
    config: UnsubChallengeConfig,
    renderer: GlyphRenderer,
    guard: InputGuard,
    field: AnswerField,
    surface: S,
    phase: ChallengePhase,
    challenge: Option<Challenge>,
    epoch: u64,
    scroll_locked: bool,
    ready_at: Option<MonotonicTimeNs>,
    surface_size: Option<SurfaceSize>,
    last_state: Option<MatchState>,
    hint: InputHint,
}

impl<S> UnsubChallengeController<S>
where
    S: GlyphSurface,
{
    pub fn new(config: UnsubChallengeConfig, surface: S) -> Result<Self, ContractViolation> {
        if config.focus_delay_ms > 5_000 {
            return Err(ContractViolation::InvalidValue {
                field: "unsub_challenge_config.focus_delay_ms",
                reason: "must be within 0..=5000",
            });
        }
        let renderer = GlyphRenderer::new(config.glyph.clone())?;
        renderer.surface_geometry(config.viewport)?;
        let guard = InputGuard::new(config.guard)?;
        Ok(Self {
            config,
            renderer,
            guard,
            field: AnswerField::new(),
            surface,
            phase: ChallengePhase::Closed,
            challenge: None,
            epoch: 0,
            scroll_locked: false,
            ready_at: None,
            surface_size: None,
            last_state: None,
            hint: InputHint::none(),
        })
    }

    pub fn phase(&self) -> ChallengePhase {
        self.phase
    }

    pub fn is_scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn has_secret(&self) -> bool {
        self.challenge.is_some()
    }

    pub fn guard(&self) -> &InputGuard {
        &self.guard
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn viewport(&self) -> RenderViewport {
        self.config.viewport
    }

    /// Starts a fresh challenge. An already-open challenge is discarded first.
    pub fn open(&mut self, now: MonotonicTimeNs) -> LoadTicket {
        if self.phase.is_open() {
            debug!(epoch = self.epoch, "resetting open unsubscribe challenge");
        }
        self.discard();
        self.epoch = self.epoch.wrapping_add(1);
        self.phase = ChallengePhase::Loading;
        self.scroll_locked = true;
        if self.guard.wire() {
            debug!("answer field guard wired");
        }
        info!(epoch = self.epoch, at_ms = now.as_ms(), "unsubscribe challenge opened");
        LoadTicket { epoch: self.epoch }
    }

    /// Installs the fetched code and draws it. Late or superseded loads are
    /// dropped without touching state.
    pub fn complete_load<R>(
        &mut self,
        ticket: LoadTicket,
        selection: CodeSelection,
        rng: &mut R,
        now: MonotonicTimeNs,
    ) -> Result<LoadOutcome, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        if ticket.epoch != self.epoch || self.phase != ChallengePhase::Loading {
            debug!(
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "dropping stale challenge load"
            );
            return Ok(LoadOutcome::Stale);
        }
        let CodeSelection {
            challenge,
            reason_code,
        } = selection;
        let geometry = self.renderer.render(
            challenge.code(),
            self.config.viewport,
            &mut self.surface,
            rng,
        )?;
        info!(
            epoch = self.epoch,
            origin = challenge.origin().as_str(),
            reason_code = format_args!("0x{:08X}", reason_code.0),
            "unsubscribe challenge ready"
        );
        self.challenge = Some(challenge);
        self.phase = ChallengePhase::Ready;
        self.ready_at = Some(now);
        self.surface_size = Some(geometry.size());
        Ok(LoadOutcome::Ready(geometry.size()))
    }

    pub fn handle_event(
        &mut self,
        event: &AnswerFieldEvent,
        now: MonotonicTimeNs,
    ) -> Result<EventOutcome, ContractViolation> {
        if self.phase != ChallengePhase::Ready {
            return Ok(EventOutcome::NotReady);
        }
        if let GuardVerdict::Blocked { kind, .. } = self.guard.inspect(event, now) {
            debug!(kind = ?kind, "blocked answer field event");
            self.hint = InputHint::none();
            return Ok(EventOutcome::Blocked(kind));
        }
        if !self.field.apply(event) {
            return Ok(EventOutcome::Unchanged);
        }
        let Some(challenge) = self.challenge.as_ref() else {
            return Ok(EventOutcome::NotReady);
        };
        let state = evaluate(self.field.value(), challenge.code().expose_secret())?;
        self.guard.clear_warning();
        self.hint = hint_for(&state);
        self.last_state = Some(state);
        Ok(EventOutcome::Evaluated(state))
    }

    /// Confirms against the secret captured at open; the UI gate is not trusted.
    pub fn submit<U, T>(&mut self, action: &mut U, toasts: &mut T) -> SubmitOutcome
    where
        U: UnsubscribeAction + ?Sized,
        T: ToastSink + ?Sized,
    {
        if self.phase != ChallengePhase::Ready {
            return SubmitOutcome::NotReady;
        }
        self.phase = ChallengePhase::Verifying;
        let verified = self
            .challenge
            .as_ref()
            .map(|c| exact_match(self.field.value(), c.code().expose_secret()))
            .unwrap_or(false);

        if !verified {
            self.phase = ChallengePhase::Ready;
            self.guard.clear_warning();
            self.hint = InputHint::new(HintKind::Error, HINT_CONFIRM_MISMATCH);
            debug!(epoch = self.epoch, "unsubscribe challenge confirm mismatch");
            return SubmitOutcome::Mismatch;
        }

        self.discard();
        self.phase = ChallengePhase::ClosedSuccess;
        info!(epoch = self.epoch, "unsubscribe challenge passed");
        action.unsubscribe_confirmed();
        toasts.show_message(TOAST_DISABLED, ToastSeverity::Info);
        SubmitOutcome::Unsubscribed
    }

    /// Dismissal. Returns false when nothing was open.
    pub fn close(&mut self) -> bool {
        if !self.phase.is_open() {
            return false;
        }
        self.discard();
        self.epoch = self.epoch.wrapping_add(1);
        self.phase = ChallengePhase::ClosedCancelled;
        info!("unsubscribe challenge dismissed");
        true
    }

    /// Redraws the same code with fresh randomness, e.g. after resize or a
    /// theme change.
    pub fn rerender<R>(
        &mut self,
        viewport: Option<RenderViewport>,
        rng: &mut R,
    ) -> Result<Option<SurfaceSize>, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        if let Some(viewport) = viewport {
            self.renderer.surface_geometry(viewport)?;
            self.config.viewport = viewport;
        }
        let Some(challenge) = self.challenge.as_ref() else {
            return Ok(None);
        };
        if self.phase != ChallengePhase::Ready {
            return Ok(None);
        }
        let geometry = self.renderer.render(
            challenge.code(),
            self.config.viewport,
            &mut self.surface,
            rng,
        )?;
        self.surface_size = Some(geometry.size());
        Ok(Some(geometry.size()))
    }

    pub fn view(&self, now: MonotonicTimeNs) -> ChallengeView {
        let ready = self.phase == ChallengePhase::Ready;
        let state = if ready { self.last_state.as_ref() } else { None };
        let hint = if self.phase.is_open() {
            self.guard.warning(now).unwrap_or_else(|| self.hint.clone())
        } else {
            InputHint::none()
        };
        let input_focused = match self.ready_at {
            Some(at) if ready => now >= at.plus_ms(self.config.focus_delay_ms),
            _ => false,
        };
        ChallengeView {
            phase: self.phase,
            status: state.map(|s| s.status),
            percent: state.map(|s| s.percent).unwrap_or(0),
            progress: state
                .map(MatchState::progress_class)
                .unwrap_or(ProgressClass::None),
            typed_len: if ready { self.field.char_len() } else { 0 },
            expected_len: self
                .challenge
                .as_ref()
                .filter(|_| ready)
                .map(|c| c.code().char_len())
                .unwrap_or(0),
            confirm_enabled: ready && state.map(MatchState::confirm_enabled).unwrap_or(false),
            hint,
            scroll_locked: self.scroll_locked,
            input_focused,
            surface: if self.phase.is_open() {
                self.surface_size
            } else {
                None
            },
        }
    }

    fn discard(&mut self) {
        if let Some(mut challenge) = self.challenge.take() {
            challenge.clear();
        }
        self.field.clear();
        self.guard.clear_warning();
        self.hint = InputHint::none();
        self.last_state = None;
        self.ready_at = None;
        self.surface_size = None;
        self.scroll_locked = false;
        self.surface.resize(1, 1);
        self.surface.fill(GlyphColor::rgb(0, 0, 0).with_alpha(0));
    }
}
