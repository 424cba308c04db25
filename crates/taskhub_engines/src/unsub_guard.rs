#![forbid(unsafe_code)]

use taskhub_kernel_contracts::unsub::{HintKind, InputHint};
use taskhub_kernel_contracts::{ContractViolation, MonotonicTimeNs};
use zeroize::Zeroize;

pub const GUARD_WARNING_TEXT: &str = "⚠ Copy-paste is disabled. Type it manually.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputGuardConfig {
    pub warning_ms: u64,
}

impl InputGuardConfig {
    pub fn mvp_v1() -> Self {
        Self { warning_ms: 2_000 }
    }
}

/// Events delivered to the answer field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerFieldEvent {
    Paste,
    Copy,
    Cut,
    Drop,
    ContextMenu,
    KeyDown {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        meta: bool,
    },
    /// Text inserted at the caret; `trusted` is false for script-originated input.
    Insert { text: String, trusted: bool },
    DeleteBackward,
    /// Whole-value replacement (autofill, scripted assignment).
    Replace { value: String, trusted: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptKind {
    Paste,
    Copy,
    Cut,
    Drop,
    ContextMenu,
    PasteShortcut,
    UntrustedInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Allowed,
    Blocked {
        kind: InterceptKind,
        prevent_default: bool,
        stop_propagation: bool,
    },
}

impl GuardVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Interception layer attached to exactly one answer field.
#[derive(Debug, Clone)]
pub struct InputGuard {
    config: InputGuardConfig,
    wired: bool,
    warning_until: Option<MonotonicTimeNs>,
    blocked_total: u64,
}

impl InputGuard {
    pub fn new(config: InputGuardConfig) -> Result<Self, ContractViolation> {
        if config.warning_ms == 0 || config.warning_ms > 30_000 {
            return Err(ContractViolation::InvalidValue {
                field: "input_guard_config.warning_ms",
                reason: "must be within 1..=30000",
            });
        }
        Ok(Self {
            config,
            wired: false,
            warning_until: None,
            blocked_total: 0,
        })
    }

    /// Attaches the handlers. Returns false when they were already attached.
    pub fn wire(&mut self) -> bool {
        if self.wired {
            return false;
        }
        self.wired = true;
        true
    }

    pub fn is_wired(&self) -> bool {
        self.wired
    }

    pub fn blocked_total(&self) -> u64 {
        self.blocked_total
    }

    pub fn inspect(&mut self, event: &AnswerFieldEvent, now: MonotonicTimeNs) -> GuardVerdict {
        if !self.wired {
            return GuardVerdict::Allowed;
        }
        let Some(kind) = classify(event) else {
            return GuardVerdict::Allowed;
        };
        self.blocked_total = self.blocked_total.saturating_add(1);
        self.warning_until = Some(now.plus_ms(self.config.warning_ms));
        GuardVerdict::Blocked {
            kind,
            prevent_default: true,
            stop_propagation: true,
        }
    }

    pub fn warning(&self, now: MonotonicTimeNs) -> Option<InputHint> {
        match self.warning_until {
            Some(until) if now < until => Some(InputHint::new(HintKind::Warn, GUARD_WARNING_TEXT)),
            _ => None,
        }
    }

    pub fn clear_warning(&mut self) {
        self.warning_until = None;
    }
}

fn classify(event: &AnswerFieldEvent) -> Option<InterceptKind> {
    match event {
        AnswerFieldEvent::Paste => Some(InterceptKind::Paste),
        AnswerFieldEvent::Copy => Some(InterceptKind::Copy),
        AnswerFieldEvent::Cut => Some(InterceptKind::Cut),
        AnswerFieldEvent::Drop => Some(InterceptKind::Drop),
        AnswerFieldEvent::ContextMenu => Some(InterceptKind::ContextMenu),
        AnswerFieldEvent::KeyDown { key, ctrl, meta } => {
            if (*ctrl || *meta) && key.eq_ignore_ascii_case("v") {
                Some(InterceptKind::PasteShortcut)
            } else {
                None
            }
        }
        AnswerFieldEvent::Insert { trusted, .. } | AnswerFieldEvent::Replace { trusted, .. } => {
            if *trusted {
                None
            } else {
                Some(InterceptKind::UntrustedInput)
            }
        }
        AnswerFieldEvent::DeleteBackward => None,
    }
}

/// Current value of the answer input. Wiped on clear and drop.
#[derive(Default)]
pub struct AnswerField {
    value: String,
}

impl AnswerField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    /// Applies an event the guard allowed. Returns true when the value changed.
    pub fn apply(&mut self, event: &AnswerFieldEvent) -> bool {
        match event {
            AnswerFieldEvent::Insert { text, .. } => {
                let filtered: String = text.chars().filter(|c| !c.is_control()).collect();
                if filtered.is_empty() {
                    return false;
                }
                self.value.push_str(&filtered);
                true
            }
            AnswerFieldEvent::DeleteBackward => self.value.pop().is_some(),
            AnswerFieldEvent::Replace { value, .. } => {
                if self.value == *value {
                    return false;
                }
                self.value.zeroize();
                self.value.push_str(value);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.value.zeroize();
    }
}

impl std::fmt::Debug for AnswerField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerField")
            .field("len", &self.char_len())
            .finish()
    }
}

impl Drop for AnswerField {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}
