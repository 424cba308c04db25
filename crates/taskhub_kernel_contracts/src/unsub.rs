#![forbid(unsafe_code)]

use std::fmt;

use zeroize::Zeroize;

use crate::common::validate_text;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const UNSUB_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Glyphs that are near-identical in most UI fonts.
pub const CONFUSABLE_ALPHABET: &[char] = &['I', 'l', '1', '|', '!', 'i', 'O', '0', 'o'];
pub const CHALLENGE_CODE_MIN_CHARS: usize = 4;
pub const CHALLENGE_CODE_MAX_CHARS: usize = 64;
pub const CHALLENGE_SOURCE_ID_MAX_LEN: usize = 128;

pub fn is_confusable_char(ch: char) -> bool {
    CONFUSABLE_ALPHABET.contains(&ch)
}

/// The secret a user must transcribe.
///
/// No `Clone`, `Display` or `Serialize`: the only way to read the value is
/// `expose_secret`, and the buffer is wiped when the code is dropped or cleared.
pub struct ChallengeCode(String);

impl ChallengeCode {
    pub fn new(code: impl Into<String>) -> Result<Self, ContractViolation> {
        let mut code = code.into();
        if let Err(violation) = validate_code_chars(&code) {
            code.zeroize();
            return Err(violation);
        }
        Ok(Self(code))
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_cleared(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for ChallengeCode {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for ChallengeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChallengeCode(<redacted>)")
    }
}

impl Validate for ChallengeCode {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_code_chars(&self.0)
    }
}

fn validate_code_chars(code: &str) -> Result<(), ContractViolation> {
    let len = code.chars().count();
    if !(CHALLENGE_CODE_MIN_CHARS..=CHALLENGE_CODE_MAX_CHARS).contains(&len) {
        return Err(ContractViolation::InvalidValue {
            field: "challenge.code",
            reason: "must be 4..=64 chars",
        });
    }
    if !code.chars().all(is_confusable_char) {
        return Err(ContractViolation::InvalidValue {
            field: "challenge.code",
            reason: "must only use the confusable alphabet",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChallengeSourceId(String);

impl ChallengeSourceId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        validate_text("challenge.source_id", &id, CHALLENGE_SOURCE_ID_MAX_LEN)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeOrigin {
    Remote,
    LocalFallback,
}

impl ChallengeOrigin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::LocalFallback => "local_fallback",
        }
    }
}

#[derive(Debug)]
pub struct Challenge {
    pub schema_version: SchemaVersion,
    code: ChallengeCode,
    source_id: Option<ChallengeSourceId>,
    origin: ChallengeOrigin,
}

impl Challenge {
    pub fn v1(
        code: ChallengeCode,
        source_id: Option<ChallengeSourceId>,
        origin: ChallengeOrigin,
    ) -> Result<Self, ContractViolation> {
        let challenge = Self {
            schema_version: UNSUB_CONTRACT_VERSION,
            code,
            source_id,
            origin,
        };
        challenge.validate()?;
        Ok(challenge)
    }

    pub fn code(&self) -> &ChallengeCode {
        &self.code
    }

    pub fn source_id(&self) -> Option<&ChallengeSourceId> {
        self.source_id.as_ref()
    }

    pub fn origin(&self) -> ChallengeOrigin {
        self.origin
    }

    pub fn clear(&mut self) {
        self.code.clear();
    }
}

impl Validate for Challenge {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.code.validate()?;
        match (self.origin, &self.source_id) {
            (ChallengeOrigin::LocalFallback, Some(_)) => Err(ContractViolation::InvalidValue {
                field: "challenge.source_id",
                reason: "must be None for local fallback codes",
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Empty,
    PartialMatch,
    PartialMismatch,
    FullMatch,
}

impl MatchStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::PartialMatch => "partial-match",
            Self::PartialMismatch => "partial-mismatch",
            Self::FullMatch => "full-match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressClass {
    None,
    Partial,
    Done,
}

/// Derived per keystroke; carries lengths only, never characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchState {
    pub matched_prefix_len: usize,
    pub typed_len: usize,
    pub expected_len: usize,
    pub percent: u8,
    pub status: MatchStatus,
}

impl MatchState {
    pub fn v1(
        matched_prefix_len: usize,
        typed_len: usize,
        expected_len: usize,
        percent: u8,
        status: MatchStatus,
    ) -> Result<Self, ContractViolation> {
        let state = Self {
            matched_prefix_len,
            typed_len,
            expected_len,
            percent,
            status,
        };
        state.validate()?;
        Ok(state)
    }

    pub fn confirm_enabled(&self) -> bool {
        self.status == MatchStatus::FullMatch
    }

    pub fn progress_class(&self) -> ProgressClass {
        match self.percent {
            0 => ProgressClass::None,
            100 => ProgressClass::Done,
            _ => ProgressClass::Partial,
        }
    }
}

impl Validate for MatchState {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.expected_len == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "match_state.expected_len",
                reason: "must be > 0",
            });
        }
        if self.matched_prefix_len > self.typed_len
            || self.matched_prefix_len > self.expected_len
        {
            return Err(ContractViolation::InvalidValue {
                field: "match_state.matched_prefix_len",
                reason: "must be <= typed_len and expected_len",
            });
        }
        if self.percent > 100 {
            return Err(ContractViolation::InvalidRange {
                field: "match_state.percent",
                min: 0.0,
                max: 100.0,
                got: f64::from(self.percent),
            });
        }
        let consistent = match self.status {
            MatchStatus::Empty => self.typed_len == 0,
            MatchStatus::FullMatch => {
                self.matched_prefix_len == self.expected_len
                    && self.typed_len == self.expected_len
            }
            MatchStatus::PartialMatch => {
                self.typed_len > 0
                    && self.matched_prefix_len == self.typed_len
                    && self.typed_len < self.expected_len
            }
            MatchStatus::PartialMismatch => {
                self.typed_len > 0 && self.matched_prefix_len < self.typed_len
            }
        };
        if !consistent {
            return Err(ContractViolation::InvalidValue {
                field: "match_state.status",
                reason: "inconsistent with prefix/typed/expected lengths",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengePhase {
    Closed,
    Loading,
    Ready,
    Verifying,
    ClosedSuccess,
    ClosedCancelled,
}

impl ChallengePhase {
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Loading | Self::Ready | Self::Verifying)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    None,
    Partial,
    Valid,
    Error,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputHint {
    pub kind: HintKind,
    pub text: String,
}

impl InputHint {
    pub fn none() -> Self {
        Self {
            kind: HintKind::None,
            text: String::new(),
        }
    }

    pub fn new(kind: HintKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceSize {
    pub width_px: u32,
    pub height_px: u32,
}

/// UI-facing snapshot of an unsubscribe challenge.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChallengeView {
    pub phase: ChallengePhase,
    pub status: Option<MatchStatus>,
    pub percent: u8,
    pub progress: ProgressClass,
    pub typed_len: usize,
    pub expected_len: usize,
    pub confirm_enabled: bool,
    pub hint: InputHint,
    pub scroll_locked: bool,
    pub input_focused: bool,
    pub surface: Option<SurfaceSize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_unsub_contract_01_code_rejects_chars_outside_alphabet() {
        assert!(ChallengeCode::new("Il1|!O0").is_ok());
        assert!(ChallengeCode::new("Il1x").is_err());
        assert!(ChallengeCode::new("Il1").is_err());
        assert!(ChallengeCode::new("I".repeat(65)).is_err());
    }

    #[test]
    fn at_unsub_contract_02_code_debug_is_redacted() {
        let code = ChallengeCode::new("Il1|!O0").unwrap();
        let rendered = format!("{code:?}");
        assert!(!rendered.contains("Il1"));
        let challenge = Challenge::v1(code, None, ChallengeOrigin::LocalFallback).unwrap();
        assert!(!format!("{challenge:?}").contains("|!O"));
    }

    #[test]
    fn at_unsub_contract_03_clear_wipes_secret() {
        let mut code = ChallengeCode::new("Il1|!O0").unwrap();
        code.clear();
        assert!(code.is_cleared());
        assert_eq!(code.expose_secret(), "");
    }

    #[test]
    fn at_unsub_contract_04_fallback_challenge_has_no_source_id() {
        let code = ChallengeCode::new("Il1|!O0").unwrap();
        let id = ChallengeSourceId::new("7").unwrap();
        assert!(Challenge::v1(code, Some(id), ChallengeOrigin::LocalFallback).is_err());
    }

    #[test]
    fn at_unsub_contract_05_match_state_consistency_is_enforced() {
        assert!(MatchState::v1(3, 3, 7, 43, MatchStatus::PartialMatch).is_ok());
        assert!(MatchState::v1(1, 2, 7, 14, MatchStatus::PartialMismatch).is_ok());
        assert!(MatchState::v1(7, 7, 7, 100, MatchStatus::FullMatch).is_ok());
        assert!(MatchState::v1(0, 0, 7, 0, MatchStatus::Empty).is_ok());
        assert!(MatchState::v1(2, 3, 7, 29, MatchStatus::PartialMatch).is_err());
        assert!(MatchState::v1(7, 8, 7, 100, MatchStatus::FullMatch).is_err());
        assert!(MatchState::v1(0, 0, 0, 0, MatchStatus::Empty).is_err());
    }

    #[test]
    fn at_unsub_contract_06_progress_class_tracks_percent() {
        let none = MatchState::v1(0, 1, 7, 0, MatchStatus::PartialMismatch).unwrap();
        let partial = MatchState::v1(3, 3, 7, 43, MatchStatus::PartialMatch).unwrap();
        let done = MatchState::v1(7, 7, 7, 100, MatchStatus::FullMatch).unwrap();
        assert_eq!(none.progress_class(), ProgressClass::None);
        assert_eq!(partial.progress_class(), ProgressClass::Partial);
        assert_eq!(done.progress_class(), ProgressClass::Done);
        assert!(done.confirm_enabled());
        assert!(!partial.confirm_enabled());
    }
}
