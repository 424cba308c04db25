#![forbid(unsafe_code)]

use rand::Rng;
use taskhub_kernel_contracts::backend::{BackendError, ChallengeCodeRow};
use taskhub_kernel_contracts::unsub::{
    Challenge, ChallengeCode, ChallengeOrigin, ChallengeSourceId,
};
use taskhub_kernel_contracts::{ContractViolation, ReasonCodeId};

pub mod reason_codes {
    use taskhub_kernel_contracts::ReasonCodeId;

    // Unsubscribe code source reason-code namespace.
    pub const UNSUB_CODE_OK_REMOTE: ReasonCodeId = ReasonCodeId(0x5543_0001);
    pub const UNSUB_CODE_FALLBACK_REMOTE_ERROR: ReasonCodeId = ReasonCodeId(0x5543_00F1);
    pub const UNSUB_CODE_FALLBACK_REMOTE_EMPTY: ReasonCodeId = ReasonCodeId(0x5543_00F2);
    pub const UNSUB_CODE_FALLBACK_NO_VALID_ROWS: ReasonCodeId = ReasonCodeId(0x5543_00F3);
    pub const UNSUB_CODE_FALLBACK_TIMEOUT: ReasonCodeId = ReasonCodeId(0x5543_00F4);
}

/// Local pool used whenever the remote store cannot supply a usable code.
pub const LOCAL_FALLBACK_CODES: &[&str] = &[
    "Il1|!O0lI|1!Il0O",
    "1lI|O!0IlI|1!l0O",
    "I|1!lO0Il|1I!0lO",
    "0OIl|1!lI|O0!Il1",
    "l1I|!0OIl1|!I0Ol",
    "Il!|10OIl|!1I0lO",
    "|I1lO!0l|I1!Ol0I",
    "1|Il!O0lI|1!0OlI",
    "O0Il|1!IlO|0!1Il",
    "lI|0O!1Il|!0OI1l",
    "I1|lO!0Il1|I!O0l",
    "0l|I1!OIl0|1!lIO",
    "Il0|!1OlI|0!I1lO",
    "1IO|l!0IlO|1!I0l",
    "l|I0!1OlI|!0l1IO",
    "0I|1lO!Il|0I!1lO",
    "Il1O|!0lI1|!IO0l",
    "I0l|1!OIl|0!1IOl",
    "1lO|I!0lI|1O!I0l",
    "O|Il1!0lI|O!1Il0",
    "l1|IO!0Il|1!O0lI",
    "I|0lO!1Il|0!IO1l",
    "0Il|1O!lI|0!1lIO",
];

/// Outcome of the remote `select code, id` read, as observed by the caller.
#[derive(Debug)]
pub enum RemoteCodeFetch {
    Rows(Vec<ChallengeCodeRow>),
    Failed(BackendError),
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubCodeSourceConfig {
    pub max_remote_rows: usize,
}

impl UnsubCodeSourceConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_remote_rows: 1_000,
        }
    }
}

#[derive(Debug)]
pub struct CodeSelection {
    pub challenge: Challenge,
    pub reason_code: ReasonCodeId,
}

#[derive(Debug, Clone)]
pub struct UnsubCodeSourceRuntime {
    config: UnsubCodeSourceConfig,
}

impl UnsubCodeSourceRuntime {
    pub fn new(config: UnsubCodeSourceConfig) -> Result<Self, ContractViolation> {
        if config.max_remote_rows == 0 || config.max_remote_rows > 100_000 {
            return Err(ContractViolation::InvalidValue {
                field: "unsub_code_source_config.max_remote_rows",
                reason: "must be within 1..=100000",
            });
        }
        Ok(Self { config })
    }

    /// Picks one code uniformly at random. Every unusable remote outcome
    /// resolves to a draw from the local pool.
    pub fn select<R>(
        &self,
        fetch: RemoteCodeFetch,
        rng: &mut R,
    ) -> Result<CodeSelection, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        let rows = match fetch {
            RemoteCodeFetch::Rows(rows) => rows,
            RemoteCodeFetch::Failed(_) => {
                return self.fallback(reason_codes::UNSUB_CODE_FALLBACK_REMOTE_ERROR, rng)
            }
            RemoteCodeFetch::TimedOut => {
                return self.fallback(reason_codes::UNSUB_CODE_FALLBACK_TIMEOUT, rng)
            }
        };
        if rows.is_empty() {
            return self.fallback(reason_codes::UNSUB_CODE_FALLBACK_REMOTE_EMPTY, rng);
        }

        let mut candidates: Vec<(ChallengeSourceId, ChallengeCode)> = rows
            .into_iter()
            .take(self.config.max_remote_rows)
            .filter_map(|row| {
                let ChallengeCodeRow { id, code } = row;
                let code = ChallengeCode::new(code).ok()?;
                let id = ChallengeSourceId::new(id).ok()?;
                Some((id, code))
            })
            .collect();
        if candidates.is_empty() {
            return self.fallback(reason_codes::UNSUB_CODE_FALLBACK_NO_VALID_ROWS, rng);
        }

        let pick = rng.gen_range(0..candidates.len());
        let (id, code) = candidates.swap_remove(pick);
        match Challenge::v1(code, Some(id), ChallengeOrigin::Remote) {
            Ok(challenge) => Ok(CodeSelection {
                challenge,
                reason_code: reason_codes::UNSUB_CODE_OK_REMOTE,
            }),
            Err(_) => self.fallback(reason_codes::UNSUB_CODE_FALLBACK_NO_VALID_ROWS, rng),
        }
    }

    pub fn fallback<R>(
        &self,
        reason_code: ReasonCodeId,
        rng: &mut R,
    ) -> Result<CodeSelection, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        let raw = LOCAL_FALLBACK_CODES[rng.gen_range(0..LOCAL_FALLBACK_CODES.len())];
        let code = ChallengeCode::new(raw)?;
        let challenge = Challenge::v1(code, None, ChallengeOrigin::LocalFallback)?;
        Ok(CodeSelection {
            challenge,
            reason_code,
        })
    }
}
