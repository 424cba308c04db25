#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use taskhub_engines::unsub_code::{
    CodeSelection, RemoteCodeFetch, UnsubCodeSourceConfig, UnsubCodeSourceRuntime,
};
use taskhub_kernel_contracts::backend::BackendError;
use taskhub_kernel_contracts::ContractViolation;
use tracing::warn;

use crate::backend::UnsubCodeBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFetchConfig {
    pub timeout_ms: u64,
    pub source: UnsubCodeSourceConfig,
}

impl CodeFetchConfig {
    pub fn mvp_v1() -> Self {
        Self {
            timeout_ms: 4_000,
            source: UnsubCodeSourceConfig::mvp_v1(),
        }
    }
}

/// Fetches candidate codes off the async runtime and bounds the wait so a
/// challenge never hangs in `Loading`.
#[derive(Debug, Clone)]
pub struct UnsubCodeFetcher {
    timeout: Duration,
    source: UnsubCodeSourceRuntime,
}

impl UnsubCodeFetcher {
    pub fn new(config: CodeFetchConfig) -> Result<Self, ContractViolation> {
        if !(100..=60_000).contains(&config.timeout_ms) {
            return Err(ContractViolation::InvalidValue {
                field: "code_fetch_config.timeout_ms",
                reason: "must be within 100..=60000",
            });
        }
        Ok(Self {
            timeout: Duration::from_millis(config.timeout_ms),
            source: UnsubCodeSourceRuntime::new(config.source)?,
        })
    }

    pub async fn fetch_rows<B>(&self, backend: Arc<B>) -> RemoteCodeFetch
    where
        B: UnsubCodeBackend + Send + Sync + 'static + ?Sized,
    {
        let task = tokio::task::spawn_blocking(move || backend.select_codes());
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(rows))) => RemoteCodeFetch::Rows(rows),
            Ok(Ok(Err(err))) => {
                warn!(error = %err, "challenge code fetch failed");
                RemoteCodeFetch::Failed(err)
            }
            Ok(Err(_)) => {
                warn!("challenge code fetch task aborted");
                RemoteCodeFetch::Failed(BackendError::Transport { kind: "task_aborted" })
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "challenge code fetch timed out");
                RemoteCodeFetch::TimedOut
            }
        }
    }

    pub fn select<R>(
        &self,
        fetch: RemoteCodeFetch,
        rng: &mut R,
    ) -> Result<CodeSelection, ContractViolation>
    where
        R: Rng + ?Sized,
    {
        self.source.select(fetch, rng)
    }

    /// Remote draw with fallback. Only a broken local pool can make this fail.
    pub async fn fetch_challenge<B, R>(
        &self,
        backend: Arc<B>,
        rng: &mut R,
    ) -> Result<CodeSelection, ContractViolation>
    where
        B: UnsubCodeBackend + Send + Sync + 'static + ?Sized,
        R: Rng + ?Sized,
    {
        let fetch = self.fetch_rows(backend).await;
        self.select(fetch, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use taskhub_engines::unsub_code::{reason_codes, LOCAL_FALLBACK_CODES};
    use taskhub_kernel_contracts::backend::ChallengeCodeRow;
    use taskhub_kernel_contracts::unsub::ChallengeOrigin;

    struct SlowBackend {
        delay: Duration,
    }

    impl UnsubCodeBackend for SlowBackend {
        fn select_codes(&self) -> Result<Vec<ChallengeCodeRow>, BackendError> {
            std::thread::sleep(self.delay);
            Ok(vec![ChallengeCodeRow {
                id: "1".to_string(),
                code: "Il1|!O0".to_string(),
            }])
        }
    }

    struct DownBackend;

    impl UnsubCodeBackend for DownBackend {
        fn select_codes(&self) -> Result<Vec<ChallengeCodeRow>, BackendError> {
            Err(BackendError::Transport { kind: "connect" })
        }
    }

    fn fetcher(timeout_ms: u64) -> UnsubCodeFetcher {
        UnsubCodeFetcher::new(CodeFetchConfig {
            timeout_ms,
            source: UnsubCodeSourceConfig::mvp_v1(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn at_code_fetch_01_remote_rows_are_used() {
        let backend = LocalBackend::new_in_memory();
        backend
            .seed_unsubscribe_codes(vec![ChallengeCodeRow {
                id: "42".to_string(),
                code: "O0o!iIl1".to_string(),
            }])
            .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let sel = fetcher(1_000)
            .fetch_challenge(Arc::new(backend), &mut rng)
            .await
            .unwrap();
        assert_eq!(sel.challenge.origin(), ChallengeOrigin::Remote);
        assert_eq!(sel.challenge.source_id().unwrap().as_str(), "42");
    }

    #[tokio::test]
    async fn at_code_fetch_02_backend_error_falls_back() {
        let mut rng = StdRng::seed_from_u64(2);
        let sel = fetcher(1_000)
            .fetch_challenge(Arc::new(DownBackend), &mut rng)
            .await
            .unwrap();
        assert_eq!(sel.reason_code, reason_codes::UNSUB_CODE_FALLBACK_REMOTE_ERROR);
        assert!(LOCAL_FALLBACK_CODES.contains(&sel.challenge.code().expose_secret()));
    }

    #[tokio::test]
    async fn at_code_fetch_03_slow_backend_times_out_to_fallback() {
        let mut rng = StdRng::seed_from_u64(3);
        let backend = SlowBackend {
            delay: Duration::from_millis(800),
        };
        let sel = fetcher(100)
            .fetch_challenge(Arc::new(backend), &mut rng)
            .await
            .unwrap();
        assert_eq!(sel.reason_code, reason_codes::UNSUB_CODE_FALLBACK_TIMEOUT);
        assert_eq!(sel.challenge.origin(), ChallengeOrigin::LocalFallback);
    }

    #[tokio::test]
    async fn at_code_fetch_04_empty_table_falls_back() {
        let mut rng = StdRng::seed_from_u64(4);
        let sel = fetcher(1_000)
            .fetch_challenge(Arc::new(LocalBackend::new_in_memory()), &mut rng)
            .await
            .unwrap();
        assert_eq!(sel.reason_code, reason_codes::UNSUB_CODE_FALLBACK_REMOTE_EMPTY);
    }

    #[test]
    fn at_code_fetch_05_timeout_bounds() {
        assert!(UnsubCodeFetcher::new(CodeFetchConfig {
            timeout_ms: 50,
            source: UnsubCodeSourceConfig::mvp_v1(),
        })
        .is_err());
    }
}
