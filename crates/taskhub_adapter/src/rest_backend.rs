#![forbid(unsafe_code)]

use std::time::Duration;

use serde::Serialize;
use taskhub_kernel_contracts::backend::{BackendError, ChallengeCodeRow, PushSubscriptionUpsert};
use taskhub_kernel_contracts::push::PushEndpoint;
use taskhub_kernel_contracts::ContractViolation;
use taskhub_os::backend::{PushSubscriptionBackend, UnsubCodeBackend};
use url::Url;

const UNSUBSCRIBE_CODES_PATH: &str = "rest/v1/unsubscribe_codes";
const PUSH_SUBSCRIPTIONS_PATH: &str = "rest/v1/push_subscriptions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestBackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

impl RestBackendConfig {
    pub fn mvp_v1(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_ms: 8_000,
        }
    }
}

/// PostgREST client for the hosted `unsubscribe_codes` / `push_subscriptions`
/// tables.
#[derive(Debug, Clone)]
pub struct RestBackend {
    agent: ureq::Agent,
    base: Url,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct SubscriptionBody<'a> {
    endpoint: &'a str,
    p256dh: &'a str,
    auth: &'a str,
    updated_at: String,
}

#[derive(Debug, Serialize)]
struct DoneTasksBody {
    done_task_ids: Vec<String>,
}

impl RestBackend {
    pub fn new(config: RestBackendConfig) -> Result<Self, ContractViolation> {
        if !(100..=60_000).contains(&config.timeout_ms) {
            return Err(ContractViolation::InvalidValue {
                field: "rest_backend_config.timeout_ms",
                reason: "must be within 100..=60000",
            });
        }
        if config.api_key.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "rest_backend_config.api_key",
                reason: "must not be empty",
            });
        }
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw).map_err(|_| ContractViolation::InvalidValue {
            field: "rest_backend_config.base_url",
            reason: "must be an absolute url",
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ContractViolation::InvalidValue {
                field: "rest_backend_config.base_url",
                reason: "scheme must be http or https",
            });
        }
        let timeout = Duration::from_millis(config.timeout_ms);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Ok(Self {
            agent,
            base,
            api_key: config.api_key.trim().to_string(),
        })
    }

    pub fn codes_url(&self) -> Result<Url, BackendError> {
        let mut url = self.table_url(UNSUBSCRIBE_CODES_PATH)?;
        url.query_pairs_mut().append_pair("select", "id,code");
        Ok(url)
    }

    pub fn upsert_url(&self) -> Result<Url, BackendError> {
        let mut url = self.table_url(PUSH_SUBSCRIPTIONS_PATH)?;
        url.query_pairs_mut().append_pair("on_conflict", "endpoint");
        Ok(url)
    }

    pub fn endpoint_filter_url(&self, endpoint: &PushEndpoint) -> Result<Url, BackendError> {
        let mut url = self.table_url(PUSH_SUBSCRIPTIONS_PATH)?;
        url.query_pairs_mut()
            .append_pair("endpoint", &format!("eq.{}", endpoint.as_str()));
        Ok(url)
    }

    fn table_url(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|_| BackendError::Transport { kind: "invalid_url" })
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        self.agent
            .request_url(method, url)
            .set("apikey", &self.api_key)
            .set("authorization", &format!("Bearer {}", self.api_key))
    }
}

impl UnsubCodeBackend for RestBackend {
    fn select_codes(&self) -> Result<Vec<ChallengeCodeRow>, BackendError> {
        let url = self.codes_url()?;
        let resp = self
            .request("GET", &url)
            .set("accept", "application/json")
            .call()
            .map_err(backend_error_from_ureq)?;
        resp.into_json::<Vec<ChallengeCodeRow>>()
            .map_err(|_| BackendError::Decode)
    }
}

impl PushSubscriptionBackend for RestBackend {
    fn upsert_subscription(&self, input: PushSubscriptionUpsert) -> Result<(), BackendError> {
        let url = self.upsert_url()?;
        let body = SubscriptionBody {
            endpoint: input.endpoint.as_str(),
            p256dh: &input.p256dh,
            auth: &input.auth,
            updated_at: rfc3339_utc_from_ms(input.updated_at_ms),
        };
        self.request("POST", &url)
            .set("prefer", "resolution=merge-duplicates")
            .send_json(&body)
            .map_err(backend_error_from_ureq)?;
        Ok(())
    }

    fn delete_subscription(&self, endpoint: &PushEndpoint) -> Result<bool, BackendError> {
        let url = self.endpoint_filter_url(endpoint)?;
        let resp = self
            .request("DELETE", &url)
            .set("prefer", "return=representation")
            .call()
            .map_err(backend_error_from_ureq)?;
        let deleted = resp
            .into_json::<Vec<serde_json::Value>>()
            .map_err(|_| BackendError::Decode)?;
        Ok(!deleted.is_empty())
    }

    fn update_done_task_ids(
        &self,
        endpoint: &PushEndpoint,
        done_task_ids: Vec<String>,
    ) -> Result<(), BackendError> {
        let url = self.endpoint_filter_url(endpoint)?;
        self.request("PATCH", &url)
            .send_json(&DoneTasksBody { done_task_ids })
            .map_err(backend_error_from_ureq)?;
        Ok(())
    }
}

fn backend_error_from_ureq(err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(code, _) => BackendError::Status { code },
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            BackendError::Transport {
                kind: classify_transport_error_kind(&combined),
            }
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

/// `updated_at` column value, e.g. `2023-11-14T22:13:20.000Z`.
pub fn rfc3339_utc_from_ms(ms: u64) -> String {
    let days = (ms / 86_400_000) as i64;
    let rem = ms % 86_400_000;
    let (hh, mm, ss, millis) = (
        rem / 3_600_000,
        (rem / 60_000) % 60,
        (rem / 1_000) % 60,
        rem % 1_000,
    );

    // Civil date from days since 1970-01-01 (proleptic Gregorian).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    format!("{year:04}-{month:02}-{day:02}T{hh:02}:{mm:02}:{ss:02}.{millis:03}Z")
}
