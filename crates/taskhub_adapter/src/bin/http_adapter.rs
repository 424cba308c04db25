#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use taskhub_adapter::{
    AdapterConfig, AdapterError, AdapterHealthResponse, AdapterRuntime, ChallengeResponse,
    CloseResponse, DoneTasksRequest, DoneTasksResponse, InputRequest, InputResponse,
    RefreshResponse, RerenderRequest, SubmitResponse, ToggleResponse, ToggleStart,
};
use taskhub_kernel_contracts::notify::BellState;
use taskhub_kernel_contracts::unsub::ChallengePhase;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = AdapterConfig::from_env()?;
    let addr = config.bind;
    let runtime: SharedRuntime = Arc::new(Mutex::new(AdapterRuntime::new(&config)?));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/unsub/open", post(open_challenge))
        .route("/v1/unsub/input", post(challenge_input))
        .route("/v1/unsub/submit", post(submit_challenge))
        .route("/v1/unsub/close", post(close_challenge))
        .route("/v1/unsub/rerender", post(rerender_challenge))
        .route("/v1/unsub/image", get(challenge_image))
        .route("/v1/notifications/toggle", post(toggle_notifications))
        .route("/v1/notifications/bell", get(bell_state))
        .route("/v1/notifications/refresh", post(refresh_subscription))
        .route("/v1/tasks/done", post(sync_done_tasks))
        .with_state(runtime);

    info!(%addr, "taskhub_adapter_http listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

fn lock(runtime: &SharedRuntime) -> Result<MutexGuard<'_, AdapterRuntime>, AdapterError> {
    runtime.lock().map_err(|_| AdapterError::LockPoisoned)
}

async fn healthz(
    State(runtime): State<SharedRuntime>,
) -> (StatusCode, Json<AdapterHealthResponse>) {
    match lock(&runtime) {
        Ok(runtime) => (StatusCode::OK, Json(runtime.health_report())),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AdapterHealthResponse {
                status: "error".to_string(),
                backend: String::new(),
                challenge_phase: ChallengePhase::Closed,
                subscribed: false,
            }),
        ),
    }
}

async fn open_challenge(
    State(runtime): State<SharedRuntime>,
) -> Result<Json<ChallengeResponse>, AdapterError> {
    let pending = {
        let mut runtime = lock(&runtime)?;
        runtime.open_challenge()
    };
    let fetched = pending.fetch().await;
    let mut runtime = lock(&runtime)?;
    Ok(Json(runtime.finish_load(fetched)?))
}

async fn challenge_input(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<InputRequest>,
) -> Result<Json<InputResponse>, AdapterError> {
    let mut runtime = lock(&runtime)?;
    Ok(Json(runtime.input(request)?))
}

async fn submit_challenge(
    State(runtime): State<SharedRuntime>,
) -> Result<Json<SubmitResponse>, AdapterError> {
    let mut runtime = lock(&runtime)?;
    Ok(Json(runtime.submit()))
}

async fn close_challenge(
    State(runtime): State<SharedRuntime>,
) -> Result<Json<CloseResponse>, AdapterError> {
    let mut runtime = lock(&runtime)?;
    Ok(Json(runtime.close()))
}

async fn rerender_challenge(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<RerenderRequest>,
) -> Result<Json<ChallengeResponse>, AdapterError> {
    let mut runtime = lock(&runtime)?;
    Ok(Json(runtime.rerender(request)?))
}

async fn challenge_image(
    State(runtime): State<SharedRuntime>,
) -> Result<impl IntoResponse, AdapterError> {
    let png = lock(&runtime)?.challenge_png()?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    ))
}

async fn toggle_notifications(
    State(runtime): State<SharedRuntime>,
) -> Result<Json<ToggleResponse>, AdapterError> {
    let start = {
        let mut runtime = lock(&runtime)?;
        runtime.toggle()
    };
    match start {
        ToggleStart::Done(response) => Ok(Json(response)),
        ToggleStart::Challenge(pending) => {
            let fetched = pending.fetch().await;
            let mut runtime = lock(&runtime)?;
            Ok(Json(runtime.finish_toggle(fetched)?))
        }
    }
}

async fn bell_state(
    State(runtime): State<SharedRuntime>,
) -> Result<Json<BellState>, AdapterError> {
    let runtime = lock(&runtime)?;
    Ok(Json(runtime.bell()))
}

async fn refresh_subscription(
    State(runtime): State<SharedRuntime>,
) -> Result<Json<RefreshResponse>, AdapterError> {
    let mut runtime = lock(&runtime)?;
    Ok(Json(runtime.refresh()))
}

async fn sync_done_tasks(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<DoneTasksRequest>,
) -> Result<Json<DoneTasksResponse>, AdapterError> {
    let mut runtime = lock(&runtime)?;
    Ok(Json(runtime.sync_done_tasks(request)))
}
