use axum::{
    Router,
    extract::{Json, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::core::{ErrorMap, Scenario, ScenarioId, ScenarioPatch, ScenarioStore};
use crate::export::{comparison_rows, render_csv};
use crate::persistence::{
    BlobStore, DEFAULT_DEBOUNCE, DEFAULT_STORAGE_KEY, FileBlobStore, MemoryBlobStore,
    PersistenceConfig, PersistenceGateway,
};

pub const DEFAULT_SCENARIO_NAME: &str = "My first property";

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub debounce: Duration,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: None,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

pub struct AppState<B> {
    store: Arc<Mutex<ScenarioStore>>,
    gateway: Arc<PersistenceGateway<B>>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<B: BlobStore> AppState<B> {
    pub fn new(store: ScenarioStore, gateway: Arc<PersistenceGateway<B>>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            gateway,
        }
    }

    fn store(&self) -> MutexGuard<'_, ScenarioStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CreatePayload {
    name: Option<String>,
    select: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentPayload {
    id: ScenarioId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComparisonPayload {
    enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateResponse<'a> {
    scenarios: Vec<&'a Scenario>,
    current_scenario_id: Option<&'a ScenarioId>,
    comparison_mode: bool,
    selected_scenarios: Vec<&'a ScenarioId>,
    hydrated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioResponse<'a> {
    scenario: &'a Scenario,
    errors: ErrorMap,
    is_current: bool,
    is_selected: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_http_server(config: ServeConfig) -> anyhow::Result<()> {
    let persistence = PersistenceConfig {
        storage_key: DEFAULT_STORAGE_KEY.to_string(),
        debounce: config.debounce,
    };
    match config.data_dir.clone() {
        Some(dir) => {
            info!("Persisting scenarios under {}", dir.display());
            serve(FileBlobStore::new(dir), persistence, config.port).await
        }
        None => {
            warn!("No data directory given, scenarios will not survive a restart");
            serve(MemoryBlobStore::new(), persistence, config.port).await
        }
    }
}

async fn serve<B: BlobStore>(
    blobs: B,
    persistence: PersistenceConfig,
    port: u16,
) -> anyhow::Result<()> {
    let gateway = Arc::new(PersistenceGateway::new(blobs, persistence));
    let mut store = ScenarioStore::new();
    let persister = gateway.spawn(store.subscribe());

    let hydration = gateway.hydrate(&mut store).await?;
    info!("Hydration finished: {hydration:?}");
    ensure_current_scenario(&mut store);

    let state = AppState::new(store, gateway);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Scenario API listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    persister.join().await;
    info!("Scenario API stopped");
    Ok(())
}

/// Startup policy: an empty store gets one blank scenario, and a store without
/// a current scenario selects its oldest one.
pub fn ensure_current_scenario(store: &mut ScenarioStore) {
    if store.is_empty() {
        let id = store.create_scenario(DEFAULT_SCENARIO_NAME);
        store.set_current_scenario(&id);
        return;
    }
    if store.current_scenario_id().is_none() {
        let oldest = store.scenarios().next().map(|s| s.id.clone());
        if let Some(id) = oldest {
            store.set_current_scenario(&id);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}

pub fn router<B: BlobStore>(state: AppState<B>) -> Router {
    Router::new()
        .route("/api/state", get(state_handler::<B>))
        .route("/api/scenarios", post(create_handler::<B>))
        .route(
            "/api/scenarios/:id",
            get(scenario_handler::<B>)
                .patch(update_handler::<B>)
                .delete(delete_handler::<B>),
        )
        .route("/api/current", put(current_handler::<B>))
        .route("/api/comparison", put(comparison_handler::<B>))
        .route("/api/comparison/:id/toggle", post(toggle_handler::<B>))
        .route("/api/comparison/export.csv", get(export_handler::<B>))
        .route("/api/storage", axum::routing::delete(clear_storage_handler::<B>))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn state_handler<B: BlobStore>(State(state): State<AppState<B>>) -> Response {
    let store = state.store();
    json_response(StatusCode::OK, state_body(&store))
}

fn state_body(store: &ScenarioStore) -> StateResponse<'_> {
    StateResponse {
        scenarios: store.scenarios().collect(),
        current_scenario_id: store.current_scenario_id(),
        comparison_mode: store.comparison_mode(),
        selected_scenarios: store.selected_scenario_ids().collect(),
        hydrated: store.is_hydrated(),
    }
}

async fn create_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    Json(payload): Json<CreatePayload>,
) -> Response {
    let name = match payload.name.map(|n| n.trim().to_string()) {
        Some(name) if !name.is_empty() => name,
        Some(_) => return error_response(StatusCode::BAD_REQUEST, "name must not be blank"),
        None => DEFAULT_SCENARIO_NAME.to_string(),
    };

    let mut store = state.store();
    let id = store.create_scenario(name);
    if payload.select {
        store.set_current_scenario(&id);
    }
    scenario_response(&store, &id, StatusCode::CREATED)
}

async fn scenario_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Response {
    let store = state.store();
    scenario_response(&store, &ScenarioId::from(id), StatusCode::OK)
}

async fn update_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
    Json(patch): Json<ScenarioPatch>,
) -> Response {
    let id = ScenarioId::from(id);
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return error_response(StatusCode::BAD_REQUEST, "name must not be blank");
    }

    let mut store = state.store();
    if !store.contains(&id) {
        return unknown_scenario(&id);
    }
    store.update_scenario(&id, patch);
    scenario_response(&store, &id, StatusCode::OK)
}

async fn delete_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Response {
    let id = ScenarioId::from(id);
    let mut store = state.store();
    if !store.contains(&id) {
        return unknown_scenario(&id);
    }
    store.delete_scenario(&id);
    json_response(StatusCode::OK, state_body(&store))
}

async fn current_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    Json(payload): Json<CurrentPayload>,
) -> Response {
    let mut store = state.store();
    if !store.contains(&payload.id) {
        return unknown_scenario(&payload.id);
    }
    store.set_current_scenario(&payload.id);
    json_response(StatusCode::OK, state_body(&store))
}

async fn comparison_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    Json(payload): Json<ComparisonPayload>,
) -> Response {
    let mut store = state.store();
    store.set_comparison_mode(payload.enabled);
    json_response(StatusCode::OK, state_body(&store))
}

async fn toggle_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    Path(id): Path<String>,
) -> Response {
    let id = ScenarioId::from(id);
    let mut store = state.store();
    if !store.contains(&id) {
        return unknown_scenario(&id);
    }
    store.toggle_scenario_selection(&id);
    json_response(StatusCode::OK, state_body(&store))
}

async fn export_handler<B: BlobStore>(State(state): State<AppState<B>>) -> Response {
    let csv = {
        let store = state.store();
        let selected = store.selected_scenarios();
        let scenarios = if selected.is_empty() {
            store.scenarios().collect()
        } else {
            selected
        };
        render_csv(&comparison_rows(), &scenarios)
    };

    match csv {
        Ok(body) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"scenario-comparison.csv\"",
                ),
            ],
            body,
        )),
        Err(e) => {
            error!("Failed to render comparison CSV: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render CSV")
        }
    }
}

async fn clear_storage_handler<B: BlobStore>(State(state): State<AppState<B>>) -> Response {
    match state.gateway.clear().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to clear persisted scenarios: {e}");
            error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
    }
}

fn scenario_response(store: &ScenarioStore, id: &ScenarioId, status: StatusCode) -> Response {
    let Some(scenario) = store.scenario(id) else {
        return unknown_scenario(id);
    };
    json_response(
        status,
        ScenarioResponse {
            scenario,
            errors: store.errors_for(id).unwrap_or_default(),
            is_current: store.current_scenario_id() == Some(id),
            is_selected: store.is_selected(id),
        },
    )
}

fn unknown_scenario(id: &ScenarioId) -> Response {
    error_response(StatusCode::NOT_FOUND, &format!("Unknown scenario `{id}`"))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
