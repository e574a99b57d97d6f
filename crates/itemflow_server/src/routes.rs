//! HTTP request layer over the item service and batch processor.
//!
//! Store calls are synchronous, so every handler hops onto the blocking pool
//! before touching the repository.

use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use itemflow_core::{
    Item, ItemDraft, ItemId, ItemProcessor, ItemService, ProcessorConfig, RepoResult,
    SqliteItemRepository,
};
use log::info;
use std::sync::Arc;

/// Shared handler dependencies.
#[derive(Clone)]
pub struct AppState {
    service: ItemService<SqliteItemRepository>,
    processor: Arc<ItemProcessor<SqliteItemRepository>>,
}

impl AppState {
    /// Shares one repository between CRUD handlers and the processor.
    pub fn new(repo: SqliteItemRepository, processor_config: ProcessorConfig) -> Self {
        let repo = Arc::new(repo);
        Self {
            service: ItemService::new(Arc::clone(&repo)),
            processor: Arc::new(ItemProcessor::new(repo, processor_config)),
        }
    }

    pub fn processor(&self) -> &ItemProcessor<SqliteItemRepository> {
        &self.processor
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/items/process", get(process_items))
        .route(
            "/api/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    itemflow_core::ping()
}

async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<Item>>, ApiError> {
    let service = state.service;
    let items = run_blocking(move || service.list_items()).await?;
    Ok(Json(items))
}

async fn create_item(
    State(state): State<AppState>,
    body: Result<Json<ItemDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(draft) = body?;
    let service = state.service;
    let item = run_blocking(move || service.create_item(&draft)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<Json<Item>, ApiError> {
    let service = state.service;
    run_blocking(move || service.get_item(id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
    body: Result<Json<ItemDraft>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Json(draft) = body?;
    let service = state.service;
    run_blocking(move || service.update_item(id, draft))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<ItemId>,
) -> Result<StatusCode, ApiError> {
    let service = state.service;
    run_blocking(move || service.delete_item(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn process_items(State(state): State<AppState>) -> Result<Json<Vec<Item>>, ApiError> {
    let processed = state.processor.process_all().await?;
    info!(
        "event=http_process module=server status=ok processed={} processed_total={}",
        processed.len(),
        state.processor.processed_total()
    );
    Ok(Json(processed))
}

async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> RepoResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .map_err(ApiError::from)
}
