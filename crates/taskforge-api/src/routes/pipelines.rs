//! Pipeline management endpoints: register, edit, delete, launch,
//! cancel, and inspect registered pipelines and their run history.
//!
//! Each handler is a thin call into [`taskforge_scheduler::RunManager`]
//! followed by a status code chosen per the base spec's §6 contract
//! (200 OK, 201 Created, 400/404/409/500 via [`ApiError`]).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use taskforge_core::pipeline::{
    EditPipelineRequest, RegisterFilePath, RegisterPipelineRequest, RegisteredPipelineDetails,
    RegisteredPipelineResponse,
};

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pipelines))
        .route("/register/json", post(register_json))
        .route("/register/filepath", post(register_filepath))
        .route("/{name}", get(get_pipeline).put(edit_pipeline).delete(delete_pipeline))
        .route("/{name}/launch", post(launch_pipeline))
        .route("/{name}/cancel", post(cancel_pipeline))
        .route("/{name}/runs", get(list_runs))
}

async fn list_pipelines(
    State(state): State<AppState>,
) -> Json<Vec<RegisteredPipelineResponse>> {
    Json(state.manager.list().await)
}

async fn get_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RegisteredPipelineDetails>, ApiError> {
    Ok(Json(state.manager.details(&name).await?))
}

async fn register_json(
    State(state): State<AppState>,
    Json(request): Json<RegisterPipelineRequest>,
) -> Result<StatusCode, ApiError> {
    let variables = (!request.variables.is_empty()).then_some(request.variables);
    state
        .manager
        .register(request.pipeline_definition, variables)
        .await?;
    Ok(StatusCode::CREATED)
}

async fn register_filepath(
    State(state): State<AppState>,
    Json(request): Json<RegisterFilePath>,
) -> Result<StatusCode, ApiError> {
    state
        .manager
        .register_from_path(
            &request.definition_file_path,
            request.variable_file_path.as_deref(),
        )
        .await?;
    Ok(StatusCode::CREATED)
}

async fn edit_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<EditPipelineRequest>,
) -> Result<StatusCode, ApiError> {
    state.manager.edit(&name, request).await?;
    Ok(StatusCode::OK)
}

async fn delete_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.manager.delete(&name).await?;
    Ok(StatusCode::OK)
}

async fn launch_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<taskforge_core::pipeline::PipelineRun>, ApiError> {
    Ok(Json(state.manager.launch(&name).await?))
}

async fn cancel_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.manager.cancel(&name).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct ListRunsQuery {
    /// Maximum number of runs to return; absent or negative means
    /// unlimited, matching `RunStore::list_runs`'s `limit == -1`.
    limit: Option<i64>,
}

async fn list_runs(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ListRunsQuery>,
) -> Json<Vec<taskforge_core::pipeline::PipelineRun>> {
    Json(state.manager.list_runs(&name, query.limit.unwrap_or(-1)))
}
