use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::diff::patch::DEFAULT_CONTEXT;
use crate::model::{PublishRecord, Tag, Version, VersionId};
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub content: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub published_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertRequest {
    pub version_id: VersionId,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    #[serde(alias = "tagName")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTagRequest {
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub compare: Option<VersionId>,
    pub format: Option<String>,
    pub context: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

type VersionPath = Result<Path<(String, VersionId)>, PathRejection>;

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

pub async fn health() -> &'static str {
    "ok"
}

pub async fn create_version(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    body: Result<Json<CreateVersionRequest>, JsonRejection>,
) -> ApiResult<Json<Version>> {
    let Json(req) = body?;
    let version = state
        .service
        .create_version(&content_id, req.content, req.message)
        .await?;
    Ok(Json(version))
}

pub async fn current_version(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> ApiResult<Json<Version>> {
    Ok(Json(state.service.current_version(&content_id).await?))
}

pub async fn list_versions(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> ApiResult<Json<Vec<Version>>> {
    Ok(Json(state.service.list_versions(&content_id).await?))
}

pub async fn get_version(
    State(state): State<AppState>,
    path: VersionPath,
) -> ApiResult<Json<Version>> {
    let Path((content_id, version_id)) = path?;
    Ok(Json(state.service.get_version(&content_id, version_id).await?))
}

pub async fn delete_version(
    State(state): State<AppState>,
    path: VersionPath,
) -> ApiResult<Json<DeleteResponse>> {
    let Path((content_id, version_id)) = path?;
    state.service.delete_version(&content_id, version_id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Version {} deleted", version_id),
    }))
}

pub async fn revert(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    body: Result<Json<RevertRequest>, JsonRejection>,
) -> ApiResult<Json<Version>> {
    let Json(req) = body?;
    Ok(Json(state.service.revert(&content_id, req.version_id).await?))
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

pub async fn publish(
    State(state): State<AppState>,
    path: VersionPath,
    body: Result<Json<PublishRequest>, JsonRejection>,
) -> ApiResult<Json<Version>> {
    let Path((content_id, version_id)) = path?;
    let Json(req) = body?;
    let version = state
        .service
        .publish(&content_id, version_id, &req.published_by)
        .await?;
    Ok(Json(version))
}

pub async fn unpublish(
    State(state): State<AppState>,
    path: VersionPath,
) -> ApiResult<Json<Version>> {
    let Path((content_id, version_id)) = path?;
    Ok(Json(state.service.unpublish(&content_id, version_id).await?))
}

pub async fn publish_history(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> ApiResult<Json<Vec<PublishRecord>>> {
    Ok(Json(state.service.publish_history(&content_id).await?))
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// `from` is the path version, `to` is `?compare=`. `format=patch` returns
/// a unified patch as plain text.
pub async fn diff(
    State(state): State<AppState>,
    path: VersionPath,
    query: Result<Query<DiffQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Path((content_id, from_id)) = path?;
    let Query(query) = query?;
    let to_id = query
        .compare
        .ok_or_else(|| ApiError::BadRequest("query parameter 'compare' is required".to_string()))?;

    match query.format.as_deref() {
        None | Some("json") => {
            let diff = state.service.diff(&content_id, from_id, to_id).await?;
            Ok(Json(diff).into_response())
        }
        Some("patch") => {
            let context = query.context.unwrap_or(DEFAULT_CONTEXT);
            let patch = state
                .service
                .patch(&content_id, from_id, to_id, context)
                .await?;
            Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], patch).into_response())
        }
        Some(other) => Err(ApiError::BadRequest(format!(
            "unsupported diff format '{}'",
            other
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

pub async fn list_version_tags(
    State(state): State<AppState>,
    path: VersionPath,
) -> ApiResult<Json<Vec<Tag>>> {
    let Path((content_id, version_id)) = path?;
    Ok(Json(
        state
            .service
            .list_version_tags(&content_id, version_id)
            .await?,
    ))
}

pub async fn create_version_tag(
    State(state): State<AppState>,
    path: VersionPath,
    body: Result<Json<CreateTagRequest>, JsonRejection>,
) -> ApiResult<Json<Tag>> {
    let Path((content_id, version_id)) = path?;
    let Json(req) = body?;
    let tag = state
        .service
        .create_tag(&content_id, version_id, &req.name)
        .await?;
    Ok(Json(tag))
}

/// Tag a version of the default content stream.
pub async fn create_default_tag(
    State(state): State<AppState>,
    path: Result<Path<VersionId>, PathRejection>,
    body: Result<Json<CreateTagRequest>, JsonRejection>,
) -> ApiResult<Json<Tag>> {
    let Path(version_id) = path?;
    let Json(req) = body?;
    let tag = state
        .service
        .create_tag(&state.default_content_id, version_id, &req.name)
        .await?;
    Ok(Json(tag))
}

pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.service.list_tags().await?))
}

pub async fn get_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Tag>> {
    Ok(Json(state.service.get_tag(&name).await?))
}

pub async fn rename_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<RenameTagRequest>, JsonRejection>,
) -> ApiResult<Json<Tag>> {
    let Json(req) = body?;
    Ok(Json(state.service.rename_tag(&name, &req.new_name).await?))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let tag = state.service.delete_tag(&name).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Tag '{}' deleted", tag.name),
    }))
}
