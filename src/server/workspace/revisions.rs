use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireIdentity;
use crate::server::AppState;
use crate::server::dto::ListRevisionsParams;
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PaginatedResponse, paginate,
};

use super::access::{load_page, load_revision};

pub async fn create_revision(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &page_id)?;

    let revision = ws.revisions.snapshot_page(&page_id, identity.user())?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(revision))))
}

pub async fn list_revisions(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(page_id): Path<String>,
    Query(params): Query<ListRevisionsParams>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &page_id)?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let revisions =
        ws.revisions
            .list_revisions_after(&page_id, params.after.unwrap_or(0), limit + 1)?;

    let (revisions, next_cursor, has_more) = paginate(revisions, limit, |r| r.version);

    Ok::<_, ApiError>(Json(PaginatedResponse::new(
        revisions,
        next_cursor,
        has_more,
    )))
}

pub async fn get_revision(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let revision = load_revision(&state.workspace, &identity, &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(revision)))
}

pub async fn restore_revision(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_revision(ws, &identity, &id)?;

    let restored = ws.revisions.restore_revision(&id, identity.user())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(restored)))
}
