use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireIdentity;
use crate::server::AppState;
use crate::server::dto::{
    ArchiveRequest, CreatePageRequest, FavoriteRequest, ListPagesParams, MovePageRequest,
    UpdatePageRequest,
};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::{NewPage, PagePatch, PageQuery, parse_blocks};

use super::access::{load_folder, load_page};

pub async fn list_pages(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListPagesParams>,
) -> impl IntoResponse {
    let ws = &state.workspace;

    if let Some(folder_id) = &params.folder_id {
        load_folder(ws, &identity, folder_id)?;
    }
    if let Some(parent_id) = &params.parent_page_id {
        load_page(ws, &identity, parent_id)?;
    }

    let query = PageQuery {
        folder_id: params.folder_id,
        parent_page_id: params.parent_page_id,
        include_archived: params.include_archived.unwrap_or(false),
        favorites_only: params.favorites.unwrap_or(false),
        ..PageQuery::new(identity.organization_id)
    };
    let pages = ws.pages.list_pages(&query)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(pages)))
}

pub async fn create_page(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePageRequest>,
) -> impl IntoResponse {
    let content = req.content.map(parse_blocks).transpose()?;

    let page = state.workspace.pages.create_page(NewPage {
        organization_id: identity.organization_id,
        folder_id: req.folder_id,
        parent_page_id: req.parent_page_id,
        title: req.title,
        slug: req.slug,
        icon: req.icon,
        cover_image: req.cover_image,
        summary: req.summary,
        content,
        properties: req.properties,
        position: req.position,
        created_by_id: identity.user_id,
    })?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(page))))
}

pub async fn get_page(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let page = load_page(&state.workspace, &identity, &id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn get_page_by_slug(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let page = state
        .workspace
        .pages
        .get_page_by_slug(&identity.organization_id, &slug)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn list_child_pages(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &id)?;

    let children = ws.pages.list_child_pages(&id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(children)))
}

pub async fn update_page(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePageRequest>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &id)?;

    let patch = PagePatch {
        title: req.title,
        slug: req.slug,
        icon: req.icon,
        cover_image: req.cover_image,
        summary: req.summary,
        content: req.content.map(parse_blocks).transpose()?,
        properties: req.properties,
        position: req.position,
        ..PagePatch::default()
    };
    let page = ws.pages.update_page(&id, patch, identity.user())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn move_page(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MovePageRequest>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &id)?;

    let page = ws.pages.move_page(
        &id,
        req.folder_id.as_deref(),
        req.parent_page_id.as_deref(),
        identity.user(),
    )?;

    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn publish_page(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &id)?;

    let page = ws.pages.publish_page(&id, identity.user())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn archive_page(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ArchiveRequest>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &id)?;

    let page = ws.pages.archive_page(&id, req.archived, identity.user())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn favorite_page(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FavoriteRequest>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &id)?;

    let page = ws.pages.favorite_page(&id, req.favorite, identity.user())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(page)))
}

pub async fn delete_page(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_page(ws, &identity, &id)?;

    let removal = ws.pages.delete_page(&id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(removal)))
}
