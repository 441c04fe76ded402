use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use crate::auth::RequireIdentity;
use crate::server::AppState;
use crate::server::dto::{
    ArchiveRequest, CreateFolderRequest, ListFoldersParams, MoveFolderRequest,
    UpdateFolderRequest,
};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::{Folder, FolderPatch, NewFolder};

use super::access::load_folder;

#[derive(Debug, Serialize)]
pub struct Breadcrumb {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct FolderWithPath {
    #[serde(flatten)]
    pub folder: Folder,
    /// Top-level folder first, ending with this folder.
    pub path: Vec<Breadcrumb>,
}

pub async fn list_folders(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListFoldersParams>,
) -> impl IntoResponse {
    let ws = &state.workspace;

    if let Some(parent_id) = &params.parent_id {
        load_folder(ws, &identity, parent_id)?;
    }

    let folders = ws
        .folders
        .list_folders(&identity.organization_id, params.parent_id.as_deref())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(folders)))
}

pub async fn create_folder(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFolderRequest>,
) -> impl IntoResponse {
    let folder = state.workspace.folders.create_folder(NewFolder {
        organization_id: identity.organization_id,
        parent_folder_id: req.parent_folder_id,
        name: req.name,
        description: req.description,
        icon: req.icon,
        position: req.position,
        created_by_id: identity.user_id,
    })?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(folder))))
}

pub async fn get_folder(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_folder(ws, &identity, &id)?;

    let mut chain = ws.folders.folder_path(&id)?;
    let path = chain
        .iter()
        .map(|f| Breadcrumb {
            id: f.id.clone(),
            name: f.name.clone(),
        })
        .collect();
    let Some(folder) = chain.pop() else {
        return Err(ApiError::not_found("Folder not found"));
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(FolderWithPath { folder, path })))
}

pub async fn update_folder(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFolderRequest>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_folder(ws, &identity, &id)?;

    let patch = FolderPatch {
        name: req.name,
        description: req.description,
        icon: req.icon,
        position: req.position,
        ..FolderPatch::default()
    };
    let folder = ws.folders.update_folder(&id, patch, identity.user())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(folder)))
}

pub async fn move_folder(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MoveFolderRequest>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_folder(ws, &identity, &id)?;

    let folder = ws
        .folders
        .move_folder(&id, req.parent_folder_id.as_deref(), identity.user())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(folder)))
}

pub async fn archive_folder(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ArchiveRequest>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_folder(ws, &identity, &id)?;

    let folder = ws
        .folders
        .archive_folder(&id, req.archived, identity.user())?;

    Ok::<_, ApiError>(Json(ApiResponse::success(folder)))
}

pub async fn delete_folder(
    RequireIdentity(identity): RequireIdentity,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let ws = &state.workspace;
    load_folder(ws, &identity, &id)?;

    let removal = ws.folders.delete_folder(&id)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(removal)))
}
