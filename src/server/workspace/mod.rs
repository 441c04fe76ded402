mod access;
mod folders;
mod pages;
mod revisions;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::server::AppState;

pub fn workspace_router() -> Router<Arc<AppState>> {
    Router::new()
        // Folders (hierarchical)
        .route(
            "/folders",
            get(folders::list_folders).post(folders::create_folder),
        )
        .route(
            "/folders/{id}",
            get(folders::get_folder)
                .patch(folders::update_folder)
                .delete(folders::delete_folder),
        )
        .route("/folders/{id}/move", post(folders::move_folder))
        .route("/folders/{id}/archive", put(folders::archive_folder))
        // Pages
        .route("/pages", get(pages::list_pages).post(pages::create_page))
        .route("/pages/by-slug/{slug}", get(pages::get_page_by_slug))
        .route(
            "/pages/{id}",
            get(pages::get_page)
                .patch(pages::update_page)
                .delete(pages::delete_page),
        )
        .route("/pages/{id}/children", get(pages::list_child_pages))
        .route("/pages/{id}/move", post(pages::move_page))
        .route("/pages/{id}/publish", post(pages::publish_page))
        .route("/pages/{id}/archive", put(pages::archive_page))
        .route("/pages/{id}/favorite", put(pages::favorite_page))
        // Revisions (append-only)
        .route(
            "/pages/{id}/revisions",
            get(revisions::list_revisions).post(revisions::create_revision),
        )
        .route("/revisions/{id}", get(revisions::get_revision))
        .route("/revisions/{id}/restore", post(revisions::restore_revision))
}
