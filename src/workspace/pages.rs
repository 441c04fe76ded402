use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::validation::{validate_page_title, validate_slug};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{
    NewPage, Page, PagePatch, PageQuery, PageRemoval, Properties, Stamp, validate_blocks,
};

pub struct PageManager {
    store: Arc<dyn Store>,
}

impl PageManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn create_page(&self, new: NewPage) -> Result<Page> {
        let title = validate_page_title(&new.title)?;
        if let Some(slug) = &new.slug {
            validate_slug(slug)?;
        }
        let content = new.content.unwrap_or_default();
        validate_blocks(&content)?;

        let now = Utc::now();
        let page = Page {
            id: Uuid::new_v4().to_string(),
            organization_id: new.organization_id,
            folder_id: new.folder_id,
            parent_page_id: new.parent_page_id,
            title,
            slug: new.slug,
            icon: new.icon,
            cover_image: new.cover_image,
            summary: new.summary,
            content,
            properties: new.properties.unwrap_or_else(Properties::new),
            is_archived: false,
            is_favorite: false,
            position: new.position.unwrap_or(0),
            published_at: None,
            created_by_id: new.created_by_id.clone(),
            updated_by_id: new.created_by_id,
            created_at: now,
            updated_at: now,
        };

        self.store.create_page(&page)?;
        info!(
            "Created page {} in organization {}",
            page.id, page.organization_id
        );
        Ok(page)
    }

    pub fn get_page(&self, id: &str) -> Result<Page> {
        self.store
            .get_page(id)?
            .ok_or_else(|| Error::not_found("page", id))
    }

    pub fn get_page_by_slug(&self, organization_id: &str, slug: &str) -> Result<Page> {
        self.store
            .get_page_by_slug(organization_id, slug)?
            .ok_or_else(|| Error::not_found("page", slug))
    }

    pub fn list_pages(&self, query: &PageQuery) -> Result<Vec<Page>> {
        self.store.list_pages(query)
    }

    pub fn list_child_pages(&self, id: &str) -> Result<Vec<Page>> {
        self.get_page(id)?;
        self.store.list_child_pages(id)
    }

    /// Partial update. Never snapshots; callers decide when history is kept.
    pub fn update_page(&self, id: &str, mut patch: PagePatch, editor: Option<&str>) -> Result<Page> {
        if patch.is_empty() {
            return self.get_page(id);
        }
        if let Some(title) = &patch.title {
            patch.title = Some(validate_page_title(title)?);
        }
        if let Some(Some(slug)) = &patch.slug {
            validate_slug(slug)?;
        }
        if let Some(content) = &patch.content {
            validate_blocks(content)?;
        }

        debug!("Updating page {}", id);
        self.store.update_page(id, &patch, &Stamp::now(editor))
    }

    /// Re-files the page and reparents it. The page hierarchy is checked for
    /// cycles independently of the folder hierarchy.
    pub fn move_page(
        &self,
        id: &str,
        new_folder_id: Option<&str>,
        new_parent_page_id: Option<&str>,
        editor: Option<&str>,
    ) -> Result<Page> {
        let patch = PagePatch {
            folder_id: Some(new_folder_id.map(str::to_string)),
            parent_page_id: Some(new_parent_page_id.map(str::to_string)),
            ..PagePatch::default()
        };
        let page = self.store.update_page(id, &patch, &Stamp::now(editor))?;
        info!("Moved page {}", id);
        Ok(page)
    }

    /// Idempotent: an already published page is returned unchanged.
    pub fn publish_page(&self, id: &str, editor: Option<&str>) -> Result<Page> {
        self.store.publish_page(id, &Stamp::now(editor))
    }

    pub fn archive_page(&self, id: &str, archived: bool, editor: Option<&str>) -> Result<Page> {
        let patch = PagePatch {
            is_archived: Some(archived),
            ..PagePatch::default()
        };
        self.store.update_page(id, &patch, &Stamp::now(editor))
    }

    pub fn favorite_page(&self, id: &str, favorite: bool, editor: Option<&str>) -> Result<Page> {
        let patch = PagePatch {
            is_favorite: Some(favorite),
            ..PagePatch::default()
        };
        self.store.update_page(id, &patch, &Stamp::now(editor))
    }

    /// Removes the page, its descendants, and every revision of each.
    pub fn delete_page(&self, id: &str) -> Result<PageRemoval> {
        let removal = self.store.delete_page(id)?;
        info!(
            "Deleted page {} ({} pages, {} revisions)",
            id, removal.pages_deleted, removal.revisions_deleted
        );
        Ok(removal)
    }
}
