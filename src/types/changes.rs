use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ContentBlock, Properties};

/// Who made a change and when. Every mutation refreshes `updated_at` from it.
#[derive(Debug, Clone)]
pub struct Stamp {
    pub user_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl Stamp {
    #[must_use]
    pub fn now(user_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewFolder {
    pub organization_id: String,
    pub parent_folder_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub position: Option<i64>,
    pub created_by_id: Option<String>,
}

/// Field-level folder update. `None` leaves a field untouched; for nullable
/// columns `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct FolderPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub position: Option<i64>,
    pub parent_folder_id: Option<Option<String>>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPage {
    pub organization_id: String,
    pub folder_id: Option<String>,
    pub parent_page_id: Option<String>,
    pub title: String,
    pub slug: Option<String>,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub summary: Option<String>,
    pub content: Option<Vec<ContentBlock>>,
    pub properties: Option<Properties>,
    pub position: Option<i64>,
    pub created_by_id: Option<String>,
}

/// Field-level page update, same conventions as [`FolderPatch`].
#[derive(Debug, Clone, Default)]
pub struct PagePatch {
    pub title: Option<String>,
    pub slug: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub cover_image: Option<Option<String>>,
    pub summary: Option<Option<String>>,
    pub content: Option<Vec<ContentBlock>>,
    pub properties: Option<Properties>,
    pub folder_id: Option<Option<String>>,
    pub parent_page_id: Option<Option<String>>,
    pub position: Option<i64>,
    pub is_archived: Option<bool>,
    pub is_favorite: Option<bool>,
}

impl PagePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.slug.is_none()
            && self.icon.is_none()
            && self.cover_image.is_none()
            && self.summary.is_none()
            && self.content.is_none()
            && self.properties.is_none()
            && self.folder_id.is_none()
            && self.parent_page_id.is_none()
            && self.position.is_none()
            && self.is_archived.is_none()
            && self.is_favorite.is_none()
    }
}

/// Filter for listing pages. `folder_id` / `parent_page_id` narrow to direct
/// members when set.
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    pub organization_id: String,
    pub folder_id: Option<String>,
    pub parent_page_id: Option<String>,
    pub include_archived: bool,
    pub favorites_only: bool,
}

impl PageQuery {
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FolderRemoval {
    pub folders_deleted: usize,
    pub pages_unfiled: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRemoval {
    pub pages_deleted: usize,
    pub revisions_deleted: usize,
}
