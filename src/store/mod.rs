mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Every mutating method is one transaction: the invariant checks it performs
/// (organization match, sibling-name and slug uniqueness, acyclicity, version
/// assignment) see the same snapshot the write commits against.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Identity references, synced from the authentication service
    fn register_organization(&self, org: &Organization) -> Result<()>;
    fn get_organization(&self, id: &str) -> Result<Option<Organization>>;
    fn delete_organization(&self, id: &str) -> Result<bool>;
    fn register_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn delete_user(&self, id: &str) -> Result<bool>;

    // Folder operations (parent pointer hierarchy)
    fn create_folder(&self, folder: &Folder) -> Result<()>;
    fn get_folder(&self, id: &str) -> Result<Option<Folder>>;
    fn list_folders(&self, organization_id: &str, parent_id: Option<&str>) -> Result<Vec<Folder>>;
    /// Ancestors of a folder, root first, excluding the folder itself.
    fn list_folder_ancestors(&self, id: &str) -> Result<Vec<Folder>>;
    fn update_folder(&self, id: &str, patch: &FolderPatch, stamp: &Stamp) -> Result<Folder>;
    /// Deletes the folder subtree and unfiles every page inside it.
    fn delete_folder(&self, id: &str, at: DateTime<Utc>) -> Result<FolderRemoval>;

    // Page operations
    fn create_page(&self, page: &Page) -> Result<()>;
    fn get_page(&self, id: &str) -> Result<Option<Page>>;
    fn get_page_by_slug(&self, organization_id: &str, slug: &str) -> Result<Option<Page>>;
    fn list_pages(&self, query: &PageQuery) -> Result<Vec<Page>>;
    fn list_child_pages(&self, id: &str) -> Result<Vec<Page>>;
    fn update_page(&self, id: &str, patch: &PagePatch, stamp: &Stamp) -> Result<Page>;
    /// Sets `published_at` unless it is already set.
    fn publish_page(&self, id: &str, stamp: &Stamp) -> Result<Page>;
    /// Deletes the page subtree together with every revision in it.
    fn delete_page(&self, id: &str) -> Result<PageRemoval>;

    // Revision operations (append-only)
    /// Snapshots the live page as version max + 1.
    fn create_revision(&self, page_id: &str, revision_id: &str, stamp: &Stamp)
    -> Result<PageRevision>;
    fn get_revision(&self, id: &str) -> Result<Option<PageRevision>>;
    /// Revisions with `version > after_version`, ascending, at most `limit`.
    fn list_revisions(&self, page_id: &str, after_version: i64, limit: usize)
    -> Result<Vec<PageRevision>>;
    /// Snapshots the live page as `backup_id`, then overwrites it with the
    /// revision's content.
    fn restore_revision(
        &self,
        revision_id: &str,
        backup_id: &str,
        stamp: &Stamp,
    ) -> Result<(Page, PageRevision)>;
}
