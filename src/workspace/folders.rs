use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::validation::validate_folder_name;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Folder, FolderPatch, FolderRemoval, NewFolder, Stamp};

pub struct FolderManager {
    store: Arc<dyn Store>,
}

impl FolderManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn create_folder(&self, new: NewFolder) -> Result<Folder> {
        let name = validate_folder_name(&new.name)?;
        let now = Utc::now();

        let folder = Folder {
            id: Uuid::new_v4().to_string(),
            organization_id: new.organization_id,
            parent_folder_id: new.parent_folder_id,
            name,
            description: new.description,
            icon: new.icon,
            position: new.position.unwrap_or(0),
            is_archived: false,
            created_by_id: new.created_by_id.clone(),
            updated_by_id: new.created_by_id,
            created_at: now,
            updated_at: now,
        };

        self.store.create_folder(&folder)?;
        info!(
            "Created folder {} in organization {}",
            folder.id, folder.organization_id
        );
        Ok(folder)
    }

    pub fn get_folder(&self, id: &str) -> Result<Folder> {
        self.store
            .get_folder(id)?
            .ok_or_else(|| Error::not_found("folder", id))
    }

    /// Direct children of `parent_id`, or the top level when `None`.
    pub fn list_folders(&self, organization_id: &str, parent_id: Option<&str>) -> Result<Vec<Folder>> {
        self.store.list_folders(organization_id, parent_id)
    }

    /// The chain from the top-level folder down to `id`, inclusive.
    pub fn folder_path(&self, id: &str) -> Result<Vec<Folder>> {
        let folder = self.get_folder(id)?;
        let mut path = self.store.list_folder_ancestors(id)?;
        path.push(folder);
        Ok(path)
    }

    pub fn move_folder(
        &self,
        id: &str,
        new_parent_id: Option<&str>,
        editor: Option<&str>,
    ) -> Result<Folder> {
        let patch = FolderPatch {
            parent_folder_id: Some(new_parent_id.map(str::to_string)),
            ..FolderPatch::default()
        };
        let folder = self.store.update_folder(id, &patch, &Stamp::now(editor))?;
        info!(
            "Moved folder {} under {}",
            id,
            new_parent_id.unwrap_or("top level")
        );
        Ok(folder)
    }

    pub fn rename_folder(&self, id: &str, new_name: &str, editor: Option<&str>) -> Result<Folder> {
        let patch = FolderPatch {
            name: Some(validate_folder_name(new_name)?),
            ..FolderPatch::default()
        };
        self.store.update_folder(id, &patch, &Stamp::now(editor))
    }

    /// Applies any combination of field changes, including name and parent.
    pub fn update_folder(
        &self,
        id: &str,
        mut patch: FolderPatch,
        editor: Option<&str>,
    ) -> Result<Folder> {
        if let Some(name) = &patch.name {
            patch.name = Some(validate_folder_name(name)?);
        }
        debug!("Updating folder {}", id);
        self.store.update_folder(id, &patch, &Stamp::now(editor))
    }

    /// Archiving never cascades; each folder carries its own flag.
    pub fn archive_folder(&self, id: &str, archived: bool, editor: Option<&str>) -> Result<Folder> {
        let patch = FolderPatch {
            is_archived: Some(archived),
            ..FolderPatch::default()
        };
        self.store.update_folder(id, &patch, &Stamp::now(editor))
    }

    /// Removes the folder and all descendant folders. Pages filed anywhere in
    /// the subtree survive with no folder.
    pub fn delete_folder(&self, id: &str) -> Result<FolderRemoval> {
        let removal = self.store.delete_folder(id, Utc::now())?;
        info!(
            "Deleted folder {} ({} folders removed, {} pages unfiled)",
            id, removal.folders_deleted, removal.pages_unfiled
        );
        Ok(removal)
    }
}
