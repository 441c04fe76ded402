//! Invariant-preserving operations over folders, pages and revisions.
//!
//! Managers validate input at the boundary, assign ids and timestamps, and
//! hand each operation to the [`Store`] as a single transaction. The store
//! handle is passed in explicitly so a workspace can run against any backend.

mod folders;
mod pages;
mod revisions;
pub mod validation;

use std::sync::Arc;

pub use folders::FolderManager;
pub use pages::PageManager;
pub use revisions::{RevisionHistory, RevisionIter, RevisionManager, RestoredRevision};

use crate::store::Store;

pub struct Workspace {
    pub folders: FolderManager,
    pub pages: PageManager,
    pub revisions: RevisionManager,
}

impl Workspace {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            folders: FolderManager::new(Arc::clone(&store)),
            pages: PageManager::new(Arc::clone(&store)),
            revisions: RevisionManager::new(store),
        }
    }
}
