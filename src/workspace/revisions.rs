use std::sync::Arc;
use std::vec;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Page, PageRevision, Stamp};

const DEFAULT_BATCH_SIZE: usize = 100;

/// The page after a restore, plus the snapshot of what it held just before.
#[derive(Debug, Clone, Serialize)]
pub struct RestoredRevision {
    pub page: Page,
    pub backup: PageRevision,
}

pub struct RevisionManager {
    store: Arc<dyn Store>,
}

impl RevisionManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records the page's current summary, content and properties as the next
    /// version. Snapshots are only taken when asked for.
    pub fn snapshot_page(&self, page_id: &str, editor: Option<&str>) -> Result<PageRevision> {
        let revision = retry_once_on_conflict(|| {
            self.store
                .create_revision(page_id, &Uuid::new_v4().to_string(), &Stamp::now(editor))
        })?;
        info!("Recorded version {} of page {}", revision.version, page_id);
        Ok(revision)
    }

    pub fn get_revision(&self, id: &str) -> Result<PageRevision> {
        self.store
            .get_revision(id)?
            .ok_or_else(|| Error::not_found("revision", id))
    }

    /// Full history of a page in ascending version order. Nothing is read
    /// until the history is iterated.
    pub fn list_revisions(&self, page_id: &str) -> Result<RevisionHistory> {
        if self.store.get_page(page_id)?.is_none() {
            return Err(Error::not_found("page", page_id));
        }
        Ok(RevisionHistory {
            store: Arc::clone(&self.store),
            page_id: page_id.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// One page of history: versions strictly greater than `after_version`.
    pub fn list_revisions_after(
        &self,
        page_id: &str,
        after_version: i64,
        limit: usize,
    ) -> Result<Vec<PageRevision>> {
        if self.store.get_page(page_id)?.is_none() {
            return Err(Error::not_found("page", page_id));
        }
        self.store.list_revisions(page_id, after_version, limit)
    }

    /// Brings a page back to an earlier revision. The live state is first
    /// recorded as a new version, so a restore can itself be undone.
    pub fn restore_revision(
        &self,
        revision_id: &str,
        editor: Option<&str>,
    ) -> Result<RestoredRevision> {
        let (page, backup) = retry_once_on_conflict(|| {
            self.store.restore_revision(
                revision_id,
                &Uuid::new_v4().to_string(),
                &Stamp::now(editor),
            )
        })?;
        info!(
            "Restored page {} from revision {} (backup version {})",
            page.id, revision_id, backup.version
        );
        Ok(RestoredRevision { page, backup })
    }
}

/// A concurrent snapshot may claim the version number between our read and
/// insert. The store refuses the duplicate, and a second attempt sees the new
/// maximum.
fn retry_once_on_conflict<T>(mut op: impl FnMut() -> Result<T>) -> Result<T> {
    match op() {
        Err(Error::Conflict(msg)) => {
            warn!("Retrying after version conflict: {}", msg);
            op()
        }
        other => other,
    }
}

/// Lazily paged revision history for one page.
pub struct RevisionHistory {
    store: Arc<dyn Store>,
    page_id: String,
    batch_size: usize,
}

impl RevisionHistory {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Starts a fresh pass over the history. Each call re-reads the store.
    pub fn iter(&self) -> RevisionIter<'_> {
        self.iter_after(0)
    }

    /// Resumes after a version seen in an earlier pass.
    pub fn iter_after(&self, version: i64) -> RevisionIter<'_> {
        RevisionIter {
            history: self,
            after_version: version,
            buffer: Vec::new().into_iter(),
            exhausted: false,
        }
    }
}

impl<'a> IntoIterator for &'a RevisionHistory {
    type Item = Result<PageRevision>;
    type IntoIter = RevisionIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct RevisionIter<'a> {
    history: &'a RevisionHistory,
    after_version: i64,
    buffer: vec::IntoIter<PageRevision>,
    exhausted: bool,
}

impl RevisionIter<'_> {
    fn fill(&mut self) -> Result<()> {
        let batch = self.history.store.list_revisions(
            &self.history.page_id,
            self.after_version,
            self.history.batch_size,
        )?;
        if batch.len() < self.history.batch_size {
            self.exhausted = true;
        }
        self.buffer = batch.into_iter();
        Ok(())
    }
}

impl Iterator for RevisionIter<'_> {
    type Item = Result<PageRevision>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(revision) = self.buffer.next() {
                self.after_version = revision.version;
                return Some(Ok(revision));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fill() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}
