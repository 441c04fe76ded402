use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{
    Connection, OptionalExtension, Row, TransactionBehavior, params, params_from_iter,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const FOLDER_COLUMNS: &str = "id, organization_id, parent_folder_id, name, description, icon, \
     position, is_archived, created_by_id, updated_by_id, created_at, updated_at";

const PAGE_COLUMNS: &str = "id, organization_id, folder_id, parent_page_id, title, slug, icon, \
     cover_image, summary, content, properties, is_archived, is_favorite, position, published_at, \
     created_by_id, updated_by_id, created_at, updated_at";

const REVISION_COLUMNS: &str =
    "id, page_id, version, summary, content, properties, editor_id, created_at";

const FOLDER_SUBTREE: &str = "WITH RECURSIVE subtree(id) AS (
    SELECT id FROM workspace_folder WHERE id = ?1
    UNION
    SELECT f.id FROM workspace_folder f JOIN subtree s ON f.parent_folder_id = s.id
)";

const PAGE_SUBTREE: &str = "WITH RECURSIVE subtree(id) AS (
    SELECT id FROM workspace_page WHERE id = ?1
    UNION
    SELECT p.id FROM workspace_page p JOIN subtree s ON p.parent_page_id = s.id
)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database. Nothing is shared between calls.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's own datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => datetime_column(row, idx).map(Some),
        None => Ok(None),
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        created_at: datetime_column(row, 3)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: datetime_column(row, 3)?,
    })
}

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        parent_folder_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        icon: row.get(5)?,
        position: row.get(6)?,
        is_archived: row.get(7)?,
        created_by_id: row.get(8)?,
        updated_by_id: row.get(9)?,
        created_at: datetime_column(row, 10)?,
        updated_at: datetime_column(row, 11)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        folder_id: row.get(2)?,
        parent_page_id: row.get(3)?,
        title: row.get(4)?,
        slug: row.get(5)?,
        icon: row.get(6)?,
        cover_image: row.get(7)?,
        summary: row.get(8)?,
        content: json_column(row, 9)?,
        properties: json_column(row, 10)?,
        is_archived: row.get(11)?,
        is_favorite: row.get(12)?,
        position: row.get(13)?,
        published_at: optional_datetime_column(row, 14)?,
        created_by_id: row.get(15)?,
        updated_by_id: row.get(16)?,
        created_at: datetime_column(row, 17)?,
        updated_at: datetime_column(row, 18)?,
    })
}

fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<PageRevision> {
    Ok(PageRevision {
        id: row.get(0)?,
        page_id: row.get(1)?,
        version: row.get(2)?,
        summary: row.get(3)?,
        content: json_column(row, 4)?,
        properties: json_column(row, 5)?,
        editor_id: row.get(6)?,
        created_at: datetime_column(row, 7)?,
    })
}

/// Counts rows of a subtree query keyed on its root id.
fn count_rows(conn: &Connection, sql: &str, root_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(sql, params![root_id], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
}

fn fetch_folder(conn: &Connection, id: &str) -> Result<Option<Folder>> {
    conn.query_row(
        &format!("SELECT {FOLDER_COLUMNS} FROM workspace_folder WHERE id = ?1"),
        params![id],
        folder_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn fetch_page(conn: &Connection, id: &str) -> Result<Option<Page>> {
    conn.query_row(
        &format!("SELECT {PAGE_COLUMNS} FROM workspace_page WHERE id = ?1"),
        params![id],
        page_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn fetch_revision(conn: &Connection, id: &str) -> Result<Option<PageRevision>> {
    conn.query_row(
        &format!("SELECT {REVISION_COLUMNS} FROM workspace_page_revision WHERE id = ?1"),
        params![id],
        revision_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn ensure_organization(conn: &Connection, id: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM organization WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(Error::not_found("organization", id));
    }
    Ok(())
}

/// A folder in another organization is reported as missing.
fn ensure_folder_in_org(conn: &Connection, organization_id: &str, folder_id: &str) -> Result<()> {
    match fetch_folder(conn, folder_id)? {
        Some(folder) if folder.organization_id == organization_id => Ok(()),
        _ => Err(Error::not_found("folder", folder_id)),
    }
}

fn ensure_page_in_org(conn: &Connection, organization_id: &str, page_id: &str) -> Result<()> {
    match fetch_page(conn, page_id)? {
        Some(page) if page.organization_id == organization_id => Ok(()),
        _ => Err(Error::not_found("page", page_id)),
    }
}

fn ensure_unique_folder_name(
    conn: &Connection,
    organization_id: &str,
    parent_id: Option<&str>,
    name: &str,
    exclude_id: &str,
) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM workspace_folder
             WHERE organization_id = ?1 AND parent_folder_id IS ?2 AND name = ?3 AND id != ?4",
            params![organization_id, parent_id, name, exclude_id],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_some() {
        return Err(duplicate_folder_name(name));
    }
    Ok(())
}

fn ensure_unique_slug(
    conn: &Connection,
    organization_id: &str,
    slug: &str,
    exclude_id: &str,
) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM workspace_page WHERE organization_id = ?1 AND slug = ?2 AND id != ?3",
            params![organization_id, slug, exclude_id],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_some() {
        return Err(duplicate_slug(slug));
    }
    Ok(())
}

fn duplicate_folder_name(name: &str) -> Error {
    Error::validation(format!(
        "a folder named '{name}' already exists in this location"
    ))
}

fn duplicate_slug(slug: &str) -> Error {
    Error::validation(format!("slug '{slug}' is already in use"))
}

#[derive(Debug, Clone, Copy)]
enum Hierarchy {
    Folders,
    Pages,
}

impl Hierarchy {
    fn parent_sql(self) -> &'static str {
        match self {
            Hierarchy::Folders => "SELECT parent_folder_id FROM workspace_folder WHERE id = ?1",
            Hierarchy::Pages => "SELECT parent_page_id FROM workspace_page WHERE id = ?1",
        }
    }

    fn count_sql(self) -> &'static str {
        match self {
            Hierarchy::Folders => "SELECT COUNT(*) FROM workspace_folder WHERE organization_id = ?1",
            Hierarchy::Pages => "SELECT COUNT(*) FROM workspace_page WHERE organization_id = ?1",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Hierarchy::Folders => "folder",
            Hierarchy::Pages => "page",
        }
    }
}

/// Walks parent links upward from `new_parent_id`. Reaching `node_id` means
/// the reparent would close a loop. The walk is bounded by the number of nodes
/// in the organization; running past the bound means the stored data already
/// loops, which is refused as well.
fn ensure_acyclic(
    conn: &Connection,
    hierarchy: Hierarchy,
    organization_id: &str,
    node_id: &str,
    new_parent_id: &str,
) -> Result<()> {
    let bound: i64 = conn.query_row(hierarchy.count_sql(), params![organization_id], |row| {
        row.get(0)
    })?;

    let mut current = Some(new_parent_id.to_string());
    let mut steps: i64 = 0;

    while let Some(id) = current {
        if id == node_id || steps > bound {
            let noun = hierarchy.noun();
            return Err(Error::Cycle(format!(
                "moving {noun} '{node_id}' under {noun} '{new_parent_id}' would make it its own ancestor"
            )));
        }
        steps += 1;
        current = conn
            .query_row(hierarchy.parent_sql(), params![id], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?
            .flatten();
    }

    Ok(())
}

/// Inserts a snapshot of `page` as the next version. Callers hold the write
/// transaction, so the MAX read and the insert see the same state.
fn insert_snapshot(
    conn: &Connection,
    revision_id: &str,
    page: &Page,
    stamp: &Stamp,
) -> Result<PageRevision> {
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM workspace_page_revision WHERE page_id = ?1",
        params![page.id],
        |row| row.get(0),
    )?;

    let revision = PageRevision {
        id: revision_id.to_string(),
        page_id: page.id.clone(),
        version,
        summary: page.summary.clone(),
        content: page.content.clone(),
        properties: page.properties.clone(),
        editor_id: stamp.user_id.clone(),
        created_at: stamp.at,
    };

    conn.execute(
        "INSERT INTO workspace_page_revision
             (id, page_id, version, summary, content, properties, editor_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            revision.id,
            revision.page_id,
            revision.version,
            revision.summary,
            to_json(&revision.content)?,
            to_json(&revision.properties)?,
            revision.editor_id,
            format_datetime(&revision.created_at),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::Conflict(format!(
                "version {version} of page '{}' was taken by a concurrent snapshot",
                page.id
            ))
        } else {
            Error::from(e)
        }
    })?;

    Ok(revision)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Identity references

    fn register_organization(&self, org: &Organization) -> Result<()> {
        self.conn().execute(
            "INSERT INTO organization (id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO NOTHING",
            params![org.id, org.name, org.slug, format_datetime(&org.created_at)],
        )?;
        Ok(())
    }

    fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        self.conn()
            .query_row(
                "SELECT id, name, slug, created_at FROM organization WHERE id = ?1",
                params![id],
                organization_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn delete_organization(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM organization WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn register_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO \"user\" (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO NOTHING",
            params![user.id, user.name, user.email, format_datetime(&user.created_at)],
        )?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                "SELECT id, name, email, created_at FROM \"user\" WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM \"user\" WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Folder operations

    fn create_folder(&self, folder: &Folder) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_organization(&tx, &folder.organization_id)?;
        if let Some(parent_id) = &folder.parent_folder_id {
            ensure_folder_in_org(&tx, &folder.organization_id, parent_id)?;
        }
        ensure_unique_folder_name(
            &tx,
            &folder.organization_id,
            folder.parent_folder_id.as_deref(),
            &folder.name,
            &folder.id,
        )?;

        tx.execute(
            "INSERT INTO workspace_folder
                 (id, organization_id, parent_folder_id, name, description, icon, position,
                  is_archived, created_by_id, updated_by_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                folder.id,
                folder.organization_id,
                folder.parent_folder_id,
                folder.name,
                folder.description,
                folder.icon,
                folder.position,
                folder.is_archived,
                folder.created_by_id,
                folder.updated_by_id,
                format_datetime(&folder.created_at),
                format_datetime(&folder.updated_at),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_folder_name(&folder.name)
            } else {
                Error::from(e)
            }
        })?;

        tx.commit()?;
        Ok(())
    }

    fn get_folder(&self, id: &str) -> Result<Option<Folder>> {
        fetch_folder(&self.conn(), id)
    }

    fn list_folders(&self, organization_id: &str, parent_id: Option<&str>) -> Result<Vec<Folder>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FOLDER_COLUMNS} FROM workspace_folder
             WHERE organization_id = ?1 AND parent_folder_id IS ?2
             ORDER BY position, name"
        ))?;

        let rows = stmt.query_map(params![organization_id, parent_id], folder_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_folder_ancestors(&self, id: &str) -> Result<Vec<Folder>> {
        let conn = self.conn();
        let folder = fetch_folder(&conn, id)?.ok_or_else(|| Error::not_found("folder", id))?;

        let mut seen = HashSet::from([folder.id.clone()]);
        let mut ancestors = Vec::new();
        let mut next = folder.parent_folder_id;

        while let Some(parent_id) = next {
            if !seen.insert(parent_id.clone()) {
                break;
            }
            let Some(parent) = fetch_folder(&conn, &parent_id)? else {
                break;
            };
            next = parent.parent_folder_id.clone();
            ancestors.push(parent);
        }

        ancestors.reverse();
        Ok(ancestors)
    }

    fn update_folder(&self, id: &str, patch: &FolderPatch, stamp: &Stamp) -> Result<Folder> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = fetch_folder(&tx, id)?.ok_or_else(|| Error::not_found("folder", id))?;
        let mut folder = current.clone();

        if let Some(parent) = &patch.parent_folder_id {
            if let Some(parent_id) = parent {
                ensure_folder_in_org(&tx, &folder.organization_id, parent_id)?;
                ensure_acyclic(
                    &tx,
                    Hierarchy::Folders,
                    &folder.organization_id,
                    id,
                    parent_id,
                )?;
            }
            folder.parent_folder_id = parent.clone();
        }
        if let Some(name) = &patch.name {
            folder.name = name.clone();
        }
        if let Some(description) = &patch.description {
            folder.description = description.clone();
        }
        if let Some(icon) = &patch.icon {
            folder.icon = icon.clone();
        }
        if let Some(position) = patch.position {
            folder.position = position;
        }
        if let Some(archived) = patch.is_archived {
            folder.is_archived = archived;
        }

        if folder.name != current.name || folder.parent_folder_id != current.parent_folder_id {
            ensure_unique_folder_name(
                &tx,
                &folder.organization_id,
                folder.parent_folder_id.as_deref(),
                &folder.name,
                id,
            )?;
        }

        folder.updated_at = stamp.at;
        if stamp.user_id.is_some() {
            folder.updated_by_id = stamp.user_id.clone();
        }

        tx.execute(
            "UPDATE workspace_folder
             SET parent_folder_id = ?1, name = ?2, description = ?3, icon = ?4, position = ?5,
                 is_archived = ?6, updated_by_id = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                folder.parent_folder_id,
                folder.name,
                folder.description,
                folder.icon,
                folder.position,
                folder.is_archived,
                folder.updated_by_id,
                format_datetime(&folder.updated_at),
                id,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                duplicate_folder_name(&folder.name)
            } else {
                Error::from(e)
            }
        })?;

        tx.commit()?;
        Ok(folder)
    }

    fn delete_folder(&self, id: &str, at: DateTime<Utc>) -> Result<FolderRemoval> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if fetch_folder(&tx, id)?.is_none() {
            return Err(Error::not_found("folder", id));
        }

        let folders_deleted = count_rows(
            &tx,
            &format!("{FOLDER_SUBTREE} SELECT COUNT(*) FROM subtree"),
            id,
        )?;
        let pages_unfiled = count_rows(
            &tx,
            &format!(
                "{FOLDER_SUBTREE}
                 SELECT COUNT(*) FROM workspace_page WHERE folder_id IN (SELECT id FROM subtree)"
            ),
            id,
        )?;

        tx.execute(
            &format!(
                "{FOLDER_SUBTREE}
                 UPDATE workspace_page SET folder_id = NULL, updated_at = ?2
                 WHERE folder_id IN (SELECT id FROM subtree)"
            ),
            params![id, format_datetime(&at)],
        )?;

        // Descendants go through the parent_folder_id cascade, which
        // changes() does not count.
        tx.execute(
            &format!(
                "{FOLDER_SUBTREE}
                 DELETE FROM workspace_folder WHERE id IN (SELECT id FROM subtree)"
            ),
            params![id],
        )?;

        tx.commit()?;
        Ok(FolderRemoval {
            folders_deleted,
            pages_unfiled,
        })
    }

    // Page operations

    fn create_page(&self, page: &Page) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_organization(&tx, &page.organization_id)?;
        if let Some(folder_id) = &page.folder_id {
            ensure_folder_in_org(&tx, &page.organization_id, folder_id)?;
        }
        if let Some(parent_id) = &page.parent_page_id {
            ensure_page_in_org(&tx, &page.organization_id, parent_id)?;
        }
        if let Some(slug) = &page.slug {
            ensure_unique_slug(&tx, &page.organization_id, slug, &page.id)?;
        }

        tx.execute(
            &format!(
                "INSERT INTO workspace_page ({PAGE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                         ?17, ?18, ?19)"
            ),
            params![
                page.id,
                page.organization_id,
                page.folder_id,
                page.parent_page_id,
                page.title,
                page.slug,
                page.icon,
                page.cover_image,
                page.summary,
                to_json(&page.content)?,
                to_json(&page.properties)?,
                page.is_archived,
                page.is_favorite,
                page.position,
                page.published_at.as_ref().map(format_datetime),
                page.created_by_id,
                page.updated_by_id,
                format_datetime(&page.created_at),
                format_datetime(&page.updated_at),
            ],
        )
        .map_err(|e| match (&page.slug, is_unique_violation(&e)) {
            (Some(slug), true) => duplicate_slug(slug),
            _ => Error::from(e),
        })?;

        tx.commit()?;
        Ok(())
    }

    fn get_page(&self, id: &str) -> Result<Option<Page>> {
        fetch_page(&self.conn(), id)
    }

    fn get_page_by_slug(&self, organization_id: &str, slug: &str) -> Result<Option<Page>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {PAGE_COLUMNS} FROM workspace_page
                     WHERE organization_id = ?1 AND slug = ?2"
                ),
                params![organization_id, slug],
                page_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_pages(&self, query: &PageQuery) -> Result<Vec<Page>> {
        let mut sql = format!("SELECT {PAGE_COLUMNS} FROM workspace_page WHERE organization_id = ?1");
        let mut args = vec![query.organization_id.clone()];

        if let Some(folder_id) = &query.folder_id {
            args.push(folder_id.clone());
            sql.push_str(&format!(" AND folder_id = ?{}", args.len()));
        }
        if let Some(parent_id) = &query.parent_page_id {
            args.push(parent_id.clone());
            sql.push_str(&format!(" AND parent_page_id = ?{}", args.len()));
        }
        if !query.include_archived {
            sql.push_str(" AND is_archived = 0");
        }
        if query.favorites_only {
            sql.push_str(" AND is_favorite = 1");
        }
        sql.push_str(" ORDER BY position, title, id");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), page_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_child_pages(&self, id: &str) -> Result<Vec<Page>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PAGE_COLUMNS} FROM workspace_page
             WHERE parent_page_id = ?1 ORDER BY position, title, id"
        ))?;

        let rows = stmt.query_map(params![id], page_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_page(&self, id: &str, patch: &PagePatch, stamp: &Stamp) -> Result<Page> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = fetch_page(&tx, id)?.ok_or_else(|| Error::not_found("page", id))?;
        let mut page = current.clone();

        if let Some(folder) = &patch.folder_id {
            if let Some(folder_id) = folder {
                ensure_folder_in_org(&tx, &page.organization_id, folder_id)?;
            }
            page.folder_id = folder.clone();
        }
        if let Some(parent) = &patch.parent_page_id {
            if let Some(parent_id) = parent {
                ensure_page_in_org(&tx, &page.organization_id, parent_id)?;
                ensure_acyclic(&tx, Hierarchy::Pages, &page.organization_id, id, parent_id)?;
            }
            page.parent_page_id = parent.clone();
        }
        if let Some(slug) = &patch.slug {
            if let Some(slug) = slug {
                if current.slug.as_deref() != Some(slug.as_str()) {
                    ensure_unique_slug(&tx, &page.organization_id, slug, id)?;
                }
            }
            page.slug = slug.clone();
        }
        if let Some(title) = &patch.title {
            page.title = title.clone();
        }
        if let Some(icon) = &patch.icon {
            page.icon = icon.clone();
        }
        if let Some(cover_image) = &patch.cover_image {
            page.cover_image = cover_image.clone();
        }
        if let Some(summary) = &patch.summary {
            page.summary = summary.clone();
        }
        if let Some(content) = &patch.content {
            page.content = content.clone();
        }
        if let Some(properties) = &patch.properties {
            page.properties = properties.clone();
        }
        if let Some(position) = patch.position {
            page.position = position;
        }
        if let Some(archived) = patch.is_archived {
            page.is_archived = archived;
        }
        if let Some(favorite) = patch.is_favorite {
            page.is_favorite = favorite;
        }

        page.updated_at = stamp.at;
        if stamp.user_id.is_some() {
            page.updated_by_id = stamp.user_id.clone();
        }

        tx.execute(
            "UPDATE workspace_page
             SET folder_id = ?1, parent_page_id = ?2, title = ?3, slug = ?4, icon = ?5,
                 cover_image = ?6, summary = ?7, content = ?8, properties = ?9,
                 is_archived = ?10, is_favorite = ?11, position = ?12,
                 updated_by_id = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                page.folder_id,
                page.parent_page_id,
                page.title,
                page.slug,
                page.icon,
                page.cover_image,
                page.summary,
                to_json(&page.content)?,
                to_json(&page.properties)?,
                page.is_archived,
                page.is_favorite,
                page.position,
                page.updated_by_id,
                format_datetime(&page.updated_at),
                id,
            ],
        )
        .map_err(|e| match (&page.slug, is_unique_violation(&e)) {
            (Some(slug), true) => duplicate_slug(slug),
            _ => Error::from(e),
        })?;

        tx.commit()?;
        Ok(page)
    }

    fn publish_page(&self, id: &str, stamp: &Stamp) -> Result<Page> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut page = fetch_page(&tx, id)?.ok_or_else(|| Error::not_found("page", id))?;
        if page.published_at.is_some() {
            return Ok(page);
        }

        page.published_at = Some(stamp.at);
        page.updated_at = stamp.at;
        if stamp.user_id.is_some() {
            page.updated_by_id = stamp.user_id.clone();
        }

        tx.execute(
            "UPDATE workspace_page SET published_at = ?1, updated_by_id = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                format_datetime(&stamp.at),
                page.updated_by_id,
                format_datetime(&page.updated_at),
                id,
            ],
        )?;

        tx.commit()?;
        Ok(page)
    }

    fn delete_page(&self, id: &str) -> Result<PageRemoval> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if fetch_page(&tx, id)?.is_none() {
            return Err(Error::not_found("page", id));
        }

        let pages_deleted = count_rows(
            &tx,
            &format!("{PAGE_SUBTREE} SELECT COUNT(*) FROM subtree"),
            id,
        )?;

        let revisions_deleted = tx.execute(
            &format!(
                "{PAGE_SUBTREE}
                 DELETE FROM workspace_page_revision WHERE page_id IN (SELECT id FROM subtree)"
            ),
            params![id],
        )?;

        tx.execute(
            &format!(
                "{PAGE_SUBTREE}
                 DELETE FROM workspace_page WHERE id IN (SELECT id FROM subtree)"
            ),
            params![id],
        )?;

        tx.commit()?;
        Ok(PageRemoval {
            pages_deleted,
            revisions_deleted,
        })
    }

    // Revision operations

    fn create_revision(
        &self,
        page_id: &str,
        revision_id: &str,
        stamp: &Stamp,
    ) -> Result<PageRevision> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let page = fetch_page(&tx, page_id)?.ok_or_else(|| Error::not_found("page", page_id))?;
        let revision = insert_snapshot(&tx, revision_id, &page, stamp)?;

        tx.commit()?;
        Ok(revision)
    }

    fn get_revision(&self, id: &str) -> Result<Option<PageRevision>> {
        fetch_revision(&self.conn(), id)
    }

    fn list_revisions(
        &self,
        page_id: &str,
        after_version: i64,
        limit: usize,
    ) -> Result<Vec<PageRevision>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVISION_COLUMNS} FROM workspace_page_revision
             WHERE page_id = ?1 AND version > ?2 ORDER BY version LIMIT ?3"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![page_id, after_version, limit], revision_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn restore_revision(
        &self,
        revision_id: &str,
        backup_id: &str,
        stamp: &Stamp,
    ) -> Result<(Page, PageRevision)> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let revision = fetch_revision(&tx, revision_id)?
            .ok_or_else(|| Error::not_found("revision", revision_id))?;
        let mut page = fetch_page(&tx, &revision.page_id)?
            .ok_or_else(|| Error::not_found("page", &revision.page_id))?;

        let backup = insert_snapshot(&tx, backup_id, &page, stamp)?;

        page.summary = revision.summary;
        page.content = revision.content;
        page.properties = revision.properties;
        page.updated_at = stamp.at;
        if stamp.user_id.is_some() {
            page.updated_by_id = stamp.user_id.clone();
        }

        tx.execute(
            "UPDATE workspace_page
             SET summary = ?1, content = ?2, properties = ?3, updated_by_id = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                page.summary,
                to_json(&page.content)?,
                to_json(&page.properties)?,
                page.updated_by_id,
                format_datetime(&page.updated_at),
                page.id,
            ],
        )?;

        tx.commit()?;
        Ok((page, backup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn org(id: &str) -> Organization {
        Organization {
            id: id.to_string(),
            name: Some(format!("Org {id}")),
            slug: None,
            created_at: Utc::now(),
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: None,
            email: Some(format!("{id}@example.com")),
            created_at: Utc::now(),
        }
    }

    fn folder(id: &str, org: &str, parent: Option<&str>, name: &str) -> Folder {
        let now = Utc::now();
        Folder {
            id: id.to_string(),
            organization_id: org.to_string(),
            parent_folder_id: parent.map(str::to_string),
            name: name.to_string(),
            description: None,
            icon: None,
            position: 0,
            is_archived: false,
            created_by_id: None,
            updated_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn page(id: &str, org: &str, slug: Option<&str>) -> Page {
        let now = Utc::now();
        Page {
            id: id.to_string(),
            organization_id: org.to_string(),
            folder_id: None,
            parent_page_id: None,
            title: format!("Page {id}"),
            slug: slug.map(str::to_string),
            icon: None,
            cover_image: None,
            summary: None,
            content: Vec::new(),
            properties: Properties::new(),
            is_archived: false,
            is_favorite: false,
            position: 0,
            published_at: None,
            created_by_id: None,
            updated_by_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store.register_organization(&org("org-1")).unwrap();
        store.register_organization(&org("org-2")).unwrap();
        store.register_user(&user("user-1")).unwrap();
        store
    }

    fn count(store: &SqliteStore, sql: &str) -> i64 {
        store.conn().query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        // Idempotent
        store.initialize().unwrap();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"organization".to_string()));
        assert!(tables.contains(&"user".to_string()));
        assert!(tables.contains(&"workspace_folder".to_string()));
        assert!(tables.contains(&"workspace_page".to_string()));
        assert!(tables.contains(&"workspace_page_revision".to_string()));
    }

    #[test]
    fn test_register_organization_is_idempotent() {
        let store = store();
        let mut renamed = org("org-1");
        renamed.name = Some("Renamed".to_string());
        store.register_organization(&renamed).unwrap();

        let fetched = store.get_organization("org-1").unwrap().unwrap();
        assert_eq!(fetched.name.as_deref(), Some("Org org-1"));
    }

    #[test]
    fn test_sibling_folder_names() {
        let store = store();
        store.create_folder(&folder("a", "org-1", None, "Docs")).unwrap();
        store.create_folder(&folder("b", "org-1", Some("a"), "Docs")).unwrap();

        let result = store.create_folder(&folder("c", "org-1", None, "Docs"));
        assert!(matches!(result, Err(Error::Validation(_))));

        // Another organization has its own namespace
        store.create_folder(&folder("d", "org-2", None, "Docs")).unwrap();
    }

    #[test]
    fn test_top_level_unique_index_without_application_check() {
        let store = store();
        store.create_folder(&folder("a", "org-1", None, "Docs")).unwrap();

        let now = format_datetime(&Utc::now());
        let result = store.conn().execute(
            "INSERT INTO workspace_folder (id, organization_id, name, created_at, updated_at)
             VALUES ('x', 'org-1', 'Docs', ?1, ?1)",
            params![now],
        );
        assert!(is_unique_violation(&result.unwrap_err()));
    }

    #[test]
    fn test_parent_folder_must_share_organization() {
        let store = store();
        store.create_folder(&folder("a", "org-1", None, "Docs")).unwrap();

        let result = store.create_folder(&folder("b", "org-2", Some("a"), "Nested"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_unknown_organization() {
        let store = store();
        let result = store.create_folder(&folder("a", "missing", None, "Docs"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_folder_move_rejects_cycle() {
        let store = store();
        store.create_folder(&folder("a", "org-1", None, "A")).unwrap();
        store.create_folder(&folder("b", "org-1", Some("a"), "B")).unwrap();
        store.create_folder(&folder("c", "org-1", Some("b"), "C")).unwrap();

        let stamp = Stamp::now(None);
        let into_grandchild = FolderPatch {
            parent_folder_id: Some(Some("c".to_string())),
            ..FolderPatch::default()
        };
        let result = store.update_folder("a", &into_grandchild, &stamp);
        assert!(matches!(result, Err(Error::Cycle(_))));

        let into_self = FolderPatch {
            parent_folder_id: Some(Some("a".to_string())),
            ..FolderPatch::default()
        };
        assert!(matches!(
            store.update_folder("a", &into_self, &stamp),
            Err(Error::Cycle(_))
        ));

        let ancestors = store.list_folder_ancestors("c").unwrap();
        let ids: Vec<_> = ancestors.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_delete_folder_unfiles_nested_pages() {
        let store = store();
        store.create_folder(&folder("a", "org-1", None, "A")).unwrap();
        store.create_folder(&folder("b", "org-1", Some("a"), "B")).unwrap();
        store.create_folder(&folder("keep", "org-1", None, "Keep")).unwrap();

        let mut p1 = page("p1", "org-1", None);
        p1.folder_id = Some("a".to_string());
        let mut p2 = page("p2", "org-1", None);
        p2.folder_id = Some("b".to_string());
        let mut p3 = page("p3", "org-1", None);
        p3.folder_id = Some("keep".to_string());
        for p in [&p1, &p2, &p3] {
            store.create_page(p).unwrap();
        }

        let removal = store.delete_folder("a", Utc::now()).unwrap();
        assert_eq!(removal.folders_deleted, 2);
        assert_eq!(removal.pages_unfiled, 2);

        assert!(store.get_folder("b").unwrap().is_none());
        assert!(store.get_page("p1").unwrap().unwrap().folder_id.is_none());
        assert!(store.get_page("p2").unwrap().unwrap().folder_id.is_none());
        assert_eq!(
            store.get_page("p3").unwrap().unwrap().folder_id.as_deref(),
            Some("keep")
        );
    }

    #[test]
    fn test_delete_folder_counts_cascaded_descendants() {
        let store = store();
        store.create_folder(&folder("a", "org-1", None, "A")).unwrap();
        store.create_folder(&folder("b", "org-1", Some("a"), "B")).unwrap();
        store.create_folder(&folder("c", "org-1", Some("b"), "C")).unwrap();

        let mut deep = page("deep", "org-1", None);
        deep.folder_id = Some("c".to_string());
        store.create_page(&deep).unwrap();

        let removal = store.delete_folder("a", Utc::now()).unwrap();
        assert_eq!(removal.folders_deleted, 3);
        assert_eq!(removal.pages_unfiled, 1);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM workspace_folder"), 0);
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let store = store();
        store
            .conn()
            .execute(
                "UPDATE organization SET created_at = 'yesterday' WHERE id = 'org-1'",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.get_organization("org-1"),
            Err(Error::Database(_))
        ));
        assert!(store.get_organization("org-2").unwrap().is_some());
    }

    #[test]
    fn test_slug_uniqueness_is_per_organization() {
        let store = store();
        store.create_page(&page("p1", "org-1", Some("intro"))).unwrap();

        let dup = store.create_page(&page("p2", "org-1", Some("intro")));
        assert!(matches!(dup, Err(Error::Validation(_))));

        store.create_page(&page("p3", "org-1", None)).unwrap();
        store.create_page(&page("p4", "org-1", None)).unwrap();
        store.create_page(&page("p5", "org-2", Some("intro"))).unwrap();

        let found = store.get_page_by_slug("org-2", "intro").unwrap().unwrap();
        assert_eq!(found.id, "p5");
    }

    #[test]
    fn test_content_round_trips_through_json_columns() {
        let store = store();
        let mut p = page("p1", "org-1", None);
        p.content = vec![
            ContentBlock::new("b1", "paragraph")
                .with_data("text", "hello")
                .with_children(vec![ContentBlock::new("b2", "mention")]),
        ];
        p.properties.insert("status".to_string(), serde_json::json!("draft"));
        store.create_page(&p).unwrap();

        let fetched = store.get_page("p1").unwrap().unwrap();
        assert_eq!(fetched.content, p.content);
        assert_eq!(fetched.properties, p.properties);
    }

    #[test]
    fn test_delete_page_removes_subtree_and_revisions() {
        let store = store();
        store.create_page(&page("root", "org-1", None)).unwrap();
        let mut child = page("child", "org-1", None);
        child.parent_page_id = Some("root".to_string());
        store.create_page(&child).unwrap();
        let mut grandchild = page("grandchild", "org-1", None);
        grandchild.parent_page_id = Some("child".to_string());
        store.create_page(&grandchild).unwrap();
        store.create_page(&page("other", "org-1", None)).unwrap();

        let stamp = Stamp::now(None);
        store.create_revision("root", "r1", &stamp).unwrap();
        store.create_revision("grandchild", "r2", &stamp).unwrap();
        store.create_revision("other", "r3", &stamp).unwrap();

        let removal = store.delete_page("root").unwrap();
        assert_eq!(removal.pages_deleted, 3);
        assert_eq!(removal.revisions_deleted, 2);

        assert_eq!(count(&store, "SELECT COUNT(*) FROM workspace_page"), 1);
        assert_eq!(
            count(&store, "SELECT COUNT(*) FROM workspace_page_revision"),
            1
        );
    }

    #[test]
    fn test_revisions_are_immutable() {
        let store = store();
        store.create_page(&page("p1", "org-1", None)).unwrap();
        store
            .create_revision("p1", "r1", &Stamp::now(None))
            .unwrap();

        let result = store.conn().execute(
            "UPDATE workspace_page_revision SET version = 7 WHERE id = 'r1'",
            [],
        );
        assert!(result.is_err());
        assert_eq!(store.get_revision("r1").unwrap().unwrap().version, 1);
    }

    #[test]
    fn test_delete_organization_cascades() {
        let store = store();
        store.create_folder(&folder("a", "org-1", None, "A")).unwrap();
        let mut p = page("p1", "org-1", None);
        p.folder_id = Some("a".to_string());
        store.create_page(&p).unwrap();
        store.create_revision("p1", "r1", &Stamp::now(None)).unwrap();
        store.create_page(&page("p2", "org-2", None)).unwrap();

        assert!(store.delete_organization("org-1").unwrap());

        assert_eq!(count(&store, "SELECT COUNT(*) FROM workspace_folder"), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM workspace_page"), 1);
        assert_eq!(
            count(&store, "SELECT COUNT(*) FROM workspace_page_revision"),
            0
        );
    }

    #[test]
    fn test_delete_user_clears_attribution() {
        let store = store();
        let mut f = folder("a", "org-1", None, "A");
        f.created_by_id = Some("user-1".to_string());
        store.create_folder(&f).unwrap();
        let mut p = page("p1", "org-1", None);
        p.created_by_id = Some("user-1".to_string());
        store.create_page(&p).unwrap();
        let revision = store
            .create_revision("p1", "r1", &Stamp::now(Some("user-1")))
            .unwrap();
        assert_eq!(revision.editor_id.as_deref(), Some("user-1"));

        assert!(store.delete_user("user-1").unwrap());

        assert!(store.get_folder("a").unwrap().unwrap().created_by_id.is_none());
        assert!(store.get_page("p1").unwrap().unwrap().created_by_id.is_none());
        assert!(store.get_revision("r1").unwrap().unwrap().editor_id.is_none());
    }

    #[test]
    fn test_snapshots_from_separate_connections_stay_contiguous() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("shared.db");
        let first = SqliteStore::new(&path).unwrap();
        first.initialize().unwrap();
        first.register_organization(&org("org-1")).unwrap();
        first.create_page(&page("p1", "org-1", None)).unwrap();
        let second = SqliteStore::new(&path).unwrap();

        std::thread::scope(|scope| {
            for (n, store) in [&first, &second].into_iter().enumerate() {
                scope.spawn(move || {
                    for i in 0..10 {
                        store
                            .create_revision("p1", &format!("r-{n}-{i}"), &Stamp::now(None))
                            .unwrap();
                    }
                });
            }
        });

        let versions: Vec<i64> = first
            .list_revisions("p1", 0, 100)
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, (1..=20).collect::<Vec<_>>());
    }
}
