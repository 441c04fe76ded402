pub const SCHEMA: &str = r#"
-- Identity tables are owned by the authentication service; the workspace
-- only references them.
CREATE TABLE IF NOT EXISTS organization (
    id TEXT PRIMARY KEY,
    name TEXT,
    slug TEXT UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "user" (
    id TEXT PRIMARY KEY,
    name TEXT,
    email TEXT UNIQUE,
    created_at TEXT NOT NULL
);

-- Folders (hierarchical, parent pointer)
CREATE TABLE IF NOT EXISTS workspace_folder (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL REFERENCES organization(id) ON DELETE CASCADE,
    parent_folder_id TEXT REFERENCES workspace_folder(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    icon TEXT,
    position INTEGER NOT NULL DEFAULT 0,
    is_archived INTEGER NOT NULL DEFAULT 0,
    created_by_id TEXT REFERENCES "user"(id) ON DELETE SET NULL,
    updated_by_id TEXT REFERENCES "user"(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Pages (hierarchical, optionally filed in a folder)
CREATE TABLE IF NOT EXISTS workspace_page (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL REFERENCES organization(id) ON DELETE CASCADE,
    folder_id TEXT REFERENCES workspace_folder(id) ON DELETE SET NULL,
    parent_page_id TEXT REFERENCES workspace_page(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    slug TEXT,
    icon TEXT,
    cover_image TEXT,
    summary TEXT,
    content TEXT NOT NULL DEFAULT '[]',
    properties TEXT NOT NULL DEFAULT '{}',
    is_archived INTEGER NOT NULL DEFAULT 0,
    is_favorite INTEGER NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0,
    published_at TEXT,
    created_by_id TEXT REFERENCES "user"(id) ON DELETE SET NULL,
    updated_by_id TEXT REFERENCES "user"(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Revisions are append-only snapshots
CREATE TABLE IF NOT EXISTS workspace_page_revision (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL REFERENCES workspace_page(id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    summary TEXT,
    content TEXT NOT NULL,
    properties TEXT NOT NULL,
    editor_id TEXT REFERENCES "user"(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS workspace_folder_org_idx ON workspace_folder(organization_id);
CREATE INDEX IF NOT EXISTS workspace_folder_parent_idx ON workspace_folder(organization_id, parent_folder_id);
-- NULL parents compare equal here so top-level siblings collide too
CREATE UNIQUE INDEX IF NOT EXISTS workspace_folder_parent_name_unq
    ON workspace_folder(organization_id, ifnull(parent_folder_id, ''), name);

CREATE INDEX IF NOT EXISTS workspace_page_org_idx ON workspace_page(organization_id);
CREATE INDEX IF NOT EXISTS workspace_page_folder_idx ON workspace_page(folder_id);
CREATE INDEX IF NOT EXISTS workspace_page_parent_idx ON workspace_page(parent_page_id);
CREATE UNIQUE INDEX IF NOT EXISTS workspace_page_slug_unq ON workspace_page(organization_id, slug);

CREATE INDEX IF NOT EXISTS workspace_page_revision_page_idx ON workspace_page_revision(page_id);
CREATE UNIQUE INDEX IF NOT EXISTS workspace_page_revision_version_unq
    ON workspace_page_revision(page_id, version);

CREATE TRIGGER IF NOT EXISTS workspace_page_revision_immutable
BEFORE UPDATE OF id, page_id, version, summary, content, properties, created_at
ON workspace_page_revision
BEGIN
    SELECT RAISE(ABORT, 'page revisions are immutable');
END;

-- Only the user ON DELETE SET NULL action may touch the editor
CREATE TRIGGER IF NOT EXISTS workspace_page_revision_editor_immutable
BEFORE UPDATE OF editor_id ON workspace_page_revision
WHEN NEW.editor_id IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'page revisions are immutable');
END;
"#;
