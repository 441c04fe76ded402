//! # Folio
//!
//! A workspace content store: hierarchical folders, block-structured pages and
//! append-only page revisions, scoped per organization. Usable as a standalone
//! server binary or as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! folio = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use folio::store::{SqliteStore, Store};
//! use folio::types::NewFolder;
//! use folio::workspace::Workspace;
//!
//! let store = SqliteStore::new("./data/folio.db").unwrap();
//! store.initialize().unwrap();
//!
//! let workspace = Workspace::new(Arc::new(store));
//! let docs = workspace.folders.create_folder(NewFolder {
//!     organization_id: "org-1".to_string(),
//!     name: "Docs".to_string(),
//!     ..NewFolder::default()
//! })?;
//! ```
//!
//! To serve the HTTP API, wrap the store in [`server::AppState`] and hand it to
//! [`server::create_router`].
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `folio` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
pub mod workspace;
