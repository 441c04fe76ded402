use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentBlock, Properties};

/// Tenant boundary. Rows are owned by the authentication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Identity used for attribution. Rows are owned by the authentication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub organization_id: String,
    pub parent_folder_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub position: i64,
    pub is_archived: bool,
    pub created_by_id: Option<String>,
    pub updated_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub organization_id: String,
    pub folder_id: Option<String>,
    pub parent_page_id: Option<String>,
    pub title: String,
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub content: Vec<ContentBlock>,
    pub properties: Properties,
    pub is_archived: bool,
    pub is_favorite: bool,
    pub position: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by_id: Option<String>,
    pub updated_by_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }
}

/// Immutable snapshot of a page's summary, content and properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRevision {
    pub id: String,
    pub page_id: String,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub content: Vec<ContentBlock>,
    pub properties: Properties,
    pub editor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Anything that lives inside exactly one organization.
pub trait OrganizationScoped {
    fn organization_id(&self) -> &str;
}

impl OrganizationScoped for Folder {
    fn organization_id(&self) -> &str {
        &self.organization_id
    }
}

impl OrganizationScoped for Page {
    fn organization_id(&self) -> &str {
        &self.organization_id
    }
}
