use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::Properties;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Pair with `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListFoldersParams {
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFolderRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub icon: Option<Option<String>>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MoveFolderRequest {
    /// `null` or absent moves the folder to the top level.
    #[serde(default)]
    pub parent_folder_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub favorite: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPagesParams {
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub parent_page_id: Option<String>,
    #[serde(default)]
    pub include_archived: Option<bool>,
    #[serde(default)]
    pub favorites: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub parent_page_id: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Raw block tree; shape errors are reported as validation failures.
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub properties: Option<Properties>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePageRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub slug: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cover_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub summary: Option<Option<String>>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub properties: Option<Properties>,
    #[serde(default)]
    pub position: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovePageRequest {
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub parent_page_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRevisionsParams {
    /// Return versions strictly greater than this one.
    #[serde(default)]
    pub after: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
}
