use crate::error::{Error, Result};

const MAX_FOLDER_NAME_LEN: usize = 255;
const MAX_PAGE_TITLE_LEN: usize = 512;
const MAX_SLUG_LEN: usize = 128;

fn validate_text(value: &str, entity: &str, max_len: usize) -> Result<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(Error::validation(format!("{entity} cannot be empty")));
    }
    if value.chars().count() > max_len {
        return Err(Error::validation(format!(
            "{entity} cannot exceed {max_len} characters"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::validation(format!(
            "{entity} contains invalid characters"
        )));
    }

    Ok(value.to_string())
}

/// Returns the trimmed folder name.
pub fn validate_folder_name(name: &str) -> Result<String> {
    validate_text(name, "Folder name", MAX_FOLDER_NAME_LEN)
}

/// Returns the trimmed page title.
pub fn validate_page_title(title: &str) -> Result<String> {
    validate_text(title, "Page title", MAX_PAGE_TITLE_LEN)
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() {
        return Err(Error::validation("Slug cannot be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(Error::validation(format!(
            "Slug cannot exceed {MAX_SLUG_LEN} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(Error::validation(
            "Slug can only contain lowercase letters, digits, and hyphens",
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(Error::validation(
            "Slug cannot start or end with a hyphen",
        ));
    }
    Ok(())
}
