use crate::auth::Identity;
use crate::error::Error;
use crate::server::response::ApiError;
use crate::types::{Folder, OrganizationScoped, Page, PageRevision};
use crate::workspace::Workspace;

/// Entities of other organizations are reported as missing, never as
/// forbidden, so ids cannot be probed across tenants.
fn within_organization<T: OrganizationScoped>(
    entity: T,
    identity: &Identity,
    kind: &str,
    id: &str,
) -> Result<T, ApiError> {
    if entity.organization_id() == identity.organization_id {
        Ok(entity)
    } else {
        Err(Error::not_found(kind, id).into())
    }
}

pub fn load_folder(ws: &Workspace, identity: &Identity, id: &str) -> Result<Folder, ApiError> {
    let folder = ws.folders.get_folder(id)?;
    within_organization(folder, identity, "folder", id)
}

pub fn load_page(ws: &Workspace, identity: &Identity, id: &str) -> Result<Page, ApiError> {
    let page = ws.pages.get_page(id)?;
    within_organization(page, identity, "page", id)
}

/// Revisions inherit the organization of their page.
pub fn load_revision(
    ws: &Workspace,
    identity: &Identity,
    id: &str,
) -> Result<PageRevision, ApiError> {
    let revision = ws.revisions.get_revision(id)?;
    match ws.pages.get_page(&revision.page_id) {
        Ok(page) if page.organization_id == identity.organization_id => Ok(revision),
        Ok(_) | Err(Error::NotFound(_)) => Err(Error::not_found("revision", id).into()),
        Err(e) => Err(e.into()),
    }
}
