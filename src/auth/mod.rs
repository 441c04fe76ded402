//! Caller identity for the HTTP layer.
//!
//! Authentication happens upstream; requests arrive with the organization and
//! user already established in headers, which are trusted as given.

mod identity;

pub use identity::{AuthError, Identity, ORGANIZATION_HEADER, RequireIdentity, USER_HEADER};
