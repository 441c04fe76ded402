use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error};

use crate::server::AppState;
use crate::store::Store;
use crate::types::{Organization, User};

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const USER_HEADER: &str = "x-user-id";

const MAX_ID_LEN: usize = 128;

/// The organization a request acts within, and the user acting, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub organization_id: String,
    pub user_id: Option<String>,
}

impl Identity {
    pub fn user(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

/// Extractor that requires an organization and registers both identities so
/// attribution references resolve.
pub struct RequireIdentity(pub Identity);

#[derive(Debug)]
pub enum AuthError {
    MissingOrganization,
    InvalidHeader(&'static str),
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingOrganization => (
                StatusCode::UNAUTHORIZED,
                "Organization context required".to_string(),
            ),
            AuthError::InvalidHeader(name) => {
                (StatusCode::BAD_REQUEST, format!("Invalid {name} header"))
            }
            AuthError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = json!({ "data": null, "error": message });
        (status, Json(body)).into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for RequireIdentity {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let organization_id = header_value(parts, ORGANIZATION_HEADER, "X-Organization-Id")?
            .ok_or(AuthError::MissingOrganization)?;
        let user_id = header_value(parts, USER_HEADER, "X-User-Id")?;

        let identity = Identity {
            organization_id,
            user_id,
        };
        register(state.store.as_ref(), &identity).map_err(|e| {
            error!("Failed to register identity: {}", e);
            AuthError::InternalError
        })?;

        Ok(RequireIdentity(identity))
    }
}

fn header_value(
    parts: &Parts,
    header: &str,
    display: &'static str,
) -> Result<Option<String>, AuthError> {
    let Some(value) = parts.headers.get(header) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidHeader(display))?
        .trim();

    if value.is_empty() {
        return Ok(None);
    }
    if value.len() > MAX_ID_LEN || value.chars().any(char::is_control) {
        return Err(AuthError::InvalidHeader(display));
    }

    Ok(Some(value.to_string()))
}

fn register(store: &dyn Store, identity: &Identity) -> crate::error::Result<()> {
    if store.get_organization(&identity.organization_id)?.is_none() {
        debug!("Registering organization {}", identity.organization_id);
        store.register_organization(&Organization {
            id: identity.organization_id.clone(),
            name: None,
            slug: None,
            created_at: Utc::now(),
        })?;
    }

    if let Some(user_id) = &identity.user_id {
        if store.get_user(user_id)?.is_none() {
            debug!("Registering user {}", user_id);
            store.register_user(&User {
                id: user_id.clone(),
                name: None,
                email: None,
                created_at: Utc::now(),
            })?;
        }
    }

    Ok(())
}
