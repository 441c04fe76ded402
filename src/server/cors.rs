use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::auth::{ORGANIZATION_HEADER, USER_HEADER};
use crate::config::CorsConfig;
use crate::error::{Error, Result};

const WILDCARD: &str = "*";

/// Builds the CORS layer. A `*` origin allows any origin, which browsers
/// refuse to combine with credentials, so that pairing is a config error.
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer> {
    let allow_origin = if config.allowed_origins.iter().any(|o| o.trim() == WILDCARD) {
        if config.allow_credentials {
            return Err(Error::Config(
                "cors: allowed_origins '*' cannot be combined with allow_credentials".to_string(),
            ));
        }
        info!("CORS configured to allow any origin");
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(ORGANIZATION_HEADER),
            HeaderName::from_static(USER_HEADER),
        ])
        .max_age(Duration::from_secs(config.max_age_secs));

    if config.allow_credentials {
        cors = cors.allow_credentials(true);
    }

    Ok(cors)
}
