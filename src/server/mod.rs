mod cors;
pub mod dto;
pub mod response;
mod router;
mod workspace;

pub use cors::cors_layer;
pub use router::{AppState, create_router};
pub use workspace::workspace_router;
