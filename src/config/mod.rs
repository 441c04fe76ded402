mod server;

pub use server::{CorsConfig, ServerConfig};
