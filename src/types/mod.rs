mod changes;
mod content;
mod models;

pub use changes::*;
pub use content::*;
pub use models::*;
