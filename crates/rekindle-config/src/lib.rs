mod error;
mod loader;
mod raw;

pub use error::ConfigError;
pub use loader::{load_catalog, load_catalog_or_default};
