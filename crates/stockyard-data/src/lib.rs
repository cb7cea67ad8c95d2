pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, LogisticsConfig, load_logistics_config, load_logistics_dir};
