pub mod config;

pub use config::{DEFAULT_REGION, DEFAULT_TABLE, StoreConfig};
