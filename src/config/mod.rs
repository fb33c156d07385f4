//! Application configuration (`config.toml`)

mod config;

pub use config::{Config, StorageBackend, StorageConfig, CONFIG_DIR_ENV};
