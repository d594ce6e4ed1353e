//! Application configuration module.
//!
//! Manages the TOML config file carrying guide and HTTP settings.

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::{AppConfig, GuideConfig, HttpConfig};
pub use paths::resolve_config_path;
