//! Config file resolution.

use std::path::{Path, PathBuf};

/// Config file used when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "freeview-epg.toml";

/// Resolves the config file path.
///
/// - If `path` is `Some`, it is used as is.
/// - Otherwise returns `freeview-epg.toml` in the working directory.
#[must_use]
pub fn resolve_config_path(path: Option<&Path>) -> PathBuf {
    path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf)
}
