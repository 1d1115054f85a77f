use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment override for the directory holding `config.json`.
pub const CONFIG_DIR_ENV: &str = "GHOSTKEYS_CONFIG_DIR";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Some(PathBuf::from(dir));
            }
        }
        ProjectDirs::from("", "", "ghostkeys").map(|pd| pd.config_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }
}
