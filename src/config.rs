use anyhow::Result;
use std::env;
use std::path::PathBuf;

pub const APP_NAME: &str = "luaup";
pub const API_URL: &str = "https://api.github.com/repos/luau-lang/luau/releases/latest";
pub const ASSET_NAME: &str = "luau-windows.zip";
pub const INSTALL_DIR_NAME: &str = ".luau";

pub const API_URL_ENV: &str = "LUAUP_API_URL";
pub const ASSET_NAME_ENV: &str = "LUAUP_ASSET_NAME";
pub const INSTALL_DIR_ENV: &str = "LUAUP_INSTALL_DIR";
pub const ENV_FILE_ENV: &str = "LUAUP_ENV_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub asset_name: String,
    pub install_dir: PathBuf,
    pub temp_archive_path: PathBuf,
    /// JSON file standing in for the user environment store.
    pub env_file: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let install_dir = match non_empty_var(INSTALL_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => get_user_home_dir()?.join(INSTALL_DIR_NAME),
        };
        let asset_name = non_empty_var(ASSET_NAME_ENV).unwrap_or_else(|| ASSET_NAME.to_string());

        let settings = Self {
            api_url: non_empty_var(API_URL_ENV).unwrap_or_else(|| API_URL.to_string()),
            temp_archive_path: env::temp_dir().join(&asset_name),
            asset_name,
            install_dir,
            env_file: non_empty_var(ENV_FILE_ENV).map(PathBuf::from),
        };

        tracing::debug!("Resolved settings: {:?}", settings);
        Ok(settings)
    }

    /// Short name of the installation directory for progress messages.
    pub fn install_dir_name(&self) -> String {
        self.install_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.install_dir.display().to_string())
    }
}

pub fn get_user_home_dir() -> Result<PathBuf> {
    let path = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    tracing::debug!("User home directory: {}", path.display());
    Ok(path)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
