//! User-scoped PATH registration
//!
//! The user environment is reached through [`EnvStore`] so the PATH edits can
//! run against the Windows registry, a JSON file, or memory in tests. Edits
//! are structured: the value is split into entries, matched exactly, and
//! joined back.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PATH_VAR: &str = "PATH";
pub const PATH_DELIMITER: char = ';';

#[derive(Debug, Error)]
pub enum EnvStoreError {
    #[error("Environment store I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("Environment file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("This installer needs the Windows user environment. Set LUAUP_ENV_FILE to use a file store instead.")]
    PlatformUnsupported,
}

/// Persistent key/value store for user environment variables.
pub trait EnvStore {
    fn get(&self, name: &str) -> Result<Option<String>, EnvStoreError>;
    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvStoreError>;
    fn remove(&mut self, name: &str) -> Result<(), EnvStoreError>;
}

/// Opens the file store when one is configured, otherwise the registry.
pub fn open_user_env(env_file: Option<&Path>) -> Result<Box<dyn EnvStore>, EnvStoreError> {
    if let Some(path) = env_file {
        tracing::debug!("Using environment file {}", path.display());
        return Ok(Box::new(FileEnvStore::new(path)));
    }

    #[cfg(windows)]
    {
        Ok(Box::new(RegistryEnvStore::open()?))
    }

    #[cfg(not(windows))]
    {
        Err(EnvStoreError::PlatformUnsupported)
    }
}

/// `HKEY_CURRENT_USER\Environment`, read by every newly started process.
///
/// Values keep their registry type on write so `%VAR%` entries in a
/// `REG_EXPAND_SZ` PATH stay expandable.
#[cfg(windows)]
pub struct RegistryEnvStore {
    key: winreg::RegKey,
}

#[cfg(windows)]
impl RegistryEnvStore {
    pub fn open() -> Result<Self, EnvStoreError> {
        use winreg::enums::{HKEY_CURRENT_USER, KEY_READ, KEY_WRITE};

        let key = winreg::RegKey::predef(HKEY_CURRENT_USER)
            .open_subkey_with_flags("Environment", KEY_READ | KEY_WRITE)?;
        Ok(Self::with_key(key))
    }

    pub fn with_key(key: winreg::RegKey) -> Self {
        Self { key }
    }

    /// String type to write `name` as: its current type, or `REG_EXPAND_SZ`
    /// for a new value.
    fn string_type(&self, name: &str) -> Result<winreg::enums::RegType, EnvStoreError> {
        use winreg::enums::RegType::{REG_EXPAND_SZ, REG_SZ};

        match self.key.get_raw_value(name) {
            Ok(raw) => Ok(match raw.vtype {
                REG_SZ => REG_SZ,
                _ => REG_EXPAND_SZ,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(REG_EXPAND_SZ),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(windows)]
impl EnvStore for RegistryEnvStore {
    fn get(&self, name: &str) -> Result<Option<String>, EnvStoreError> {
        use winreg::types::FromRegValue;

        match self.key.get_raw_value(name) {
            Ok(raw) => Ok(Some(String::from_reg_value(&raw)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvStoreError> {
        use winreg::types::ToRegValue;

        let mut raw = value.to_string().to_reg_value();
        raw.vtype = self.string_type(name)?;
        self.key.set_raw_value(name, &raw)?;
        broadcast_environment_change();
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), EnvStoreError> {
        match self.key.delete_value(name) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => {
                broadcast_environment_change();
                Ok(())
            }
        }
    }
}

/// Tells Explorer and other top-level windows to reload the user
/// environment, so shells they start see the new PATH.
#[cfg(windows)]
fn broadcast_environment_change() {
    use windows::Win32::Foundation::{LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        SendMessageTimeoutW, HWND_BROADCAST, SMTO_ABORTIFHUNG, WM_SETTINGCHANGE,
    };

    let area: Vec<u16> = "Environment".encode_utf16().chain(Some(0)).collect();
    let mut result = 0usize;
    // SAFETY: `area` is a NUL-terminated UTF-16 string alive for the call.
    let sent = unsafe {
        SendMessageTimeoutW(
            HWND_BROADCAST,
            WM_SETTINGCHANGE,
            WPARAM(0),
            LPARAM(area.as_ptr() as isize),
            SMTO_ABORTIFHUNG,
            5000,
            Some(&mut result as *mut usize),
        )
    };
    if sent.0 == 0 {
        tracing::warn!("Could not notify running programs of the PATH change");
    }
}

/// Environment variables kept as a flat JSON object on disk.
pub struct FileEnvStore {
    path: PathBuf,
}

impl FileEnvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, EnvStoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| EnvStoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, vars: &BTreeMap<String, String>) -> Result<(), EnvStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(vars).map_err(|source| EnvStoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl EnvStore for FileEnvStore {
    fn get(&self, name: &str) -> Result<Option<String>, EnvStoreError> {
        Ok(self.load()?.remove(name))
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvStoreError> {
        let mut vars = self.load()?;
        vars.insert(name.to_string(), value.to_string());
        self.save(&vars)
    }

    fn remove(&mut self, name: &str) -> Result<(), EnvStoreError> {
        let mut vars = self.load()?;
        if vars.remove(name).is_some() {
            self.save(&vars)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryEnvStore {
    pub vars: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MemoryEnvStore {
    pub fn with_path(value: &str) -> Self {
        let mut store = Self::default();
        store.vars.insert(PATH_VAR.to_string(), value.to_string());
        store
    }

    pub fn path(&self) -> Option<&str> {
        self.vars.get(PATH_VAR).map(String::as_str)
    }
}

#[cfg(test)]
impl EnvStore for MemoryEnvStore {
    fn get(&self, name: &str) -> Result<Option<String>, EnvStoreError> {
        Ok(self.vars.get(name).cloned())
    }

    fn set(&mut self, name: &str, value: &str) -> Result<(), EnvStoreError> {
        self.vars.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), EnvStoreError> {
        self.vars.remove(name);
        Ok(())
    }
}

/// Ordered entries of a `;`-delimited search path.
///
/// Empty entries are kept so that joining reproduces the original text. An
/// empty string parses to a single empty entry; an unset PATH is
/// `SearchPath::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    entries: Vec<String>,
}

/// Windows paths compare without regard to ASCII case.
fn same_entry(entry: &str, dir: &str) -> bool {
    entry.eq_ignore_ascii_case(dir)
}

impl SearchPath {
    pub fn parse(value: &str) -> Self {
        Self {
            entries: value.split(PATH_DELIMITER).map(str::to_string).collect(),
        }
    }

    pub fn contains(&self, dir: &str) -> bool {
        self.entries.iter().any(|entry| same_entry(entry, dir))
    }

    /// Appends `dir` unless it is already an entry.
    pub fn push(&mut self, dir: &str) -> bool {
        if self.contains(dir) {
            return false;
        }
        self.entries.push(dir.to_string());
        true
    }

    /// Drops every entry naming `dir`.
    pub fn remove(&mut self, dir: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| !same_entry(entry, dir));
        self.entries.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entries.join(&PATH_DELIMITER.to_string()))
    }
}

/// Adds `dir` to the user PATH. Returns whether the store was written.
pub fn add_to_path(store: &mut dyn EnvStore, dir: &str) -> Result<bool, EnvStoreError> {
    let mut path = store
        .get(PATH_VAR)?
        .map(|current| SearchPath::parse(&current))
        .unwrap_or_default();

    if !path.push(dir) {
        tracing::info!("{} is already on PATH", dir);
        return Ok(false);
    }

    store.set(PATH_VAR, &path.to_string())?;
    tracing::debug!("PATH is now: {}", path);
    Ok(true)
}

/// Removes `dir` from the user PATH. Returns whether the store was written.
pub fn remove_from_path(store: &mut dyn EnvStore, dir: &str) -> Result<bool, EnvStoreError> {
    let Some(current) = store.get(PATH_VAR)? else {
        tracing::info!("PATH is not set; nothing to remove");
        return Ok(false);
    };
    let mut path = SearchPath::parse(&current);

    if !path.remove(dir) {
        tracing::info!("{} is not on PATH", dir);
        return Ok(false);
    }

    if path.is_empty() {
        store.remove(PATH_VAR)?;
        tracing::debug!("PATH removed, no entries left");
    } else {
        store.set(PATH_VAR, &path.to_string())?;
        tracing::debug!("PATH is now: {}", path);
    }
    Ok(true)
}
