use crate::error::SessionError;
use crate::session::SessionStore;
use directories::ProjectDirs;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const KEYRING_SERVICE: &str = "libris";
const KEYRING_ACCOUNT: &str = "session-token";

/// What lives in `session.toml`. The token itself never touches disk.
#[derive(Debug, Serialize, Deserialize, Default)]
struct SessionFile {
    user: Option<String>,
}

/// Session store backed by the system keyring (token) and a small TOML file
/// in the user's config directory (cached user JSON).
pub struct KeyringSessionStore {
    path: PathBuf,
    entry: Entry,
}

impl KeyringSessionStore {
    /// Store at the platform config location, e.g. `~/.config/libris/session.toml`,
    /// with the token under the `libris` keyring service.
    pub fn open() -> Result<Self, SessionError> {
        let proj_dirs = ProjectDirs::from("com", "libris", "libris").ok_or(SessionError::NoConfigDir)?;
        let config_dir = proj_dirs.config_dir();
        fs::create_dir_all(config_dir)?;
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)?;
        Ok(Self::at(config_dir.join("session.toml"), entry))
    }

    pub fn at(path: impl Into<PathBuf>, entry: Entry) -> Self {
        Self {
            path: path.into(),
            entry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<SessionFile, SessionError> {
        if !self.path.exists() {
            return Ok(SessionFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, file: &SessionFile) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string_pretty(file)?)?;
        Ok(())
    }
}

impl SessionStore for KeyringSessionStore {
    fn token(&self) -> Option<String> {
        match self.entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                log::debug!("No token available from keyring: {}", e);
                None
            }
        }
    }

    fn set_token(&self, token: &str) -> Result<(), SessionError> {
        self.entry.set_password(token)?;
        Ok(())
    }

    fn cached_user(&self) -> Option<String> {
        match self.load() {
            Ok(file) => file.user,
            Err(e) => {
                log::warn!("Could not read {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn set_cached_user(&self, user: &str) -> Result<(), SessionError> {
        let mut file = self.load().unwrap_or_default();
        file.user = Some(user.to_string());
        self.save(&file)
    }

    fn clear(&self) -> Result<(), SessionError> {
        // A missing credential is already the state we want.
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(e) => log::warn!("Could not remove token from keyring: {}", e),
        }
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
