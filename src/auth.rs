use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use crate::error::{CircleError, Result};

/// Key under which the CircleCI personal API token is stored.
pub const TOKEN_KEY: &str = "circleci-token";

/// A CircleCI personal API token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(****)")
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// String secrets addressed by key.
pub trait SecretStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Secret store backed by a JSON file in the user's config directory.
///
/// - Linux: `~/.config/circlewatch/secrets.json`
/// - macOS: `~/Library/Application Support/circlewatch/secrets.json`
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Opens the store at its default platform location.
    ///
    /// # Errors
    ///
    /// Returns an error if no config directory can be determined.
    pub fn open_default() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| CircleError::Secrets("No config directory found".into()))?
            .join("circlewatch");
        Ok(Self::at(dir.join("secrets.json")))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            CircleError::Secrets(format!("Corrupt secret file {}: {e}", self.path.display()))
        })
    }

    fn store(&self, secrets: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = open_private(&self.path)?;
        file.write_all(serde_json::to_string_pretty(secrets)?.as_bytes())?;
        debug!("Secrets written to: {}", self.path.display());
        Ok(())
    }
}

/// Opens `path` for writing, readable by the owner only from the moment it exists.
///
/// A file left behind with looser permissions is tightened before it is written.
#[cfg(unix)]
fn open_private(path: &Path) -> Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> Result<fs::File> {
    Ok(fs::File::create(path)?)
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut secrets = self.load()?;
        secrets.insert(key.to_string(), value.to_string());
        self.store(&secrets)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut secrets = self.load()?;
        if secrets.remove(key).is_some() {
            self.store(&secrets)?;
        }
        Ok(())
    }
}

/// In-process secret store, used where nothing should touch disk.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let secrets = self
            .secrets
            .lock()
            .map_err(|_| CircleError::Secrets("store lock poisoned".into()))?;
        Ok(secrets.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.secrets
            .lock()
            .map_err(|_| CircleError::Secrets("store lock poisoned".into()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.secrets
            .lock()
            .map_err(|_| CircleError::Secrets("store lock poisoned".into()))?
            .remove(key);
        Ok(())
    }
}

/// Picks the token to use: an explicit value wins, then the stored one.
///
/// Empty strings count as absent.
pub fn resolve_token(explicit: Option<&str>, store: &dyn SecretStore) -> Result<Option<Token>> {
    if let Some(value) = explicit.filter(|v| !v.trim().is_empty()) {
        return Ok(Some(Token::from(value.trim())));
    }
    Ok(store
        .get(TOKEN_KEY)?
        .filter(|v| !v.trim().is_empty())
        .map(Token::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_debug_is_redacted() {
        let token = Token::from("secret-value");
        assert_eq!(format!("{token:?}"), "Token(****)");
        assert_eq!(token.as_str(), "secret-value");
    }

    #[test]
    fn file_store_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::at(dir.path().join("nested").join("secrets.json"));

        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);

        store.set(TOKEN_KEY, "abc123").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), Some("abc123".to_string()));

        store.delete(TOKEN_KEY).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::at(dir.path().join("secrets.json"));

        store.set("other", "keep-me").unwrap();
        store.set(TOKEN_KEY, "abc").unwrap();
        store.delete(TOKEN_KEY).unwrap();

        assert_eq!(store.get("other").unwrap(), Some("keep-me".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        let store = FileSecretStore::at(path.clone());
        store.set(TOKEN_KEY, "abc").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn file_store_tightens_existing_loose_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileSecretStore::at(path.clone());
        store.set(TOKEN_KEY, "abc").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.get(TOKEN_KEY).unwrap(), Some("abc".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn new_file_is_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.json");
        drop(open_private(&path).unwrap());

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(&path, "not json").unwrap();

        let store = FileSecretStore::at(path);
        assert!(matches!(store.get(TOKEN_KEY), Err(CircleError::Secrets(_))));
    }

    #[test]
    fn explicit_token_wins_over_stored() {
        let store = MemorySecretStore::default();
        store.set(TOKEN_KEY, "stored").unwrap();

        let token = resolve_token(Some("flag"), &store).unwrap();
        assert_eq!(token, Some(Token::from("flag")));
    }

    #[test]
    fn blank_values_are_absent() {
        let store = MemorySecretStore::default();
        store.set(TOKEN_KEY, "   ").unwrap();

        assert_eq!(resolve_token(Some(""), &store).unwrap(), None);
    }

    #[test]
    fn falls_back_to_stored_token() {
        let store = MemorySecretStore::default();
        store.set(TOKEN_KEY, "stored").unwrap();

        assert_eq!(
            resolve_token(None, &store).unwrap(),
            Some(Token::from("stored"))
        );
    }
}
