//! Durable key/value storage for the provider credential
//!
//! A string-keyed map persisted as a JSON file. Writes use atomic temp-file +
//! rename and the file is 0600. A tokio Mutex serializes access so the three
//! session keys change as a unit. An absent file is an empty store; an absent
//! key is "value unset", never an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::Credential;

/// Raw provider credential blob (JSON).
pub const AUTH_RESULT_KEY: &str = "authResult";
/// Stringified unix-millis expiry of the access token.
pub const EXPIRES_AT_KEY: &str = "expires_at";
/// Route to return to after login completes.
pub const REDIRECT_KEY: &str = "auth_redirect";

/// Every key owned by the session; removed together on logout.
pub const SESSION_KEYS: [&str; 3] = [AUTH_RESULT_KEY, EXPIRES_AT_KEY, REDIRECT_KEY];

pub struct CredentialStore {
    /// `None` keeps the map in memory only.
    path: Option<PathBuf>,
    state: Mutex<BTreeMap<String, String>>,
}

impl CredentialStore {
    /// Load the store from `path`. A missing file starts empty; the file is
    /// created on first write.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let entries: BTreeMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), keys = entries.len(), "loaded credential store");
            entries
        } else {
            info!(path = %path.display(), "credential file not found, starting empty");
            BTreeMap::new()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.state.lock().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(key.to_string(), value);
        debug!(key, "set credential key");
        self.persist(&state).await
    }

    /// Remove several keys with a single write. Missing keys are ignored.
    pub async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut state = self.state.lock().await;
        let before = state.len();
        for key in keys {
            state.remove(*key);
        }
        if state.len() == before {
            return Ok(());
        }
        debug!(removed = before - state.len(), "removed credential keys");
        self.persist(&state).await
    }

    /// Persisted provider credential. Absent or malformed → `None`.
    pub async fn credential(&self) -> Option<Credential> {
        let raw = self.get(AUTH_RESULT_KEY).await?;
        match serde_json::from_str(&raw) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(error = %e, "ignoring malformed authResult");
                None
            }
        }
    }

    pub async fn save_credential(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_string(credential)
            .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;
        self.set(AUTH_RESULT_KEY, json).await
    }

    /// Persisted expiry in unix millis. Absent or malformed → `None`.
    pub async fn expires_at(&self) -> Option<u64> {
        self.get(EXPIRES_AT_KEY).await?.trim().parse().ok()
    }

    pub async fn set_expires_at(&self, expires_at: u64) -> Result<()> {
        self.set(EXPIRES_AT_KEY, expires_at.to_string()).await
    }

    pub async fn redirect(&self) -> Option<String> {
        self.get(REDIRECT_KEY).await
    }

    pub async fn set_redirect(&self, route: &str) -> Result<()> {
        self.set(REDIRECT_KEY, route.to_string()).await
    }

    /// Delete the whole session record.
    pub async fn clear(&self) -> Result<()> {
        self.remove_all(&SESSION_KEYS).await
    }

    async fn persist(&self, state: &BTreeMap<String, String>) -> Result<()> {
        match &self.path {
            Some(path) => write_atomic(path, state).await,
            None => Ok(()),
        }
    }
}

/// Write the map to `path` via a temp file in the same directory, then
/// rename over the target. Permissions are 0600 on unix.
async fn write_atomic(path: &Path, data: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing credential store: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential store");
    Ok(())
}
