// LogDeck - platform/credentials.rs
//
// Persisted auth state: the bearer token and minimal user identity,
// restored on the next run.
//
// - Saved atomically (write temp, rename) so a crash mid-save never
//   corrupts the previous good file.
// - Load problems (missing, malformed, version mismatch) mean "logged out";
//   they are never fatal.
// - On Unix the file is created owner-read/write only.

use crate::core::model::User;
use crate::util::error::CredentialError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bump when `PersistedAuth` changes incompatibly. Mismatches are discarded.
pub const AUTH_STORAGE_VERSION: u32 = 1;

/// On-disk auth snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedAuth {
    pub version: u32,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
}

impl PersistedAuth {
    pub fn new(user: Option<User>, token: Option<String>) -> Self {
        Self {
            version: AUTH_STORAGE_VERSION,
            user,
            token,
        }
    }
}

/// Save `data` to `path` atomically.
pub fn save(data: &PersistedAuth, path: &Path) -> Result<(), CredentialError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CredentialError::Io {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }

    let json =
        serde_json::to_string_pretty(data).map_err(|e| CredentialError::Serialize { source: e })?;

    let tmp = path.with_extension("json.tmp");
    write_private(&tmp, json.as_bytes()).map_err(|e| CredentialError::Io {
        path: tmp.clone(),
        operation: "write",
        source: e,
    })?;

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        CredentialError::Io {
            path: path.to_path_buf(),
            operation: "rename",
            source: e,
        }
    })?;

    tracing::debug!(path = %path.display(), logged_in = data.token.is_some(), "Auth state saved");
    Ok(())
}

/// Load persisted auth state. `None` means start logged out.
pub fn load(path: &Path) -> Option<PersistedAuth> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "Cannot read auth storage");
            }
        })
        .ok()?;

    let data: PersistedAuth = serde_json::from_str(&content)
        .map_err(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Auth storage is malformed; starting logged out"
            );
        })
        .ok()?;

    if data.version != AUTH_STORAGE_VERSION {
        tracing::warn!(
            found = data.version,
            expected = AUTH_STORAGE_VERSION,
            "Auth storage version mismatch; starting logged out"
        );
        return None;
    }

    Some(data)
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("auth-storage.json");
        let data = PersistedAuth::new(Some(alice()), Some("tok-123".to_string()));
        save(&data, &path).unwrap();
        assert_eq!(load(&path), Some(data));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("auth-storage.json")).is_none());
    }

    #[test]
    fn test_malformed_and_mismatched_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth-storage.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_none());

        std::fs::write(&path, r#"{"version":99,"token":"t"}"#).unwrap();
        assert!(load(&path).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth-storage.json");
        save(&PersistedAuth::new(None, Some("t".to_string())), &path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
