//! Key material.
//!
//! A [`KeyRing`] maps key names to age identity files. Nothing is read up
//! front: every lookup goes back to disk, so a key file can be replaced
//! between operations.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use age::secrecy::ExposeSecret;
use age::x25519;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::types::KeyName;
use crate::error::{KeyError, Result};

/// Key names resolved against a project root.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    root: PathBuf,
    keys: BTreeMap<KeyName, PathBuf>,
}

impl KeyRing {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            keys: BTreeMap::new(),
        }
    }

    /// Build a ring from `name -> path` entries. Relative paths resolve
    /// against `root`.
    pub fn from_entries<'a>(
        root: impl Into<PathBuf>,
        entries: impl IntoIterator<Item = (&'a KeyName, &'a String)>,
    ) -> Self {
        let mut ring = Self::new(root);
        for (name, path) in entries {
            ring.insert(name.clone(), path);
        }
        ring
    }

    pub fn insert(&mut self, name: impl Into<KeyName>, path: impl AsRef<Path>) {
        self.keys.insert(name.into(), path.as_ref().to_path_buf());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Absolute location of the key file registered for `name`.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Unknown` if no file is registered under `name`.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        let path = self
            .keys
            .get(name)
            .ok_or_else(|| KeyError::Unknown(name.to_string()))?;
        Ok(if path.is_absolute() {
            path.clone()
        } else {
            self.root.join(path)
        })
    }

    /// Load the private identity for `name`.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Unknown` if the name is not registered,
    /// `KeyError::ReadFailed` if the file cannot be read, or
    /// `KeyError::InvalidFormat` if it does not hold an age identity.
    pub fn identity(&self, name: &str) -> Result<x25519::Identity> {
        let path = self.path_of(name)?;
        debug!(key = name, path = %path.display(), "loading key");

        #[cfg(unix)]
        warn_if_insecure(&path);

        let contents = fs::read_to_string(&path).map_err(|source| KeyError::ReadFailed {
            name: name.to_string(),
            source,
        })?;

        let line = contents
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .ok_or_else(|| KeyError::InvalidFormat {
                name: name.to_string(),
                reason: "file is empty".to_string(),
            })?;

        line.parse::<x25519::Identity>().map_err(|e: &str| {
            KeyError::InvalidFormat {
                name: name.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Public half of the identity for `name`.
    pub fn recipient(&self, name: &str) -> Result<x25519::Recipient> {
        Ok(self.identity(name)?.to_public())
    }

    /// Short display fingerprint: the first 8 bytes of SHA-256 over the
    /// public key, hex encoded.
    pub fn fingerprint(&self, name: &str) -> Result<String> {
        let public = self.recipient(name)?.to_string();
        Ok(fingerprint_of(&public))
    }

    /// Generate a new identity into `dir`, named after the current Unix time.
    ///
    /// Returns the written path and the public key.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::AlreadyExists` if a key with the same timestamp is
    /// already there, or `KeyError::WriteFailed` on I/O failure.
    pub fn generate(dir: &Path) -> Result<(PathBuf, String)> {
        let path = dir.join(format!("{}.key", chrono::Utc::now().timestamp()));
        let public = Self::generate_at(&path)?;
        Ok((path, public))
    }

    /// Generate a new identity at `path`, creating parent directories.
    /// Never overwrites an existing file.
    pub fn generate_at(path: &Path) -> Result<String> {
        if path.exists() {
            return Err(KeyError::AlreadyExists(path.display().to_string()).into());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(KeyError::WriteFailed)?;
        }

        let identity = x25519::Identity::generate();
        let public = identity.to_public().to_string();

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    KeyError::AlreadyExists(path.display().to_string())
                }
                _ => KeyError::WriteFailed(e),
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .map_err(KeyError::WriteFailed)?;
        }

        let secret = identity.to_string();
        writeln!(file, "# public key: {}", public).map_err(KeyError::WriteFailed)?;
        writeln!(file, "{}", secret.expose_secret()).map_err(KeyError::WriteFailed)?;

        debug!(path = %path.display(), "generated key");
        Ok(public)
    }
}

fn fingerprint_of(public: &str) -> String {
    Sha256::digest(public.as_bytes())[..8]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(unix)]
fn warn_if_insecure(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = %format!("{:o}", mode),
                "key file is readable by other users; run chmod 600"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_generate_then_resolve() {
        let tmp = TempDir::new().unwrap();
        let public = KeyRing::generate_at(&tmp.path().join("keys/default.key")).unwrap();
        assert!(public.starts_with("age1"));

        let mut ring = KeyRing::new(tmp.path());
        ring.insert("default", "keys/default.key");
        assert_eq!(ring.recipient("default").unwrap().to_string(), public);
    }

    #[test]
    fn test_generate_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.key");
        KeyRing::generate_at(&path).unwrap();
        let err = KeyRing::generate_at(&path).unwrap_err();
        assert!(matches!(err, Error::Key(KeyError::AlreadyExists(_))));
    }

    #[test]
    fn test_generate_uses_timestamp_name() {
        let tmp = TempDir::new().unwrap();
        let (path, _) = KeyRing::generate(tmp.path()).unwrap();
        let stem = path.file_stem().unwrap().to_str().unwrap();
        assert!(stem.parse::<i64>().is_ok());
        assert_eq!(path.extension().unwrap(), "key");
    }

    #[cfg(unix)]
    #[test]
    fn test_generated_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.key");
        KeyRing::generate_at(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_unknown_name() {
        let ring = KeyRing::new("/nowhere");
        assert!(matches!(
            ring.identity("pii"),
            Err(Error::Key(KeyError::Unknown(ref n))) if n == "pii"
        ));
    }

    #[test]
    fn test_missing_file_is_read_failure() {
        let tmp = TempDir::new().unwrap();
        let mut ring = KeyRing::new(tmp.path());
        ring.insert("default", "gone.key");
        assert!(matches!(
            ring.identity("default"),
            Err(Error::Key(KeyError::ReadFailed { .. }))
        ));
    }

    #[test]
    fn test_garbage_file_is_invalid_format() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad.key"), "not a key\n").unwrap();
        let mut ring = KeyRing::new(tmp.path());
        ring.insert("default", "bad.key");
        assert!(matches!(
            ring.identity("default"),
            Err(Error::Key(KeyError::InvalidFormat { .. }))
        ));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let tmp = TempDir::new().unwrap();
        KeyRing::generate_at(&tmp.path().join("k.key")).unwrap();
        let mut ring = KeyRing::new(tmp.path());
        ring.insert("default", "k.key");
        let first = ring.fingerprint("default").unwrap();
        assert_eq!(first.len(), 16);
        assert_eq!(first, ring.fingerprint("default").unwrap());
    }
}
