//! Key pairs loaded from, and generated into, key files.
//!
//! ```text
//! node.pub   base64 of the 32-byte public key
//! node.key   {"data":{"bytes":"<base64 private key>"},"type":"unlocked"}
//! ```
//!
//! Only `unlocked` private key files are supported.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{KeyConfig, KeyStore, MemoryKeyStore};
use crate::crypto::{KeyPair, PrivateKey, PublicKey};
use crate::encoding;
use crate::error::{Error, Result};

const UNLOCKED: &str = "unlocked";

/// On-disk private key document
#[derive(Debug, Serialize, Deserialize)]
pub struct PrivateKeyFile {
    /// Key payload
    pub data: PrivateKeyData,
    /// Protection scheme (`unlocked`)
    #[serde(rename = "type")]
    pub kind: String,
}

/// Private key bytes inside a [`PrivateKeyFile`]
#[derive(Debug, Serialize, Deserialize)]
pub struct PrivateKeyData {
    /// Base64 private key
    pub bytes: String,
}

impl PrivateKeyFile {
    fn unlocked(key: &PrivateKey) -> Self {
        Self {
            data: PrivateKeyData {
                bytes: encoding::to_base64(&key.to_bytes()),
            },
            kind: UNLOCKED.to_string(),
        }
    }

    fn into_private_key(self) -> Result<PrivateKey> {
        if self.kind != UNLOCKED {
            return Err(Error::KeyFile(format!(
                "unsupported private key type '{}'",
                self.kind
            )));
        }
        let bytes = encoding::from_base64_32(&self.data.bytes)
            .map_err(|e| Error::KeyFile(format!("private key: {}", e)))?;
        Ok(PrivateKey::from_bytes(bytes))
    }
}

/// Key store backed by `.pub`/`.key` file pairs
#[derive(Debug, Default)]
pub struct FileKeyStore {
    keys: MemoryKeyStore,
}

impl FileKeyStore {
    /// Load each `(public_key_path, private_key_path)` pair in order.
    ///
    /// Fails if a file is unreadable, malformed, or if a private key does not
    /// match its public key file.
    pub fn load<P: AsRef<Path>>(pairs: &[(P, P)]) -> Result<Self> {
        let keys = MemoryKeyStore::new();
        for (public_path, private_path) in pairs {
            let pair = read_key_pair(public_path.as_ref(), private_path.as_ref())?;
            tracing::info!(
                key = %pair.public,
                path = %public_path.as_ref().display(),
                "Loaded node key"
            );
            keys.add_node_key(pair);
        }
        Ok(Self { keys })
    }
}

impl KeyStore for FileKeyStore {
    fn private_key(&self, public_key: &PublicKey) -> Result<PrivateKey> {
        self.keys.private_key(public_key)
    }

    fn node_keys(&self) -> Vec<PublicKey> {
        self.keys.node_keys()
    }

    fn generate_key_pair(&self, config: &KeyConfig) -> Result<PublicKey> {
        self.keys.generate_key_pair(config)
    }
}

/// `<base>.pub` and `<base>.key`
pub fn key_paths(base: &Path) -> (PathBuf, PathBuf) {
    let mut public = base.as_os_str().to_owned();
    public.push(".pub");
    let mut private = base.as_os_str().to_owned();
    private.push(".key");
    (PathBuf::from(public), PathBuf::from(private))
}

pub(crate) fn write_key_pair(base: &Path, pair: &KeyPair) -> Result<()> {
    let (public_path, private_path) = key_paths(base);
    if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| key_file_error(parent, e))?;
    }

    fs::write(&public_path, pair.public.to_base64()).map_err(|e| key_file_error(&public_path, e))?;

    let document = serde_json::to_string_pretty(&PrivateKeyFile::unlocked(&pair.private))?;
    fs::write(&private_path, document).map_err(|e| key_file_error(&private_path, e))?;

    tracing::info!(key = %pair.public, path = %public_path.display(), "Wrote key pair");
    Ok(())
}

fn read_key_pair(public_path: &Path, private_path: &Path) -> Result<KeyPair> {
    let public_text =
        fs::read_to_string(public_path).map_err(|e| key_file_error(public_path, e))?;
    let public = PublicKey::from_base64(&public_text)
        .map_err(|e| Error::KeyFile(format!("{}: {}", public_path.display(), e)))?;

    let private_text =
        fs::read_to_string(private_path).map_err(|e| key_file_error(private_path, e))?;
    let document: PrivateKeyFile = serde_json::from_str(&private_text)
        .map_err(|e| Error::KeyFile(format!("{}: {}", private_path.display(), e)))?;
    let private = document.into_private_key()?;

    if private.public_key() != public {
        return Err(Error::KeyFile(format!(
            "{} does not match {}",
            private_path.display(),
            public_path.display()
        )));
    }

    Ok(KeyPair { public, private })
}

fn key_file_error(path: &Path, err: std::io::Error) -> Error {
    Error::KeyFile(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("node");

        let generator = MemoryKeyStore::new();
        let public = generator.generate_key_pair(&KeyConfig::at(&base)).unwrap();

        let (pub_path, key_path) = key_paths(&base);
        let store = FileKeyStore::load(&[(pub_path, key_path)]).unwrap();

        assert_eq!(store.node_keys(), vec![public]);
        assert_eq!(store.private_key(&public).unwrap().public_key(), public);
    }

    #[test]
    fn test_private_key_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("keys").join("a");
        let store = FileKeyStore::default();
        store.generate_key_pair(&KeyConfig::at(&base)).unwrap();

        let (_, key_path) = key_paths(&base);
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(key_path).unwrap()).unwrap();
        assert_eq!(json["type"], "unlocked");
        assert!(json["data"]["bytes"].is_string());
    }

    #[test]
    fn test_locked_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("locked");
        let pair = KeyPair::generate();
        write_key_pair(&base, &pair).unwrap();

        let (pub_path, key_path) = key_paths(&base);
        let mut doc = PrivateKeyFile::unlocked(&pair.private);
        doc.kind = "argon2sbox".into();
        fs::write(&key_path, serde_json::to_string(&doc).unwrap()).unwrap();

        let err = FileKeyStore::load(&[(pub_path, key_path)]).unwrap_err();
        assert!(matches!(err, Error::KeyFile(msg) if msg.contains("argon2sbox")));
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        write_key_pair(&a, &KeyPair::generate()).unwrap();
        write_key_pair(&b, &KeyPair::generate()).unwrap();

        let (a_pub, _) = key_paths(&a);
        let (_, b_key) = key_paths(&b);
        assert!(matches!(
            FileKeyStore::load(&[(a_pub, b_key)]),
            Err(Error::KeyFile(_))
        ));
    }

    #[test]
    fn test_missing_file_is_key_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.pub");
        let result = FileKeyStore::load(&[(missing.clone(), missing)]);
        assert!(matches!(result, Err(Error::KeyFile(_))));
    }
}
