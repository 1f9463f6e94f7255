//! `--generate-keys`: write key pairs and exit.

use std::path::{Path, PathBuf};

use cloak_core::crypto::PublicKey;
use cloak_core::keystore::{key_paths, KeyConfig, KeyStore, MemoryKeyStore};

/// Write `<name>.pub` / `<name>.key` under `work_dir` for each name.
///
/// Refuses to overwrite an existing key file.
pub fn generate_keys(work_dir: &Path, names: &[String]) -> cloak_core::Result<Vec<PublicKey>> {
    let store = MemoryKeyStore::new();
    let mut generated = Vec::with_capacity(names.len());

    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let base = base_path(work_dir, name);
        let (public_path, private_path) = key_paths(&base);
        if let Some(existing) = [&public_path, &private_path].into_iter().find(|p| p.exists()) {
            return Err(cloak_core::Error::KeyFile(format!(
                "{} already exists",
                existing.display()
            )));
        }

        let public = store.generate_key_pair(&KeyConfig::at(&base))?;
        generated.push(public);
    }

    Ok(generated)
}

fn base_path(work_dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        work_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_core::keystore::FileKeyStore;

    #[test]
    fn test_generated_keys_load() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["alice".to_string(), " ".to_string(), "bob".to_string()];

        let keys = generate_keys(dir.path(), &names).unwrap();
        assert_eq!(keys.len(), 2);

        let store = FileKeyStore::load(&[
            key_paths(&dir.path().join("alice")),
            key_paths(&dir.path().join("bob")),
        ])
        .unwrap();
        assert_eq!(store.node_keys(), keys);
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["node".to_string()];
        generate_keys(dir.path(), &names).unwrap();

        let err = generate_keys(dir.path(), &names).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
