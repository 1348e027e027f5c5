//! Indexing of a single file: stat, classify, hash, upsert.

use crate::classifier::{classify, RootSet};
use crate::error::{HikazeError, Result};
use crate::hashing::sha256_file;
use crate::store::{CatalogStore, ModelUpsert};
use std::path::Path;
use tracing::debug;

/// When to compute a content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashPolicy {
    /// Hash every file.
    Always,
    /// Hash paths the catalog has not seen; reuse the stored hash otherwise.
    NewOnly,
    /// Never hash; keep whatever is stored.
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Added { model_type: String },
    Updated { model_type: String },
    /// The path is no longer a regular file.
    Skipped,
}

/// Bring the catalog row for `path` up to date.
///
/// IO failures come back as [`HikazeError::Io`]; store failures as
/// [`HikazeError::Database`], which callers treat as fatal.
pub fn index_file(
    store: &CatalogStore,
    roots: &RootSet,
    path: &Path,
    policy: HashPolicy,
) -> Result<IndexOutcome> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexOutcome::Skipped),
        Err(e) => return Err(HikazeError::io_with_path(e, path)),
    };
    if !metadata.is_file() {
        return Ok(IndexOutcome::Skipped);
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let model_type = classify(path, roots);
    // `None` keeps whatever hash is stored when the upsert commits.
    let hash_hex = match policy {
        HashPolicy::Always => Some(sha256_file(path)?),
        HashPolicy::NewOnly => match store.get_by_path(path)? {
            None => Some(sha256_file(path)?),
            Some(_) => None,
        },
        HashPolicy::Never => None,
    };

    let upsert =
        ModelUpsert::new(path, name, model_type.clone(), metadata.len()).with_hash(hash_hex);
    let outcome = store.upsert_model(&upsert)?;
    debug!(
        "Indexed {} as {} (id {}, new: {})",
        path.display(),
        model_type,
        outcome.id,
        outcome.created
    );

    Ok(if outcome.created {
        IndexOutcome::Added { model_type }
    } else {
        IndexOutcome::Updated { model_type }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (CatalogStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = CatalogStore::open(temp.path().join("db").join("catalog.sqlite3")).unwrap();
        (store, temp)
    }

    #[test]
    fn test_new_file_is_hashed_under_new_only() {
        let (store, temp) = setup();
        let root = temp.path().join("models");
        let file = root.join("lora").join("a.safetensors");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"hello world").unwrap();
        let roots = RootSet::new(&[&root]);

        let outcome = index_file(&store, &roots, &file, HashPolicy::NewOnly).unwrap();
        assert_eq!(outcome, IndexOutcome::Added { model_type: "lora".into() });

        let record = store.get_by_path(&file).unwrap().unwrap();
        assert_eq!(
            record.hash_hex.as_deref(),
            Some("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9")
        );
        assert_eq!(record.size_bytes, 11);
    }

    #[test]
    fn test_known_file_reuses_stored_hash() {
        let (store, temp) = setup();
        let file = temp.path().join("x.ckpt");
        std::fs::write(&file, b"one").unwrap();
        let roots = RootSet::default();

        index_file(&store, &roots, &file, HashPolicy::Always).unwrap();
        let first = store.get_by_path(&file).unwrap().unwrap().hash_hex;

        std::fs::write(&file, b"two").unwrap();
        let outcome = index_file(&store, &roots, &file, HashPolicy::NewOnly).unwrap();
        assert!(matches!(outcome, IndexOutcome::Updated { .. }));
        assert_eq!(store.get_by_path(&file).unwrap().unwrap().hash_hex, first);

        index_file(&store, &roots, &file, HashPolicy::Always).unwrap();
        assert_ne!(store.get_by_path(&file).unwrap().unwrap().hash_hex, first);
    }

    #[test]
    fn test_never_leaves_new_hash_unknown() {
        let (store, temp) = setup();
        let file = temp.path().join("x.pt");
        std::fs::write(&file, b"abc").unwrap();

        index_file(&store, &RootSet::default(), &file, HashPolicy::Never).unwrap();
        assert_eq!(store.get_by_path(&file).unwrap().unwrap().hash_hex, None);
    }

    #[test]
    fn test_never_keeps_hash_committed_by_full_scan() {
        let (store, temp) = setup();
        let file = temp.path().join("x.ckpt");
        std::fs::write(&file, b"abc").unwrap();
        let roots = RootSet::default();

        index_file(&store, &roots, &file, HashPolicy::Never).unwrap();
        index_file(&store, &roots, &file, HashPolicy::Always).unwrap();
        let hashed = store.get_by_path(&file).unwrap().unwrap().hash_hex;
        assert!(hashed.is_some());

        index_file(&store, &roots, &file, HashPolicy::Never).unwrap();
        assert_eq!(store.get_by_path(&file).unwrap().unwrap().hash_hex, hashed);
    }

    #[test]
    fn test_missing_or_directory_is_skipped() {
        let (store, temp) = setup();
        let roots = RootSet::default();
        let gone = temp.path().join("gone.ckpt");
        assert_eq!(
            index_file(&store, &roots, &gone, HashPolicy::Always).unwrap(),
            IndexOutcome::Skipped
        );
        assert_eq!(
            index_file(&store, &roots, temp.path(), HashPolicy::Always).unwrap(),
            IndexOutcome::Skipped
        );
        assert_eq!(store.count_models().unwrap(), 0);
    }
}
