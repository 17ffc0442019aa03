//! JSON persistence for the configuration document.
//!
//! Saves write a sibling temporary file, fsync it, then rename it over the
//! target, so a crash mid-save leaves either the old or the new document on
//! disk and never a torn one.
//!
//! Several processes may share one document file. [`save_document_if_unchanged`]
//! is the on-disk compare-and-swap: under an exclusive lock on a sibling
//! `.lock` file it re-reads the persisted version and only replaces the
//! document if nobody saved since the caller loaded it.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use shapewise_types::{ConfigurationDocument, Version};
use tracing::{debug, warn};

use crate::StoreError;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn temp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

fn lock_path(path: &Path) -> PathBuf {
    sibling(path, ".lock")
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    Ok(())
}

/// Exclusive advisory lock serializing saves of one document file.
///
/// The lock lives on a sibling `.lock` file because saves rename a new
/// inode over the document itself. Released on drop.
#[derive(Debug)]
pub struct DocumentLock {
    _file: File,
    path: PathBuf,
}

impl DocumentLock {
    /// Blocks until no other process holds the lock for `document`.
    pub fn acquire(document: &Path) -> Result<Self, StoreError> {
        create_parent(document)?;
        let path = lock_path(document);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_error(&path))?;
        file.lock_exclusive().map_err(io_error(&path))?;
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Loads the document at `path`.
///
/// A missing file is an empty document at version 0.
pub fn load_document(path: &Path) -> Result<ConfigurationDocument, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no persisted document, starting empty");
            return Ok(ConfigurationDocument::new());
        }
        Err(e) => return Err(io_error(path)(e)),
    };

    let document: ConfigurationDocument =
        serde_json::from_str(&contents).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    if !document.has_unique_keys() {
        warn!(path = %path.display(), "persisted document has duplicate shape keys");
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: "duplicate shape keys".to_string(),
        });
    }

    Ok(document)
}

/// Replaces the document at `path` iff the persisted version is still `base`.
///
/// `base` is the version the caller loaded (or last saved). A missing file
/// counts as version 0. When another writer saved in between, nothing is
/// written and [`StoreError::VersionConflict`] reports both versions.
pub fn save_document_if_unchanged(
    path: &Path,
    document: &ConfigurationDocument,
    base: Version,
) -> Result<(), StoreError> {
    let lock = DocumentLock::acquire(path)?;

    let on_disk = load_document(path)?.version;
    if on_disk != base {
        warn!(
            path = %path.display(),
            expected = %base,
            actual = %on_disk,
            "persisted document moved on, save rejected"
        );
        return Err(StoreError::VersionConflict {
            expected: base,
            actual: on_disk,
        });
    }

    save_document(path, document)?;
    drop(lock);
    Ok(())
}

/// Atomically replaces the document at `path`, creating parent directories.
///
/// Unconditional; shared files go through [`save_document_if_unchanged`].
pub fn save_document(path: &Path, document: &ConfigurationDocument) -> Result<(), StoreError> {
    create_parent(path)?;

    let bytes = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let temp = temp_path(path);
    {
        let mut file = File::create(&temp).map_err(io_error(&temp))?;
        file.write_all(&bytes).map_err(io_error(&temp))?;
        file.sync_all().map_err(io_error(&temp))?;
    }
    fs::rename(&temp, path).map_err(io_error(path))?;

    debug!(
        path = %path.display(),
        version = %document.version,
        entries = document.len(),
        "saved configuration document"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shapewise_types::{
        ClusterTime, Namespace, QuerySettings, QueryShapeConfiguration, ShapeKey, Version,
    };
    use tempfile::TempDir;

    use super::*;

    fn keyed(byte: u8) -> QueryShapeConfiguration {
        QueryShapeConfiguration::new(
            ShapeKey::from_bytes([byte; 32]),
            Namespace::new("db", "c"),
            QuerySettings::new(json!({"reject": true})),
        )
    }

    fn document() -> ConfigurationDocument {
        ConfigurationDocument {
            entries: vec![QueryShapeConfiguration::new(
                ShapeKey::from_bytes([0xAB; 32]),
                Namespace::new("db", "c"),
                QuerySettings::new(json!({"indexHints": {"allowedIndexes": ["a_1"]}})),
            )],
            version: Version::new(12),
            cluster_time: ClusterTime::new(99),
        }
    }

    #[test]
    fn missing_file_loads_as_empty_document() {
        let dir = TempDir::new().unwrap();
        let doc = load_document(&dir.path().join("absent.json")).unwrap();
        assert_eq!(doc, ConfigurationDocument::new());
    }

    #[test]
    fn saved_document_loads_back_with_its_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        save_document(&path, &document()).unwrap();
        let loaded = load_document(&path).unwrap();

        assert_eq!(loaded, document());
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn save_overwrites_previous_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        save_document(&path, &document()).unwrap();
        save_document(&path, &ConfigurationDocument::new()).unwrap();

        assert!(load_document(&path).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_document(&path), Err(StoreError::Decode { .. })));
    }

    #[test]
    fn duplicate_keys_are_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let mut doc = document();
        doc.entries.push(doc.entries[0].clone());
        fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        assert!(matches!(load_document(&path), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn conditional_save_requires_unchanged_base() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        save_document_if_unchanged(&path, &document(), Version::ZERO).unwrap();
        assert!(lock_path(&path).exists());

        let err = save_document_if_unchanged(&path, &ConfigurationDocument::new(), Version::ZERO)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict { expected, actual }
                if expected == Version::ZERO && actual == Version::new(12)
        ));
        assert_eq!(load_document(&path).unwrap(), document());

        save_document_if_unchanged(&path, &ConfigurationDocument::new(), Version::new(12))
            .unwrap();
        assert!(load_document(&path).unwrap().is_empty());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let lock = DocumentLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), lock_path(&path));
        drop(lock);

        // Would block forever if the first lock leaked
        let _again = DocumentLock::acquire(&path).unwrap();
    }

    #[test]
    fn store_resumes_at_persisted_version() {
        use std::sync::Arc;

        use crate::{ConfigurationStore, ManualClock};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        save_document(&path, &document()).unwrap();

        let store = ConfigurationStore::open(&path, Arc::new(ManualClock::new())).unwrap();
        assert_eq!(store.version(), Version::new(12));

        let next = store.compare_and_swap(Version::new(12), vec![]).unwrap();
        assert_eq!(next.version, Version::new(13));
        assert_eq!(next.cluster_time, ClusterTime::new(100));

        store.save(&path).unwrap();
        assert_eq!(load_document(&path).unwrap().version, Version::new(13));
    }
    #[test]
    fn second_store_on_same_file_cannot_overwrite() {
        use std::sync::Arc;

        use crate::{ConfigurationStore, ManualClock};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let first = ConfigurationStore::open(&path, Arc::new(ManualClock::new())).unwrap();
        let second = ConfigurationStore::open(&path, Arc::new(ManualClock::new())).unwrap();

        first.compare_and_swap(Version::ZERO, vec![keyed(1)]).unwrap();
        second.compare_and_swap(Version::ZERO, vec![keyed(2)]).unwrap();

        first.save(&path).unwrap();
        let err = second.save(&path).unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(second.persisted_version(), Version::ZERO);
        let on_disk = load_document(&path).unwrap();
        assert_eq!(on_disk.version, Version::new(1));
        assert_eq!(on_disk.entries, vec![keyed(1)]);

        // The same store keeps saving once its own save landed.
        first.compare_and_swap(Version::new(1), vec![keyed(1), keyed(3)]).unwrap();
        first.save(&path).unwrap();
        assert_eq!(load_document(&path).unwrap().version, Version::new(2));
    }

    #[test]
    fn concurrent_savers_never_drop_a_committed_entry() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        use crate::{ConfigurationStore, ManualClock};

        const WRITERS: u8 = 8;

        let dir = TempDir::new().unwrap();
        let path = Arc::new(dir.path().join("settings.json"));
        let barrier = Arc::new(Barrier::new(usize::from(WRITERS)));

        let handles: Vec<_> = (0..WRITERS)
            .map(|byte| {
                let path = Arc::clone(&path);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let store =
                        ConfigurationStore::open(&*path, Arc::new(ManualClock::new())).unwrap();
                    let base = store.read();
                    let mut entries = base.entries.clone();
                    entries.push(keyed(byte));
                    store.compare_and_swap(base.version, entries).unwrap();
                    store.save(&*path).map(|()| byte)
                })
            })
            .collect();

        let saved: Vec<u8> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap().ok())
            .collect();

        let on_disk = load_document(&path).unwrap();
        assert!(!saved.is_empty());
        assert_eq!(on_disk.version, Version::new(saved.len() as u64));
        for byte in saved {
            let key = ShapeKey::from_bytes([byte; 32]);
            assert!(on_disk.entries.iter().any(|e| e.shape_key == key));
        }
    }
}
