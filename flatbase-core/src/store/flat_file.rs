// src/store/flat_file.rs
//! Flat-file persistence for [`MemoryStore`]
//!
//! ```text
//! <root>/
//!   <database>/
//!     <collection>.json           JSON array of documents
//!     <collection>.indexes.json   JSON array of indexed field paths
//! ```
//!
//! Every file is written to a `.tmp` sibling first and renamed into place.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::memory::{CollectionData, MemoryStore};
use crate::document::Document;
use crate::error::{FlatbaseError, Result};
use crate::{log_debug, log_info, log_warn};

const DOCUMENTS_EXT: &str = "json";
const INDEXES_SUFFIX: &str = ".indexes.json";

impl MemoryStore {
    /// Load every database under `root`. A missing root is an empty store.
    pub fn open_dir(root: impl AsRef<Path>) -> Result<MemoryStore> {
        let root = root.as_ref();
        let mut databases = BTreeMap::new();

        if !root.exists() {
            log_info!("data directory {} does not exist, starting empty", root.display());
            return Ok(MemoryStore::new());
        }

        for entry in sorted_entries(root)? {
            if !entry.is_dir() {
                continue;
            }
            let Some(db_name) = file_name(&entry) else { continue };
            let collections = load_database(&entry)?;
            log_debug!("loaded database {} with {} collections", db_name, collections.len());
            databases.insert(db_name, collections);
        }

        Ok(MemoryStore::from_databases(databases))
    }

    /// Write every database under `root`, replacing stale collection files
    pub fn persist_dir(&self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;

        self.read_databases(|databases| -> Result<()> {
            for (db_name, collections) in databases {
                let db_dir = root.join(db_name);
                fs::create_dir_all(&db_dir)?;

                for (coll_name, data) in collections {
                    persist_collection(&db_dir, coll_name, data)?;
                }
                remove_stale_files(&db_dir, collections)?;
            }
            Ok(())
        })
    }
}

fn load_database(dir: &Path) -> Result<BTreeMap<String, CollectionData>> {
    let mut collections = BTreeMap::new();

    for path in sorted_entries(dir)? {
        let Some(name) = file_name(&path) else { continue };
        if name.ends_with(INDEXES_SUFFIX) || path.extension().and_then(|e| e.to_str()) != Some(DOCUMENTS_EXT) {
            continue;
        }
        let coll_name = name.trim_end_matches(".json").to_string();

        let mut data = CollectionData::default();
        let raw = fs::read_to_string(&path)?;
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&raw).map_err(|e| {
            FlatbaseError::Serialization(format!("{}: {}", path.display(), e))
        })?;

        let mut skipped = 0usize;
        for json in parsed {
            let doc = Document::from_json_value(json)?;
            if doc.id().is_none() {
                skipped += 1;
                continue;
            }
            data.add(doc)?;
        }
        if skipped > 0 {
            log_warn!("{}: skipped {} documents without a string _id", path.display(), skipped);
        }

        let index_path = dir.join(format!("{}{}", coll_name, INDEXES_SUFFIX));
        if index_path.exists() {
            let fields: Vec<String> = serde_json::from_str(&fs::read_to_string(&index_path)?)?;
            for field in fields {
                data.build_index(&field);
            }
        }

        collections.insert(coll_name, data);
    }

    Ok(collections)
}

fn persist_collection(db_dir: &Path, name: &str, data: &CollectionData) -> Result<()> {
    let docs: Vec<&Document> = data.documents.values().collect();
    write_atomic(&db_dir.join(format!("{}.{}", name, DOCUMENTS_EXT)), &serde_json::to_vec_pretty(&docs)?)?;

    let index_path = db_dir.join(format!("{}{}", name, INDEXES_SUFFIX));
    if data.indexes.is_empty() {
        if index_path.exists() {
            fs::remove_file(&index_path)?;
        }
    } else {
        let fields: Vec<&String> = data.indexes.keys().collect();
        write_atomic(&index_path, &serde_json::to_vec_pretty(&fields)?)?;
    }
    Ok(())
}

fn remove_stale_files(db_dir: &Path, collections: &BTreeMap<String, CollectionData>) -> Result<()> {
    for path in sorted_entries(db_dir)? {
        let Some(name) = file_name(&path) else { continue };
        let coll_name = match name.strip_suffix(INDEXES_SUFFIX) {
            Some(coll) => coll,
            None => match name.strip_suffix(".json") {
                Some(coll) => coll,
                None => continue,
            },
        };
        if !collections.contains_key(coll_name) {
            log_debug!("removing stale file {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Write to `<path>.tmp`, sync, then rename over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CollectionStore;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_root_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::open_dir(dir.path().join("absent")).unwrap();
        assert!(store.list_databases().is_empty());
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.json");
        write_atomic(&path, b"[]").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        assert!(!dir.path().join("c.json.tmp").exists());
    }

    #[test]
    fn test_dropped_collection_files_are_removed() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new();
        store
            .insert("db", "a", Document::from_json_value(json!({"_id": "1"})).unwrap())
            .unwrap();
        store
            .insert("db", "b", Document::from_json_value(json!({"_id": "2"})).unwrap())
            .unwrap();
        store.create_index("db", "b", "x").unwrap();
        store.persist_dir(dir.path()).unwrap();
        assert!(dir.path().join("db/b.indexes.json").exists());

        store.drop_collection("db", "b").unwrap();
        store.persist_dir(dir.path()).unwrap();
        assert!(dir.path().join("db/a.json").exists());
        assert!(!dir.path().join("db/b.json").exists());
        assert!(!dir.path().join("db/b.indexes.json").exists());

        let reopened = MemoryStore::open_dir(dir.path()).unwrap();
        assert_eq!(reopened.list_collections("db").unwrap(), vec!["a"]);
        assert_eq!(reopened.entry_count("db", "a").unwrap(), 1);
    }
}
