// Manages the on-disk catalog file.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to the serialized shape of Catalog or the entities it holds
// (Event, Keyword, Place, ...) require incrementing CATALOG_VERSION.
use crate::catalog::Catalog;
use crate::context::AppContext;
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

// Version history:
// - v1: events, keywords, places, organizations, data sources
// - v2: aggregates, licenses and languages stored in the same document
const CATALOG_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    version: u32,
    catalog: Catalog,
}

/// Tracks whether the last load of each catalog file succeeded, so a save
/// cannot overwrite a file we failed to read.
static LOAD_STATE_MAP: OnceLock<Mutex<HashMap<PathBuf, LoadState>>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Uninitialized,
    Success,
    Failed,
}

impl LoadState {
    fn get(path: &Path) -> LoadState {
        let map = LOAD_STATE_MAP.get_or_init(|| Mutex::new(HashMap::new()));
        map.lock()
            .map(|m| *m.get(path).unwrap_or(&LoadState::Uninitialized))
            .unwrap_or(LoadState::Uninitialized)
    }

    fn set(path: &Path, state: LoadState) {
        let map = LOAD_STATE_MAP.get_or_init(|| Mutex::new(HashMap::new()));
        if let Ok(mut m) = map.lock() {
            m.insert(path.to_path_buf(), state);
        }
    }
}

pub struct LocalStorage;

impl LocalStorage {
    /// Helper to get a sidecar lock file path
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Runs `f` while holding an exclusive lock on the file's sidecar.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: Write to .tmp file then rename
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    fn load_from_path(path: &Path) -> Result<Catalog> {
        if !path.exists() {
            LoadState::set(path, LoadState::Success);
            return Ok(Catalog::default());
        }
        let result = Self::with_lock(path, || {
            let json = fs::read_to_string(path)?;
            let file: CatalogFile = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse catalog {:?}", path))?;
            if file.version != CATALOG_VERSION {
                anyhow::bail!(
                    "Catalog {:?} has version {}, expected {}",
                    path,
                    file.version,
                    CATALOG_VERSION
                );
            }
            let mut catalog = file.catalog;
            catalog.rebuild_index();
            Ok(catalog)
        });

        match &result {
            Ok(_) => LoadState::set(path, LoadState::Success),
            Err(_) => LoadState::set(path, LoadState::Failed),
        }
        result
    }

    fn save_to_path(path: &Path, catalog: &Catalog) -> Result<()> {
        if LoadState::get(path) == LoadState::Failed {
            anyhow::bail!(
                "Cannot save {:?}: previous load failed. Refusing to overwrite data that couldn't be read.",
                path
            );
        }
        Self::with_lock(path, || {
            let data = CatalogFile {
                version: CATALOG_VERSION,
                catalog: catalog.clone(),
            };
            let json = serde_json::to_string_pretty(&data)?;
            Self::atomic_write(path, json)?;
            Ok(())
        })
    }

    pub fn load(ctx: &dyn AppContext) -> Result<Catalog> {
        Self::load_from_path(&ctx.get_catalog_path()?)
    }

    pub fn save(ctx: &dyn AppContext, catalog: &Catalog) -> Result<()> {
        Self::save_to_path(&ctx.get_catalog_path()?, catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;
    use crate::model::{DataSource, Event};

    #[test]
    fn test_missing_catalog_loads_empty() {
        let ctx = TestContext::new();
        let catalog = LocalStorage::load(&ctx).unwrap();
        assert_eq!(catalog.event_count(), 0);
        LocalStorage::save(&ctx, &catalog).unwrap();
    }

    #[test]
    fn test_save_and_reload_catalog() {
        let ctx = TestContext::new();
        let mut catalog = Catalog::default();
        catalog.get_or_create_data_source("kulke", "Kulttuurikeskus");
        catalog.insert_event(Event::new("kulke:1", "kulke", "ahjo:u4804001050"));
        LocalStorage::save(&ctx, &catalog).unwrap();

        let reloaded = LocalStorage::load(&ctx).unwrap();
        assert_eq!(reloaded.event_count(), 1);
        assert_eq!(
            reloaded.data_source("kulke"),
            Some(&DataSource {
                id: "kulke".into(),
                name: "Kulttuurikeskus".into()
            })
        );
    }

    #[test]
    fn test_corrupt_catalog_blocks_save() {
        let ctx = TestContext::new();
        let path = ctx.get_catalog_path().unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert!(LocalStorage::load(&ctx).is_err());
        assert!(LocalStorage::save(&ctx, &Catalog::default()).is_err());
        // The unreadable file is left untouched.
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let ctx = TestContext::new();
        let path = ctx.get_catalog_path().unwrap();
        let json = serde_json::json!({ "version": 1, "catalog": Catalog::default() });
        fs::write(&path, json.to_string()).unwrap();

        let err = LocalStorage::load(&ctx).unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }
}
