// File: ./src/context.rs
//! Where linkedevents keeps its files.
//!
//! ```text
//! <data dir>/catalog.json        places, keywords, events, aggregates
//! <data dir>/import/kulke/*.xml  default location of the Kulke exports
//! <config dir>/config.toml
//! ```
//!
//! Importers, storage and the CLI receive a `&dyn AppContext` instead of
//! looking the directories up themselves, so integration tests can point a
//! whole import run at a throwaway `TestContext`.

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

pub const CATALOG_FILENAME: &str = "catalog.json";
pub const CONFIG_FILENAME: &str = "config.toml";

pub trait AppContext: Send + Sync + std::fmt::Debug {
    fn get_data_dir(&self) -> Result<PathBuf>;
    fn get_config_dir(&self) -> Result<PathBuf>;

    fn get_config_file_path(&self) -> Result<PathBuf> {
        Ok(self.get_config_dir()?.join(CONFIG_FILENAME))
    }

    fn get_catalog_path(&self) -> Result<PathBuf> {
        Ok(self.get_data_dir()?.join(CATALOG_FILENAME))
    }

    /// Parent of the per-importer feed directories, used when the config
    /// has no `import_file_path`.
    fn get_import_dir(&self) -> Result<PathBuf> {
        Ok(self.get_data_dir()?.join("import"))
    }
}

fn create_dir(path: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&path).with_context(|| format!("Failed to create directory: {:?}", path))?;
    Ok(path)
}

/// Platform directories for `fi.hel.linkedevents`, or `data/` and
/// `config/` under the `--root` given on the command line.
#[derive(Clone, Debug)]
pub struct StandardContext {
    override_root: Option<PathBuf>,
}

impl StandardContext {
    pub fn new(override_root: Option<PathBuf>) -> Self {
        Self { override_root }
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("fi", "hel", "linkedevents")
            .ok_or_else(|| anyhow!("Cannot locate a home directory for the catalog"))
    }
}

impl AppContext for StandardContext {
    fn get_data_dir(&self) -> Result<PathBuf> {
        match &self.override_root {
            Some(root) => create_dir(root.join("data")),
            None => create_dir(Self::project_dirs()?.data_dir().to_path_buf()),
        }
    }

    fn get_config_dir(&self) -> Result<PathBuf> {
        match &self.override_root {
            Some(root) => create_dir(root.join("config")),
            None => create_dir(Self::project_dirs()?.config_dir().to_path_buf()),
        }
    }
}

/// A fresh `linkedevents_test_<uuid>` directory under the system temp dir.
/// Fixtures and feeds are written into `root`; everything is removed on drop.
#[derive(Clone, Debug)]
pub struct TestContext {
    pub root: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("linkedevents_test_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).expect("failed to create test directory");
        Self { root }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext for TestContext {
    fn get_data_dir(&self) -> Result<PathBuf> {
        create_dir(self.root.join("data"))
    }

    fn get_config_dir(&self) -> Result<PathBuf> {
        create_dir(self.root.join("config"))
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
