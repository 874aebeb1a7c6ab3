//! Resumable pagination progress
//!
//! After every scraped listing page the walker writes a [`CrawlProgress`]
//! snapshot. A later run against the same base URL can pick up at the page
//! after `last_page` with the earlier products already collected.

use crate::item::Item;
use crate::storage::{timestamp_now, StorageResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Snapshot of a pagination walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlProgress {
    pub base_url: String,
    pub last_page: u32,
    /// Pages scraped across every run of this walk, including resumed ones.
    /// Not just the pages of the run that saved it.
    pub pages_scraped: u32,
    pub total_products: usize,
    pub products: Vec<Item>,
    pub timestamp: String,
}

impl CrawlProgress {
    pub fn new(base_url: &str, last_page: u32, pages_scraped: u32, products: Vec<Item>) -> Self {
        Self {
            base_url: base_url.to_string(),
            last_page,
            pages_scraped,
            total_products: products.len(),
            products,
            timestamp: timestamp_now(),
        }
    }

    /// Progress only applies to a walk over the same listing
    pub fn matches(&self, base_url: &str) -> bool {
        self.base_url == base_url
    }
}

/// Reads and writes the progress file
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads saved progress
    ///
    /// A missing file is `Ok(None)`. An unreadable or corrupt file is logged
    /// and also treated as no progress, so a damaged file never blocks a
    /// fresh walk.
    pub fn load(&self) -> StorageResult<Option<CrawlProgress>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(progress) => Ok(Some(progress)),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable progress file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    pub fn save(&self, progress: &CrawlProgress) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(progress)?)?;
        tracing::debug!(
            "Saved progress: page {}, {} products",
            progress.last_page,
            progress.total_products
        );
        Ok(())
    }

    /// Removes the progress file; a file that is already gone is fine
    pub fn clear(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Cleared progress file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ProductFields;
    use tempfile::TempDir;

    fn item(n: u32) -> Item {
        Item::stub(ProductFields {
            name: format!("Product {}", n),
            url: format!("https://shop.test/p/{}", n),
            ..Default::default()
        })
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("nested/progress.json"));

        let progress = CrawlProgress::new("https://shop.test/list", 3, 3, vec![item(1), item(2)]);
        store.save(&progress).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, progress);
        assert_eq!(loaded.total_products, 2);
        assert!(loaded.matches("https://shop.test/list"));
        assert!(!loaded.matches("https://shop.test/other"));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{ truncated").unwrap();

        assert!(ProgressStore::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        store
            .save(&CrawlProgress::new("https://shop.test/list", 1, 1, vec![item(1)]))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        for key in ["base_url", "last_page", "pages_scraped", "total_products", "products", "timestamp"] {
            assert!(raw.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(raw["products"][0]["name"], "Product 1");
        assert!(raw["products"][0].get("highlights").is_none());
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::new(dir.path().join("progress.json"));
        store
            .save(&CrawlProgress::new("https://shop.test/list", 1, 1, vec![]))
            .unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
    }
}
