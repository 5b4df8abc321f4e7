use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::Result;

/// Persisted outcome of importing one source page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    #[serde(rename = "destinationId", alias = "notion_id")]
    pub destination_id: String,
    pub checksum: String,
    #[serde(alias = "ts")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    pages: BTreeMap<String, PageState>,
}

/// Keyed idempotency store, read once and rewritten whole on every change.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: StateFile,
}

impl StateStore {
    /// Loads the store at `path`; a missing or unreadable file starts empty.
    pub fn load(path: &Path) -> Self {
        let state = match fs::read(path) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "could not parse state, starting fresh");
                StateFile::default()
            }),
            Err(_) => StateFile::default(),
        };
        Self {
            path: path.to_path_buf(),
            state,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let s = serde_json::to_string_pretty(&self.state)?;
        let mut f = fs::File::create(&self.path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PageState> {
        self.state.pages.get(key)
    }

    /// Records a completed page and rewrites the file.
    pub fn set(&mut self, key: &str, destination_id: &str, checksum: &str) -> Result<()> {
        self.state.pages.insert(
            key.to_string(),
            PageState {
                destination_id: destination_id.to_string(),
                checksum: checksum.to_string(),
                timestamp: chrono::Utc::now().timestamp(),
            },
        );
        self.save()
    }

    pub fn is_unchanged(&self, key: &str, checksum: &str) -> bool {
        self.get(key).is_some_and(|s| s.checksum == checksum)
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.state.pages.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.state.pages.clear();
        self.save()
    }

    pub fn pages(&self) -> impl Iterator<Item = (&str, &PageState)> {
        self.state.pages.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.state.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.pages.is_empty()
    }
}

/// Composite idempotency key of a source page.
pub fn page_key(site: &str, notebook: &str, section: &str, page: &str) -> String {
    format!("{}:{}:{}:{}", site, notebook, section, page)
}

/// Hex digest of the raw page markup.
pub fn checksum(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let mut store = StateStore::load(&path);
        assert!(store.is_empty());
        store.set("s:n:c:p", "dest-1", "abc").unwrap();

        let reloaded = StateStore::load(&path);
        assert_eq!(reloaded.len(), 1);
        let page = reloaded.get("s:n:c:p").unwrap();
        assert_eq!(page.destination_id, "dest-1");
        assert!(reloaded.is_unchanged("s:n:c:p", "abc"));
        assert!(!reloaded.is_unchanged("s:n:c:p", "def"));
        assert!(!reloaded.is_unchanged("other", "abc"));
    }

    #[test]
    fn reads_legacy_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"pages":{"a:b:c:d":{"notion_id":"n1","checksum":"x","ts":17}}}"#,
        )
        .unwrap();
        let store = StateStore::load(&path);
        assert_eq!(store.get("a:b:c:d").unwrap().timestamp, 17);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        assert!(StateStore::load(&path).is_empty());
    }

    #[test]
    fn remove_and_clear_rewrite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = StateStore::load(&path);
        store.set("k1", "d1", "c1").unwrap();
        store.set("k2", "d2", "c2").unwrap();
        store.remove("k1").unwrap();
        assert_eq!(StateStore::load(&path).len(), 1);
        store.clear().unwrap();
        assert!(StateStore::load(&path).is_empty());
    }

    #[test]
    fn key_and_checksum_shapes() {
        assert_eq!(page_key("s", "n", "c", "p"), "s:n:c:p");
        let sum = checksum(b"<html></html>");
        assert_eq!(sum.len(), 64);
        assert_eq!(sum, checksum(b"<html></html>"));
        assert_ne!(sum, checksum(b"<html> </html>"));
    }
}
