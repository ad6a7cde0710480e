use serde::{ Deserialize, Serialize };
use sha2::{ Digest, Sha256 };
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

pub const DOCSTORE_FILE: &str = "docstore.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRecord {
    pub hash: String,
    pub chunk_count: usize,
}

/// Which documents are in the index and the content hash they were indexed with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocStore {
    pub docs: BTreeMap<String, DocRecord>,
}

pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

impl DocStore {
    /// Loads `<dir>/docstore.json`, or an empty store when it was never persisted.
    pub fn load(dir: &Path) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let path = dir.join(DOCSTORE_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs
            ::read_to_string(&path)
            .map_err(|e| format!("Failed to read document store {}: {}", path.display(), e))?;
        let store = serde_json
            ::from_str(&text)
            .map_err(|e| format!("Failed to parse document store {}: {}", path.display(), e))?;
        Ok(store)
    }

    pub fn persist(&self, dir: &Path) -> Result<(), Box<dyn Error + Send + Sync>> {
        fs::create_dir_all(dir)?;
        let path = dir.join(DOCSTORE_FILE);
        let tmp = dir.join(format!("{}.tmp", DOCSTORE_FILE));
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn is_current(&self, doc_id: &str, hash: &str) -> bool {
        self.docs.get(doc_id).map(|r| r.hash == hash).unwrap_or(false)
    }

    pub fn upsert(&mut self, doc_id: &str, hash: String, chunk_count: usize) {
        self.docs.insert(doc_id.to_string(), DocRecord { hash, chunk_count });
    }

    pub fn remove(&mut self, doc_id: &str) -> Option<DocRecord> {
        self.docs.remove(doc_id)
    }

    /// Ids that are stored but not in `present`.
    pub fn stale_ids<'a>(&'a self, present: &[&str]) -> Vec<&'a str> {
        self.docs
            .keys()
            .map(String::as_str)
            .filter(|id| !present.contains(id))
            .collect()
    }
}
