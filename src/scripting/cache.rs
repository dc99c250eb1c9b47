use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Lowercase hex SHA-1 of `data`, 40 characters long.
pub fn sha1_hex(data: impl AsRef<[u8]>) -> String {
    sha1_smol::Sha1::from(data).digest().to_string()
}

/// Script sources addressed by their SHA-1 digest. Every key is the digest of its source.
#[derive(Debug, Default)]
pub struct ScriptCache {
    scripts: RwLock<HashMap<String, Arc<str>>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `source` and returns its digest. Loading the same source again is a no-op.
    pub fn load(&self, source: &str) -> String {
        let digest = sha1_hex(source);

        if !self.exists(&digest) {
            self.scripts
                .write()
                .entry(digest.clone())
                .or_insert_with(|| Arc::from(source));
        }

        digest
    }

    pub fn get(&self, digest: &str) -> Option<Arc<str>> {
        self.scripts.read().get(&digest.to_ascii_lowercase()).cloned()
    }

    pub fn exists(&self, digest: &str) -> bool {
        self.scripts
            .read()
            .contains_key(&digest.to_ascii_lowercase())
    }

    pub fn flush(&self) {
        self.scripts.write().clear();
    }

    pub fn len(&self) -> usize {
        self.scripts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
