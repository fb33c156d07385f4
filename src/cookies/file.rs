//! JSON-file cookie store
//!
//! The whole jar is one document. Every operation reads it, applies the
//! change, and writes it back atomically while holding the store lock, so
//! two operations in the same process never lose each other's updates.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::{CookieJar, CookieStore};
use crate::errors::{ReqchainError, Result};
use crate::utils::{read_if_exists, write_atomic};

#[derive(Debug)]
pub struct FileCookieStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<CookieJar> {
        let Some(content) = read_if_exists(&self.path)? else {
            return Ok(CookieJar::new());
        };
        if content.trim().is_empty() {
            return Ok(CookieJar::new());
        }
        match serde_json::from_str(&content) {
            Ok(jar) => Ok(jar),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cookie file is corrupt, starting empty");
                Ok(CookieJar::new())
            }
        }
    }

    fn save(&self, jar: &CookieJar) -> Result<()> {
        let content = serde_json::to_vec_pretty(jar)?;
        write_atomic(&self.path, &content)
            .map_err(|e| ReqchainError::Cookie(format!("Failed to save cookies: {}", e)))
    }
}

impl CookieStore for FileCookieStore {
    fn transact(&self, f: &mut dyn FnMut(&mut CookieJar) -> bool) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ReqchainError::Cookie("cookie file lock poisoned".to_string()))?;
        let mut jar = self.load()?;
        if f(&mut jar) {
            self.save(&jar)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieOptions;
    use tempfile::TempDir;

    #[test]
    fn test_persists_between_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");

        let store = FileCookieStore::new(&path);
        store
            .set_cookie("sid", "abc", CookieOptions::for_domain("example.com"))
            .unwrap();
        drop(store);

        let reopened = FileCookieStore::new(&path);
        assert_eq!(reopened.get_cookie_count().unwrap(), 1);
        assert_eq!(
            reopened.get_cookie_header("http://example.com/").unwrap(),
            "sid=abc"
        );
    }

    #[test]
    fn test_missing_and_corrupt_files_read_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        let store = FileCookieStore::new(&path);
        assert_eq!(store.get_cookie_count().unwrap(), 0);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(store.get_cookie_count().unwrap(), 0);
    }
}
