//! Process-local cookie store

use std::sync::Mutex;

use super::{CookieJar, CookieStore};
use crate::errors::{ReqchainError, Result};

/// Cookie store that lives for the duration of the process
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    jar: Mutex<CookieJar>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieStore {
    fn transact(&self, f: &mut dyn FnMut(&mut CookieJar) -> bool) -> Result<()> {
        let mut jar = self
            .jar
            .lock()
            .map_err(|_| ReqchainError::Cookie("cookie jar lock poisoned".to_string()))?;
        f(&mut *jar);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::{CookieFilter, CookieOptions};

    #[test]
    fn test_set_get_remove() {
        let store = MemoryCookieStore::new();
        store
            .set_cookie("sid", "abc", CookieOptions::for_domain("example.com"))
            .unwrap();

        let cookie = store.get_cookie("sid", "example.com").unwrap().unwrap();
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.path, "/");
        assert_eq!(store.get_cookie_count().unwrap(), 1);

        assert!(store.remove_cookie("sid", "example.com").unwrap());
        assert!(store.get_cookie("sid", "example.com").unwrap().is_none());
    }

    #[test]
    fn test_clear_with_filter() {
        let store = MemoryCookieStore::new();
        store.set_cookie("a", "1", CookieOptions::for_domain("a.com")).unwrap();
        store.set_cookie("b", "2", CookieOptions::for_domain("b.com")).unwrap();

        let filter = CookieFilter {
            domain: Some("a.com".into()),
            key: None,
        };
        assert_eq!(store.clear_cookies(Some(&filter)).unwrap(), 1);
        assert_eq!(store.get_cookies(None).unwrap().len(), 1);
        assert_eq!(store.clear_cookies(None).unwrap(), 1);
    }

    #[test]
    fn test_round_trip_through_headers() {
        let store = MemoryCookieStore::new();
        store
            .process_set_cookie_headers(&["token=t1; Path=/".to_string()], "http://localhost:8080/login")
            .unwrap();
        assert_eq!(
            store.get_cookie_header("http://localhost:8080/profile").unwrap(),
            "token=t1"
        );
    }
}
