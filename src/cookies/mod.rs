//! Cookie store
//!
//! Domain/path-aware cookie jar with Set-Cookie parsing and Cookie header
//! synthesis. The jar logic lives in [`jar`]; backends only decide where
//! the jar is kept between operations.

pub mod file;
pub mod jar;
pub mod memory;
pub mod parse;

pub use file::FileCookieStore;
pub use jar::{Cookie, CookieFilter, CookieJar, CookieOptions};
pub use memory::MemoryCookieStore;
pub use parse::{domain_matches, parse_set_cookie_header};

use chrono::Utc;

use crate::errors::Result;

/// Pluggable cookie storage.
///
/// Backends implement [`CookieStore::transact`]; every other operation is
/// expressed on top of it so all backends share the same semantics.
/// Identity of a stored cookie is `(domain, key)`.
pub trait CookieStore: Send + Sync {
    /// Run `f` against the jar; persist when it returns `true`
    fn transact(&self, f: &mut dyn FnMut(&mut CookieJar) -> bool) -> Result<()>;

    fn get_cookies(&self, filter: Option<&CookieFilter>) -> Result<Vec<Cookie>> {
        let mut out = Vec::new();
        self.transact(&mut |jar| {
            let removed = jar.remove_expired(Utc::now());
            out = jar.cookies(filter);
            removed > 0
        })?;
        Ok(out)
    }

    fn get_cookie(&self, key: &str, domain: &str) -> Result<Option<Cookie>> {
        let mut out = None;
        self.transact(&mut |jar| {
            let removed = jar.remove_expired(Utc::now());
            out = jar.get(key, domain).cloned();
            removed > 0
        })?;
        Ok(out)
    }

    fn set_cookie(&self, key: &str, value: &str, options: CookieOptions) -> Result<()> {
        let cookie = Cookie::from_options(key, value, options, Utc::now());
        self.transact(&mut |jar| {
            jar.upsert(cookie.clone());
            true
        })
    }

    fn remove_cookie(&self, key: &str, domain: &str) -> Result<bool> {
        let mut removed = false;
        self.transact(&mut |jar| {
            removed = jar.remove(key, domain);
            removed
        })?;
        Ok(removed)
    }

    fn clear_cookies(&self, filter: Option<&CookieFilter>) -> Result<usize> {
        let mut count = 0;
        self.transact(&mut |jar| {
            count = jar.clear(filter);
            count > 0
        })?;
        Ok(count)
    }

    /// `Cookie` header value for `url` (`k=v; k2=v2`), empty when nothing matches
    fn get_cookie_header(&self, url: &str) -> Result<String> {
        let mut header = String::new();
        self.transact(&mut |jar| {
            let now = Utc::now();
            jar.remove_expired(now);
            header = jar.header_for(url, now);
            true
        })?;
        Ok(header)
    }

    /// Store every cookie carried by the given `Set-Cookie` header values
    fn process_set_cookie_headers(&self, headers: &[String], url: &str) -> Result<usize> {
        let mut stored = 0;
        self.transact(&mut |jar| {
            stored = jar.apply_set_cookie_headers(headers, url, Utc::now());
            true
        })?;
        Ok(stored)
    }

    /// Bulk seed from a collection cookie jar
    fn load_from_insomnia_config(&self, cookies: &[Cookie]) -> Result<usize> {
        let now = Utc::now();
        let mut loaded = 0;
        self.transact(&mut |jar| {
            loaded = 0;
            for cookie in cookies {
                if cookie.is_expired(now) {
                    continue;
                }
                jar.upsert(cookie.clone());
                loaded += 1;
            }
            loaded > 0
        })?;
        Ok(loaded)
    }

    fn get_cookie_count(&self) -> Result<usize> {
        let mut count = 0;
        self.transact(&mut |jar| {
            let removed = jar.remove_expired(Utc::now());
            count = jar.len();
            removed > 0
        })?;
        Ok(count)
    }
}
