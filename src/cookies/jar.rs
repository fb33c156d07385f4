//! In-memory cookie jar shared by every backend

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

use super::parse::{default_path, domain_matches, parse_set_cookie_header};

/// A stored cookie, serialized in the collection cookie-jar shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "root_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub host_only: bool,
    #[serde(default, deserialize_with = "flexible_time", skip_serializing_if = "Option::is_none")]
    pub creation: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_time", skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_time", skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// Seconds, relative to `creation`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn root_path() -> String {
    "/".to_string()
}

/// Accepts RFC 3339 / RFC 2822 strings, epoch milliseconds, or `"Infinity"` (no expiry)
fn flexible_time<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_rfc2822(s))
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        JsonValue::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Attributes for [`CookieStore::set_cookie`](super::CookieStore::set_cookie)
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub domain: String,
    pub path: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub host_only: bool,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub same_site: Option<String>,
}

impl CookieOptions {
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }
}

/// Selects cookies by domain and/or key
#[derive(Debug, Clone, Default)]
pub struct CookieFilter {
    pub domain: Option<String>,
    pub key: Option<String>,
}

impl CookieFilter {
    pub fn matches(&self, cookie: &Cookie) -> bool {
        let domain_ok = self
            .domain
            .as_deref()
            .map_or(true, |d| domain_matches(d, &cookie.domain) || d == cookie.domain);
        let key_ok = self.key.as_deref().map_or(true, |k| k == cookie.key);
        domain_ok && key_ok
    }
}

impl Cookie {
    pub fn from_options(key: &str, value: &str, options: CookieOptions, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            key: key.to_string(),
            value: value.to_string(),
            domain: options.domain,
            path: options.path.unwrap_or_else(root_path),
            secure: options.secure,
            http_only: options.http_only,
            host_only: options.host_only,
            creation: Some(now),
            last_accessed: Some(now),
            expires: options.expires,
            max_age: options.max_age,
            same_site: options.same_site,
        }
    }

    /// Expired once `now` passes `expires` or `creation + maxAge`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if let Some(expires) = self.expires {
            if now > expires {
                return true;
            }
        }
        if let (Some(max_age), Some(creation)) = (self.max_age, self.creation) {
            if now > creation + Duration::seconds(max_age) {
                return true;
            }
        }
        false
    }

    fn same_identity(&self, key: &str, domain: &str) -> bool {
        self.key == key && self.domain == domain
    }

    fn matches_request(&self, host: &str, path: &str, secure: bool) -> bool {
        let domain_ok = if self.host_only {
            host.eq_ignore_ascii_case(self.domain.trim_start_matches('.'))
        } else {
            domain_matches(host, &self.domain)
        };
        domain_ok && path.starts_with(self.path.as_str()) && (!self.secure || secure)
    }
}

/// Ordered list of cookies with `(domain, key)` identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieJar {
    #[serde(default)]
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn cookies(&self, filter: Option<&CookieFilter>) -> Vec<Cookie> {
        self.cookies
            .iter()
            .filter(|c| filter.map_or(true, |f| f.matches(c)))
            .cloned()
            .collect()
    }

    pub fn get(&self, key: &str, domain: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.same_identity(key, domain))
    }

    /// Insert or replace by identity, keeping the original creation time
    pub fn upsert(&mut self, mut cookie: Cookie) {
        match self
            .cookies
            .iter_mut()
            .find(|c| c.same_identity(&cookie.key, &cookie.domain))
        {
            Some(existing) => {
                if cookie.max_age.is_none() {
                    cookie.creation = existing.creation.or(cookie.creation);
                }
                if cookie.id.is_none() {
                    cookie.id = existing.id.take();
                }
                *existing = cookie;
            }
            None => self.cookies.push(cookie),
        }
    }

    pub fn remove(&mut self, key: &str, domain: &str) -> bool {
        let before = self.cookies.len();
        self.cookies.retain(|c| !c.same_identity(key, domain));
        before != self.cookies.len()
    }

    pub fn clear(&mut self, filter: Option<&CookieFilter>) -> usize {
        let before = self.cookies.len();
        match filter {
            Some(filter) => self.cookies.retain(|c| !filter.matches(c)),
            None => self.cookies.clear(),
        }
        before - self.cookies.len()
    }

    pub fn remove_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.cookies.len();
        self.cookies.retain(|c| !c.is_expired(now));
        before - self.cookies.len()
    }

    /// Build the `Cookie` header for `url`, marking matched cookies as accessed
    pub fn header_for(&mut self, url: &str, now: DateTime<Utc>) -> String {
        let Ok(parsed) = Url::parse(url) else {
            debug!(url, "cookie header skipped: unparseable url");
            return String::new();
        };
        let Some(host) = parsed.host_str() else {
            return String::new();
        };
        let secure = parsed.scheme() == "https";
        let path = parsed.path();

        let mut matched: Vec<&mut Cookie> = self
            .cookies
            .iter_mut()
            .filter(|c| !c.is_expired(now) && c.matches_request(host, path, secure))
            .collect();
        // Longer paths first; stable sort keeps insertion order otherwise
        matched.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        let mut pairs = Vec::with_capacity(matched.len());
        for cookie in matched {
            cookie.last_accessed = Some(now);
            pairs.push(format!("{}={}", cookie.key, cookie.value));
        }
        pairs.join("; ")
    }

    /// Apply `Set-Cookie` header values received from `url`; returns how many were stored
    pub fn apply_set_cookie_headers(&mut self, headers: &[String], url: &str, now: DateTime<Utc>) -> usize {
        let Ok(parsed) = Url::parse(url) else {
            warn!(url, "ignoring Set-Cookie from unparseable url");
            return 0;
        };
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let request_path = parsed.path().to_string();

        let mut stored = 0;
        for header in headers {
            let parsed_cookies = parse_set_cookie_header(header);
            if parsed_cookies.is_empty() {
                warn!(header = %header, "could not parse Set-Cookie header");
            }
            for raw in parsed_cookies {
                if self.apply_one(&raw, &host, &request_path, now) {
                    stored += 1;
                }
            }
        }
        stored
    }

    fn apply_one(&mut self, raw: &cookie::Cookie<'_>, host: &str, request_path: &str, now: DateTime<Utc>) -> bool {
        let (domain, host_only) = match raw.domain() {
            Some(attr) => {
                let attr = attr.trim_start_matches('.').to_ascii_lowercase();
                if !domain_matches(host, &attr) {
                    warn!(cookie = raw.name(), domain = %attr, host, "rejecting cookie for foreign domain");
                    return false;
                }
                (attr, false)
            }
            None => (host.to_string(), true),
        };

        let path = match raw.path() {
            Some(p) if p.starts_with('/') => p.to_string(),
            _ => default_path(request_path),
        };

        let max_age = raw.max_age().map(|d| d.whole_seconds());
        let expires = raw
            .expires_datetime()
            .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0));

        // Deletion: non-positive Max-Age, or Expires already passed without Max-Age
        let deleted = match (max_age, expires) {
            (Some(age), _) => age <= 0,
            (None, Some(at)) => at <= now,
            (None, None) => false,
        };
        if deleted {
            self.remove(raw.name(), &domain);
            return false;
        }

        self.upsert(Cookie {
            id: None,
            key: raw.name().to_string(),
            value: raw.value().to_string(),
            domain,
            path,
            secure: raw.secure().unwrap_or(false),
            http_only: raw.http_only().unwrap_or(false),
            host_only,
            creation: Some(now),
            last_accessed: Some(now),
            expires,
            max_age,
            same_site: raw.same_site().map(|s| s.to_string().to_ascii_lowercase()),
        });
        true
    }
}
