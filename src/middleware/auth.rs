//! Authentication headers
//!
//! Turns a resolved collection authentication block into request headers.
//! Modelled as a closed sum type over the schemes a collection can declare.

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use thiserror::Error;

use crate::collection::AuthKind;

/// Header used by `apikey` authentication when the collection names none
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),
}

/// Authentication ready to be applied to outgoing headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// HTTP Basic Authentication (RFC 7617)
    Basic { username: String, password: String },
    /// Bearer token (RFC 6750); also used for OAuth 2 access tokens
    Bearer { token: String },
    /// Token sent under a custom header
    ApiKey { header: String, token: String },
    /// Unrecognised scheme: the token is the full Authorization value
    Raw { token: String },
}

impl Auth {
    /// Map a resolved collection block; `None` when nothing is to be sent
    pub fn from_kind(kind: &AuthKind) -> Option<Self> {
        let auth = match kind {
            AuthKind::None => return None,
            AuthKind::Basic { username, password } => Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthKind::Bearer { token } | AuthKind::OAuth2 { token } => Auth::Bearer { token: token.clone() },
            AuthKind::ApiKey { key, token } => Auth::ApiKey {
                header: if key.trim().is_empty() {
                    DEFAULT_API_KEY_HEADER.to_string()
                } else {
                    key.trim().to_string()
                },
                token: token.clone(),
            },
            AuthKind::Unknown { token, .. } if !token.is_empty() => Auth::Raw { token: token.clone() },
            AuthKind::Unknown { .. } => return None,
        };
        Some(auth)
    }

    /// Name of the header this scheme writes
    pub fn header_name(&self) -> &str {
        match self {
            Auth::ApiKey { header, .. } => header,
            _ => AUTHORIZATION.as_str(),
        }
    }

    /// Header value this scheme writes
    pub fn header_value(&self) -> String {
        match self {
            Auth::Basic { username, password } => {
                let credentials = format!("{}:{}", username, password);
                let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
                format!("Basic {}", encoded)
            }
            Auth::Bearer { token } => format!("Bearer {}", token),
            Auth::ApiKey { token, .. } | Auth::Raw { token } => token.clone(),
        }
    }

    /// Add the auth header unless the request already carries one by that name
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<bool, AuthError> {
        let name = HeaderName::try_from(self.header_name())
            .map_err(|e| AuthError::InvalidHeaderName(e.to_string()))?;
        if headers.contains_key(&name) {
            return Ok(false);
        }

        let value = HeaderValue::from_str(&self.header_value())
            .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
        headers.insert(name, value);
        Ok(true)
    }

    /// Authentication type name for display/debugging
    pub fn type_name(&self) -> &'static str {
        match self {
            Auth::Basic { .. } => "basic",
            Auth::Bearer { .. } => "bearer",
            Auth::ApiKey { .. } => "apikey",
            Auth::Raw { .. } => "raw",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(kind: AuthKind) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(auth) = Auth::from_kind(&kind) {
            auth.apply(&mut headers).unwrap();
        }
        headers
    }

    #[test]
    fn test_basic_auth() {
        let headers = applied(AuthKind::Basic {
            username: "user".into(),
            password: "pass".into(),
        });
        let value = headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(value.starts_with("Basic "));

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&value[6..])
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "user:pass");
    }

    #[test]
    fn test_bearer_and_oauth2() {
        let headers = applied(AuthKind::Bearer { token: "t1".into() });
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer t1");

        let headers = applied(AuthKind::OAuth2 { token: "t2".into() });
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer t2");
    }

    #[test]
    fn test_api_key_header_name() {
        let headers = applied(AuthKind::ApiKey { key: "X-Token".into(), token: "abc".into() });
        assert_eq!(headers.get("x-token").unwrap(), "abc");

        let headers = applied(AuthKind::ApiKey { key: "".into(), token: "abc".into() });
        assert_eq!(headers.get(DEFAULT_API_KEY_HEADER).unwrap(), "abc");
    }

    #[test]
    fn test_none_and_unknown() {
        assert!(applied(AuthKind::None).is_empty());
        assert!(applied(AuthKind::Unknown { scheme: "hawk".into(), token: "".into() }).is_empty());
        let headers = applied(AuthKind::Unknown { scheme: "hawk".into(), token: "Hawk id=1".into() });
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Hawk id=1");
    }

    #[test]
    fn test_explicit_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Custom x"));
        let auth = Auth::Bearer { token: "t".into() };
        assert!(!auth.apply(&mut headers).unwrap());
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Custom x");
    }
}
