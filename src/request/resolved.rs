//! Resolved request descriptor

use std::fmt;

use serde::Serialize;

use crate::collection::{Authentication, Body, Header, NodeMeta};

/// A field that could not be fully resolved; the field keeps its raw text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionIssue {
    /// `url`, `header[Accept]`, `body`, `auth.token`, ...
    pub field: String,
    pub message: String,
}

impl fmt::Display for ResolutionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A request with every template substituted and inheritance merged.
///
/// Rebuilt on every resolution; never shared between requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRequest {
    pub name: String,
    pub path: String,
    pub method: String,
    pub url: String,
    /// Request headers first, then non-colliding inherited ones
    pub headers: Vec<Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Authentication>,
    pub meta: NodeMeta,
    pub has_after_response_script: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ResolutionIssue>,
}

impl ResolvedRequest {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// First header with this name, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.mime_type.as_deref())
    }
}
