//! `{% response <field> <requestId> [path] [expiryMode] [maxAge] %}`
//!
//! Argument parsing and the cache policy live here; running the target
//! request is the chain resolver's job.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use futures::future::BoxFuture;

use super::{Directive, DirectiveContext};
use crate::errors::{ReqchainError, Result};

const B64_PREFIX: &str = "b64::";
const B64_SUFFIX: &str = "::46b";

/// Which part of the executed response to extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseField {
    Body,
    Json,
    Status,
    StatusText,
    Url,
    Method,
    Duration,
    /// Any other name is a response header (matched case-insensitively)
    Header(String),
}

impl ResponseField {
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "body" => ResponseField::Body,
            "json" => ResponseField::Json,
            "status" => ResponseField::Status,
            "statustext" => ResponseField::StatusText,
            "url" => ResponseField::Url,
            "method" => ResponseField::Method,
            "duration" => ResponseField::Duration,
            _ => ResponseField::Header(name.to_string()),
        }
    }
}

impl fmt::Display for ResponseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseField::Body => write!(f, "body"),
            ResponseField::Json => write!(f, "json"),
            ResponseField::Status => write!(f, "status"),
            ResponseField::StatusText => write!(f, "statustext"),
            ResponseField::Url => write!(f, "url"),
            ResponseField::Method => write!(f, "method"),
            ResponseField::Duration => write!(f, "duration"),
            ResponseField::Header(name) => write!(f, "header:{}", name.to_ascii_lowercase()),
        }
    }
}

/// Extraction path applied to `body`/`json` fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePath {
    JsonPath(String),
    XPath(String),
}

impl ResponsePath {
    /// Decode the base64 wrapper if present and classify the result
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let decoded = decode_path(raw);
        if decoded.is_empty() {
            return None;
        }
        if decoded.starts_with('/') || decoded.contains("//") || decoded.contains('@') {
            Some(ResponsePath::XPath(decoded))
        } else {
            Some(ResponsePath::JsonPath(decoded))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResponsePath::JsonPath(p) | ResponsePath::XPath(p) => p,
        }
    }
}

fn decode_base64(payload: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(payload))
        .ok()?;
    String::from_utf8(bytes).ok()
}

/// `b64::<payload>::46b` is always decoded. A bare payload is decoded only
/// when the result looks like a path (`$`, `.` or `/` first), so literal
/// paths such as `$.token` pass through unchanged.
fn decode_path(raw: &str) -> String {
    if let Some(payload) = raw
        .strip_prefix(B64_PREFIX)
        .and_then(|rest| rest.strip_suffix(B64_SUFFIX))
    {
        return decode_base64(payload).unwrap_or_else(|| raw.to_string());
    }
    match decode_base64(raw) {
        Some(decoded) if decoded.starts_with(['$', '.', '/']) => decoded,
        _ => raw.to_string(),
    }
}

/// Cache policy for a chained value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryMode {
    /// Reuse while `maxAge` has not elapsed
    #[default]
    WhenExpired,
    /// Reuse forever once cached
    Never,
    /// Never read nor write
    NoHistory,
    /// Always re-run; the value is still written
    Always,
}

impl FromStr for ExpiryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "when-expired" => Ok(ExpiryMode::WhenExpired),
            "never" => Ok(ExpiryMode::Never),
            "no-history" => Ok(ExpiryMode::NoHistory),
            "always" => Ok(ExpiryMode::Always),
            other => Err(format!("unknown expiry mode '{}'", other)),
        }
    }
}

/// Parsed `response` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTemplate {
    pub field: ResponseField,
    pub request_id: String,
    pub path: Option<ResponsePath>,
    pub expiry_mode: Option<ExpiryMode>,
    /// Seconds
    pub max_age: Option<u64>,
}

impl ResponseTemplate {
    pub fn parse(args: &[String]) -> Result<Self> {
        let field = args
            .first()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| ReqchainError::directive("response", "missing field argument"))?;
        let request_id = args
            .get(1)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ReqchainError::directive("response", "missing request id argument"))?;

        Ok(Self {
            field: ResponseField::parse(field),
            request_id: request_id.clone(),
            path: args.get(2).and_then(|p| ResponsePath::parse(p)),
            expiry_mode: args.get(3).and_then(|m| m.parse().ok()),
            max_age: args
                .get(4)
                .and_then(|a| a.trim().parse::<u64>().ok())
                .filter(|age| *age > 0),
        })
    }

    pub fn mode(&self) -> ExpiryMode {
        self.expiry_mode.unwrap_or_default()
    }

    /// Whether a cached value may be returned instead of running the request
    pub fn should_use_cache(&self) -> bool {
        match self.mode() {
            ExpiryMode::Never => true,
            ExpiryMode::Always | ExpiryMode::NoHistory => false,
            ExpiryMode::WhenExpired => self.max_age.is_some(),
        }
    }

    /// Whether the extracted value is written back
    pub fn should_cache_result(&self) -> bool {
        match self.mode() {
            ExpiryMode::Never | ExpiryMode::Always => true,
            ExpiryMode::NoHistory => false,
            ExpiryMode::WhenExpired => self.max_age.is_some(),
        }
    }

    /// TTL for the write; `None` caches until cleared
    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.mode() {
            ExpiryMode::Never | ExpiryMode::NoHistory => None,
            ExpiryMode::WhenExpired | ExpiryMode::Always => self.max_age.map(Duration::from_secs),
        }
    }

    /// Same coordinates map to the same slot wherever the template appears
    pub fn cache_key(&self) -> String {
        format!(
            "response:{}:{}:{}",
            self.request_id,
            self.field,
            self.path.as_ref().map_or("-", ResponsePath::as_str)
        )
    }
}

pub struct ResponseDirective;

impl Directive for ResponseDirective {
    fn name(&self) -> &'static str {
        "response"
    }

    fn evaluate<'a>(&'a self, args: &'a [String], ctx: &'a DirectiveContext<'a>) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let template = ResponseTemplate::parse(args)?;
            let Some(chain) = ctx.chain else {
                return Err(ReqchainError::directive(
                    "response",
                    "request chaining is not available in this context",
                ));
            };
            chain.resolver.resolve(&template, chain.executor, ctx.cache).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ResponseTemplate {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        ResponseTemplate::parse(&args).unwrap()
    }

    #[test]
    fn test_base64_wrapper_decodes() {
        let template = parse(&["body", "req_auth", "b64::JC5hY2Nlc3NfdG9rZW4=::46b"]);
        assert_eq!(template.path, Some(ResponsePath::JsonPath("$.access_token".into())));
    }

    #[test]
    fn test_bare_base64_and_literal_paths() {
        let template = parse(&["body", "req_auth", "JC5hY2Nlc3NfdG9rZW4="]);
        assert_eq!(template.path, Some(ResponsePath::JsonPath("$.access_token".into())));

        let template = parse(&["body", "req_auth", "$.data.id"]);
        assert_eq!(template.path, Some(ResponsePath::JsonPath("$.data.id".into())));
    }

    #[test]
    fn test_xpath_classification() {
        for path in ["/root/token", "//token", "//item/@id"] {
            let template = parse(&["body", "r", path]);
            assert_eq!(template.path, Some(ResponsePath::XPath(path.into())), "{}", path);
        }
    }

    #[test]
    fn test_field_names() {
        assert_eq!(ResponseField::parse("BODY"), ResponseField::Body);
        assert_eq!(ResponseField::parse("statusText"), ResponseField::StatusText);
        assert_eq!(
            ResponseField::parse("X-Request-Id"),
            ResponseField::Header("X-Request-Id".into())
        );
    }

    #[test]
    fn test_optional_arguments_ignored_when_invalid() {
        let template = parse(&["body", "r", "", "sometimes", "-5"]);
        assert_eq!(template.path, None);
        assert_eq!(template.expiry_mode, None);
        assert_eq!(template.max_age, None);

        let template = parse(&["body", "r", "", "never", "0"]);
        assert_eq!(template.expiry_mode, Some(ExpiryMode::Never));
        assert_eq!(template.max_age, None);
    }

    #[test]
    fn test_missing_required_arguments() {
        let args = vec!["body".to_string()];
        assert!(ResponseTemplate::parse(&args).unwrap_err().is_recoverable());
    }

    #[test]
    fn test_cache_policy_table() {
        let with = |mode: &str, age: &str| parse(&["body", "r", "", mode, age]);

        let never = with("never", "");
        assert!(never.should_use_cache() && never.should_cache_result());
        assert_eq!(never.cache_ttl(), None);

        let always = with("always", "30");
        assert!(!always.should_use_cache() && always.should_cache_result());
        assert_eq!(always.cache_ttl(), Some(Duration::from_secs(30)));

        let no_history = with("no-history", "30");
        assert!(!no_history.should_use_cache() && !no_history.should_cache_result());

        let timed = with("when-expired", "3600");
        assert!(timed.should_use_cache() && timed.should_cache_result());
        assert_eq!(timed.cache_ttl(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_when_expired_without_max_age_never_caches() {
        // Surprising but intentional: the default mode only caches with an explicit maxAge
        let untimed = parse(&["body", "r"]);
        assert_eq!(untimed.mode(), ExpiryMode::WhenExpired);
        assert!(!untimed.should_use_cache());
        assert!(!untimed.should_cache_result());
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = parse(&["body", "req_auth", "b64::JC5hY2Nlc3NfdG9rZW4=::46b", "never"]);
        let b = parse(&["BODY", "req_auth", "$.access_token", "always", "10"]);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "response:req_auth:body:$.access_token");
        assert_eq!(parse(&["status", "req_auth"]).cache_key(), "response:req_auth:status:-");
    }
}
