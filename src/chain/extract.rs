//! Field and path extraction from an executed response
//!
//! JSONPath and XPath are minimal subsets. XPath is regex based: nested
//! elements with the same tag name, and attribute values containing `>`,
//! are not handled correctly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::client::ExecutedResponse;
use crate::directives::{ResponseField, ResponsePath};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.:-]*$").expect("Invalid name regex"));

/// Extract `field` from `response`; `None` stands for an undefined value
pub fn extract_field(
    response: &ExecutedResponse,
    field: &ResponseField,
    path: Option<&ResponsePath>,
) -> Option<String> {
    match field {
        ResponseField::Body | ResponseField::Json => match path {
            None => Some(response.body.clone()),
            Some(ResponsePath::JsonPath(p)) => json_path(&response.body, p),
            Some(ResponsePath::XPath(p)) => xpath(&response.body, p),
        },
        ResponseField::Status => Some(response.status.to_string()),
        ResponseField::StatusText => Some(response.status_text.clone()),
        ResponseField::Url => Some(response.url.clone()),
        ResponseField::Method => Some(response.method.clone()),
        ResponseField::Duration => Some(response.duration_ms.to_string()),
        ResponseField::Header(name) => response.header(name).map(str::to_string),
    }
}

/// Walk a `$.a.b.c` path over the JSON text in `source`
pub fn json_path(source: &str, path: &str) -> Option<String> {
    let document: JsonValue = serde_json::from_str(source).ok()?;
    json_path_value(&document, path).map(json_text)
}

/// Object-only walk; missing keys and non-object intermediates are undefined
pub fn json_path_value<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);

    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Strings as-is, everything else in its JSON form
fn json_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `//tag`, `//tag/@attr` and `/a/b/c`
pub fn xpath(source: &str, path: &str) -> Option<String> {
    if let Some(rest) = path.strip_prefix("//") {
        return match rest.split_once("/@") {
            Some((tag, attr)) => attribute_value(source, tag, attr),
            None => element_text(source, rest).map(|inner| text_content(&inner)),
        };
    }

    let steps: Vec<&str> = path.strip_prefix('/')?.split('/').collect();
    if steps.iter().any(|s| s.is_empty()) {
        return None;
    }
    let mut content = source.to_string();
    for step in steps {
        content = element_text(&content, step)?;
    }
    Some(text_content(&content))
}

/// Inner markup of the first `<tag>...</tag>`
fn element_text(source: &str, tag: &str) -> Option<String> {
    if !NAME_RE.is_match(tag) {
        return None;
    }
    let tag = regex::escape(tag);
    let pattern = format!(r"(?s)<{tag}(?:\s[^>]*)?(?:/>|>(.*?)</{tag}\s*>)");
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(source)?;
    Some(caps.get(1).map_or_else(String::new, |m| m.as_str().to_string()))
}

fn attribute_value(source: &str, tag: &str, attr: &str) -> Option<String> {
    if !NAME_RE.is_match(tag) || !NAME_RE.is_match(attr) {
        return None;
    }
    let open = Regex::new(&format!(r"<{}(?:\s[^>]*)?/?>", regex::escape(tag))).ok()?;
    let attr_re = Regex::new(&format!(
        r#"\s{}\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(attr)
    ))
    .ok()?;

    // First element carrying the attribute
    let found = open.find_iter(source).find_map(|element| {
        let caps = attr_re.captures(element.as_str())?;
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string())
    });
    found
}

fn text_content(markup: &str) -> String {
    TAG_RE.replace_all(markup, "").trim().to_string()
}
