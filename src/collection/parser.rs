//! Collection document loader
//!
//! Reads an Insomnia v5 style export (YAML, or JSON as a YAML subset):
//!
//! ```yaml
//! type: collection.insomnia.rest/5.0
//! name: Demo
//! collection:
//!   - name: Auth
//!     meta: { id: fld_auth }
//!     children:
//!       - url: "{{ _.base }}/login"
//!         name: Login
//!         method: POST
//!         meta: { id: req_auth }
//! cookieJar:
//!   cookies: []
//! environments:
//!   name: Base Environment
//!   data: { base: "http://localhost:8080" }
//!   subEnvironments:
//!     - name: Staging
//!       data: { base: "https://staging.example.com" }
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use super::environment::Environment;
use super::node::{
    AuthKind, Authentication, Body, BodyContent, BodyParam, ConfigNode, Folder, Header, NodeMeta,
    Request,
};
use super::tree::ConfigTree;
use crate::cookies::Cookie;
use crate::errors::{ReqchainError, Result};

/// Maximum collection file size (10MB) to prevent memory exhaustion
pub const MAX_COLLECTION_FILE_SIZE: u64 = 10 * 1024 * 1024;

const DOCUMENT_TYPE_PREFIX: &str = "collection.insomnia.rest/";

/// Environment selection and external overrides applied while loading
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Sub-environment to layer over the base environment
    pub environment: Option<String>,
    /// Values that win over the collection's own environment data
    pub overrides: IndexMap<String, String>,
}

/// Load a collection from disk
pub fn load_collection(path: &Path, options: &LoadOptions) -> Result<ConfigTree> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_COLLECTION_FILE_SIZE {
        return Err(ReqchainError::parse(
            path.display().to_string(),
            format!(
                "collection file too large: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_COLLECTION_FILE_SIZE
            ),
        ));
    }

    let content = fs::read_to_string(path)?;
    parse_collection(&content, options)
}

/// Parse collection text
pub fn parse_collection(content: &str, options: &LoadOptions) -> Result<ConfigTree> {
    let document: JsonValue = serde_yaml::from_str(content)?;
    parse_document(document, options)
}

/// Build the tree from an already-parsed document
pub fn parse_document(document: JsonValue, options: &LoadOptions) -> Result<ConfigTree> {
    let root = document
        .as_object()
        .ok_or_else(|| ReqchainError::parse("document", "expected a mapping at the top level"))?;

    if let Some(kind) = root.get("type").and_then(JsonValue::as_str) {
        if !kind.starts_with(DOCUMENT_TYPE_PREFIX) {
            warn!(document_type = kind, "unexpected collection type, parsing anyway");
        }
    }

    let name = root
        .get("name")
        .and_then(JsonValue::as_str)
        .unwrap_or("Collection")
        .to_string();

    let nodes = match root.get("collection") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => parse_nodes(items, "collection")?,
        Some(_) => return Err(ReqchainError::parse("collection", "expected a list of nodes")),
    };

    let environment = parse_environment(root.get("environments"), options)?;
    let cookies = parse_cookie_jar(root.get("cookieJar"))?;

    debug!(
        collection = %name,
        nodes = nodes.len(),
        cookies = cookies.len(),
        environment = %environment.name,
        "collection parsed"
    );

    Ok(ConfigTree::new(name, nodes, environment, cookies, document))
}

fn parse_nodes(items: &[JsonValue], parent: &str) -> Result<Vec<ConfigNode>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_node(item, &format!("{}[{}]", parent, index)))
        .collect()
}

fn parse_node(value: &JsonValue, position: &str) -> Result<ConfigNode> {
    let object = value
        .as_object()
        .ok_or_else(|| ReqchainError::parse(position, "expected a mapping"))?;
    // Errors name the node when it has a name, its position otherwise
    let label = object
        .get("name")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| position.to_string());

    if object.contains_key("children") {
        parse_folder(object, &label, position).map(ConfigNode::Folder)
    } else if object.contains_key("url") || object.contains_key("method") {
        parse_request(object, &label).map(ConfigNode::Request)
    } else {
        Err(ReqchainError::parse(
            label,
            "node is neither a folder (children) nor a request (url, method)",
        ))
    }
}

fn parse_folder(object: &Map<String, JsonValue>, label: &str, position: &str) -> Result<Folder> {
    let name = required_str(object, "name", label)?;
    let meta = parse_meta(object, label)?;
    let children = object
        .get("children")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| ReqchainError::parse(label, "folder 'children' must be a list"))?;

    Ok(Folder {
        meta,
        name,
        children: parse_nodes(children, &format!("{}.children", position))?,
        headers: parse_headers(object.get("headers"), label)?,
        authentication: parse_authentication(object.get("authentication"), label)?,
    })
}

fn parse_request(object: &Map<String, JsonValue>, label: &str) -> Result<Request> {
    let after_response_script = object
        .get("scripts")
        .and_then(|s| s.get("afterResponse"))
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    Ok(Request {
        url: required_str(object, "url", label)?,
        name: required_str(object, "name", label)?,
        method: required_str(object, "method", label)?.to_ascii_uppercase(),
        meta: parse_meta(object, label)?,
        body: parse_body(object.get("body"), label)?,
        headers: parse_headers(object.get("headers"), label)?,
        authentication: parse_authentication(object.get("authentication"), label)?,
        after_response_script,
    })
}

fn required_str(object: &Map<String, JsonValue>, key: &str, label: &str) -> Result<String> {
    match object.get(key) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(_) => Err(ReqchainError::parse(label, format!("'{}' must be a string", key))),
        None => Err(ReqchainError::parse(label, format!("missing required field '{}'", key))),
    }
}

fn parse_meta(object: &Map<String, JsonValue>, label: &str) -> Result<NodeMeta> {
    let meta = object
        .get("meta")
        .and_then(JsonValue::as_object)
        .ok_or_else(|| ReqchainError::parse(label, "missing required field 'meta.id'"))?;
    let id = match meta.get("id") {
        Some(JsonValue::String(id)) if !id.is_empty() => id.clone(),
        _ => return Err(ReqchainError::parse(label, "missing required field 'meta.id'")),
    };

    Ok(NodeMeta {
        id,
        created_at: meta.get("created").and_then(JsonValue::as_i64),
        modified_at: meta.get("modified").and_then(JsonValue::as_i64),
        sort_key: meta.get("sortKey").and_then(JsonValue::as_f64),
        is_private: meta.get("isPrivate").and_then(JsonValue::as_bool),
    })
}

/// Scalars become their text form; null becomes empty
fn scalar_text(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn flag(object: &Map<String, JsonValue>, key: &str) -> bool {
    object.get(key).and_then(JsonValue::as_bool).unwrap_or(false)
}

fn parse_headers(value: Option<&JsonValue>, label: &str) -> Result<Vec<Header>> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| ReqchainError::parse(label, "'headers' must be a list"))?;

    items
        .iter()
        .map(|item| {
            let header = item
                .as_object()
                .ok_or_else(|| ReqchainError::parse(label, "header entries must be mappings"))?;
            Ok(Header {
                name: scalar_text(header.get("name")),
                value: scalar_text(header.get("value")),
                disabled: flag(header, "disabled"),
            })
        })
        .collect()
}

fn parse_body(value: Option<&JsonValue>, label: &str) -> Result<Option<Body>> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let body = value
        .as_object()
        .ok_or_else(|| ReqchainError::parse(label, "'body' must be a mapping"))?;
    let mime_type = body
        .get("mimeType")
        .and_then(JsonValue::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    let content = if let Some(params) = body.get("params") {
        let params = params
            .as_array()
            .ok_or_else(|| ReqchainError::parse(label, "body 'params' must be a list"))?;
        BodyContent::Params(
            params
                .iter()
                .filter_map(JsonValue::as_object)
                .map(|p| BodyParam {
                    name: scalar_text(p.get("name")),
                    value: scalar_text(p.get("value")),
                    disabled: flag(p, "disabled"),
                })
                .collect(),
        )
    } else if let Some(text) = body.get("text") {
        BodyContent::Text(scalar_text(Some(text)))
    } else {
        return Ok(None);
    };

    Ok(Some(Body { mime_type, content }))
}

fn parse_authentication(value: Option<&JsonValue>, label: &str) -> Result<Option<Authentication>> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let auth = value
        .as_object()
        .ok_or_else(|| ReqchainError::parse(label, "'authentication' must be a mapping"))?;
    if auth.is_empty() {
        return Ok(None);
    }

    let text = |key: &str| scalar_text(auth.get(key));
    let scheme = text("type").to_ascii_lowercase();
    let kind = match scheme.as_str() {
        "" | "none" => AuthKind::None,
        "basic" => AuthKind::Basic {
            username: text("username"),
            password: text("password"),
        },
        "bearer" => AuthKind::Bearer { token: text("token") },
        "apikey" => AuthKind::ApiKey {
            key: text("key"),
            token: text("value"),
        },
        "oauth2" => {
            let access_token = text("accessToken");
            AuthKind::OAuth2 {
                token: if access_token.is_empty() { text("token") } else { access_token },
            }
        }
        _ => AuthKind::Unknown {
            scheme: scheme.clone(),
            token: text("token"),
        },
    };

    Ok(Some(Authentication {
        kind,
        disabled: flag(auth, "disabled"),
    }))
}

fn parse_environment(value: Option<&JsonValue>, options: &LoadOptions) -> Result<Environment> {
    let base = value.and_then(JsonValue::as_object);
    let mut environment = Environment::from_data(
        base.and_then(|b| b.get("name"))
            .and_then(JsonValue::as_str)
            .unwrap_or("Base Environment"),
        data_map(base.and_then(|b| b.get("data"))),
    );

    if let Some(selected) = &options.environment {
        let sub = base
            .and_then(|b| b.get("subEnvironments"))
            .and_then(JsonValue::as_array)
            .into_iter()
            .flatten()
            .filter_map(JsonValue::as_object)
            .find(|sub| sub.get("name").and_then(JsonValue::as_str) == Some(selected.as_str()))
            .ok_or_else(|| {
                ReqchainError::parse(
                    "environments",
                    format!("no sub-environment named '{}'", selected),
                )
            })?;
        environment.name = selected.clone();
        environment.extend_data(data_map(sub.get("data")));
    }

    Ok(environment.with_overrides(options.overrides.clone()))
}

fn data_map(value: Option<&JsonValue>) -> IndexMap<String, JsonValue> {
    value
        .and_then(JsonValue::as_object)
        .map(|data| data.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

fn parse_cookie_jar(value: Option<&JsonValue>) -> Result<Vec<Cookie>> {
    let Some(cookies) = value.and_then(|jar| jar.get("cookies")).filter(|c| !c.is_null()) else {
        return Ok(Vec::new());
    };
    serde_json::from_value(cookies.clone())
        .map_err(|e| ReqchainError::parse("cookieJar", format!("invalid cookie: {}", e)))
}
