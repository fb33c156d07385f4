//! Typed collection nodes
//!
//! A collection is a tree of folders and requests. Folders own their
//! children and may declare headers and authentication that descendants
//! inherit.

use serde::Serialize;

/// Identity and bookkeeping shared by every node
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    /// Stable identifier (e.g. `req_…`, `fld_…`)
    pub id: String,
    /// Creation time, milliseconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Last modification time, milliseconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

/// A header as declared in the collection (pre-resolution)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Header {
    pub name: String,
    pub value: String,
    pub disabled: bool,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            disabled: false,
        }
    }

    /// Enabled, named, and carrying a value
    pub fn is_active(&self) -> bool {
        !self.disabled && !self.name.trim().is_empty() && !self.value.is_empty()
    }
}

/// A name/value body parameter (form bodies)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BodyParam {
    pub name: String,
    pub value: String,
    pub disabled: bool,
}

/// Body payload: raw text or an ordered list of parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyContent {
    Text(String),
    Params(Vec<BodyParam>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub content: BodyContent,
}

/// Authentication scheme and its credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthKind {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
    /// `key` is the header name the token is sent under
    ApiKey { key: String, token: String },
    OAuth2 { token: String },
    /// Any scheme we do not model; the token is sent verbatim
    Unknown { scheme: String, token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authentication {
    #[serde(flatten)]
    pub kind: AuthKind,
    pub disabled: bool,
}

impl Authentication {
    pub fn new(kind: AuthKind) -> Self {
        Self { kind, disabled: false }
    }

    /// Usable for inheritance and for sending
    pub fn is_active(&self) -> bool {
        !self.disabled
    }
}

/// A folder: ordered children plus inheritable headers/authentication
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Folder {
    pub meta: NodeMeta,
    pub name: String,
    pub children: Vec<ConfigNode>,
    pub headers: Vec<Header>,
    pub authentication: Option<Authentication>,
}

/// A request as stored in the collection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Request {
    pub meta: NodeMeta,
    pub name: String,
    /// Raw URL, may contain templates
    pub url: String,
    pub method: String,
    pub body: Option<Body>,
    pub headers: Vec<Header>,
    pub authentication: Option<Authentication>,
    /// Post-response script source, when the collection declares one
    pub after_response_script: Option<String>,
}

/// A node of the collection tree
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Folder(Folder),
    Request(Request),
}

impl ConfigNode {
    pub fn name(&self) -> &str {
        match self {
            ConfigNode::Folder(folder) => &folder.name,
            ConfigNode::Request(request) => &request.name,
        }
    }

    pub fn meta(&self) -> &NodeMeta {
        match self {
            ConfigNode::Folder(folder) => &folder.meta,
            ConfigNode::Request(request) => &request.meta,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta().id
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            ConfigNode::Folder(folder) => Some(folder),
            ConfigNode::Request(_) => None,
        }
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            ConfigNode::Request(request) => Some(request),
            ConfigNode::Folder(_) => None,
        }
    }

    /// Every string field that may carry templates, in declaration order
    pub fn template_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        let (headers, auth) = match self {
            ConfigNode::Folder(folder) => (&folder.headers, &folder.authentication),
            ConfigNode::Request(request) => {
                fields.push(request.url.as_str());
                if let Some(body) = &request.body {
                    match &body.content {
                        BodyContent::Text(text) => fields.push(text.as_str()),
                        BodyContent::Params(params) => {
                            for param in params {
                                fields.push(param.name.as_str());
                                fields.push(param.value.as_str());
                            }
                        }
                    }
                }
                (&request.headers, &request.authentication)
            }
        };
        for header in headers {
            fields.push(header.name.as_str());
            fields.push(header.value.as_str());
        }
        if let Some(auth) = auth {
            match &auth.kind {
                AuthKind::None => {}
                AuthKind::Basic { username, password } => {
                    fields.push(username.as_str());
                    fields.push(password.as_str());
                }
                AuthKind::ApiKey { key, token } => {
                    fields.push(key.as_str());
                    fields.push(token.as_str());
                }
                AuthKind::Bearer { token }
                | AuthKind::OAuth2 { token }
                | AuthKind::Unknown { token, .. } => fields.push(token.as_str()),
            }
        }
        fields
    }
}
