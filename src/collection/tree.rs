//! The loaded collection: node tree, environment and cookie jar

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use super::environment::Environment;
use super::node::{ConfigNode, Folder, Request};
use crate::cookies::Cookie;
use crate::errors::{ReqchainError, Result};
use crate::template::extract_variable_names;

/// A request located in the tree together with the folders above it
#[derive(Debug, Clone)]
pub struct LocatedRequest<'a> {
    pub path: String,
    pub request: &'a Request,
    /// Root-to-immediate-parent
    pub ancestors: Vec<&'a Folder>,
}

/// Immutable collection tree.
///
/// Built once per load; changing the environment rebuilds the tree rather
/// than mutating it.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    name: String,
    nodes: Vec<ConfigNode>,
    environment: Environment,
    cookies: Vec<Cookie>,
    source: JsonValue,
    /// request id -> child index at each level
    positions: HashMap<String, Vec<usize>>,
}

impl ConfigTree {
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<ConfigNode>,
        environment: Environment,
        cookies: Vec<Cookie>,
        source: JsonValue,
    ) -> Self {
        let mut positions = HashMap::new();
        index_positions(&nodes, &mut Vec::new(), &mut positions);
        Self {
            name: name.into(),
            nodes,
            environment,
            cookies,
            source,
            positions,
        }
    }

    /// Same tree under a different environment
    pub fn with_environment(self, environment: Environment) -> Self {
        Self::new(self.name, self.nodes, environment, self.cookies, self.source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[ConfigNode] {
        &self.nodes
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// The parsed source document
    pub fn source(&self) -> &JsonValue {
        &self.source
    }

    /// Walk `a/b/c` by node name; the last segment must be a request
    pub fn find_by_path(&self, path: &str) -> Result<LocatedRequest<'_>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let not_found = || ReqchainError::NotFound(path.to_string());

        let (last, folders) = segments.split_last().ok_or_else(not_found)?;
        let mut ancestors: Vec<&Folder> = Vec::with_capacity(folders.len());
        let mut level: &[ConfigNode] = &self.nodes;

        for segment in folders {
            let folder = level
                .iter()
                .filter_map(ConfigNode::as_folder)
                .find(|f| f.name == *segment)
                .ok_or_else(not_found)?;
            ancestors.push(folder);
            level = &folder.children;
        }

        let request = level
            .iter()
            .filter_map(ConfigNode::as_request)
            .find(|r| r.name == *last)
            .ok_or_else(not_found)?;

        Ok(LocatedRequest {
            path: segments.join("/"),
            request,
            ancestors,
        })
    }

    /// Display path of the request with the given id
    pub fn path_of(&self, id: &str) -> Option<String> {
        self.find_by_id(id).ok().map(|located| located.path)
    }

    /// Locate a request by id, walking child indices rather than names
    pub fn find_by_id(&self, id: &str) -> Result<LocatedRequest<'_>> {
        let not_found = || ReqchainError::RequestNotFound(id.to_string());
        let (last, folders) = self
            .positions
            .get(id)
            .and_then(|indices| indices.split_last())
            .ok_or_else(not_found)?;

        let mut ancestors: Vec<&Folder> = Vec::with_capacity(folders.len());
        let mut names: Vec<&str> = Vec::with_capacity(folders.len() + 1);
        let mut level: &[ConfigNode] = &self.nodes;

        for &index in folders {
            let folder = level
                .get(index)
                .and_then(ConfigNode::as_folder)
                .ok_or_else(not_found)?;
            ancestors.push(folder);
            names.push(&folder.name);
            level = &folder.children;
        }

        let request = level
            .get(*last)
            .and_then(ConfigNode::as_request)
            .ok_or_else(not_found)?;
        names.push(&request.name);

        Ok(LocatedRequest {
            path: names.join("/"),
            request,
            ancestors,
        })
    }

    /// Every request with its path, depth-first in declaration order
    pub fn requests(&self) -> Vec<(String, &Request)> {
        let mut out = Vec::new();
        collect_requests(&self.nodes, "", &mut out);
        out
    }

    /// Dotted/indexed lookup into the source document,
    /// e.g. `collection[0].children[1].url`
    pub fn lookup(&self, dotted: &str) -> Option<&JsonValue> {
        let mut current = &self.source;
        for step in parse_lookup_path(dotted)? {
            current = match step {
                LookupStep::Key(key) => current.as_object()?.get(key)?,
                LookupStep::Index(index) => current.as_array()?.get(index)?,
            };
        }
        Some(current)
    }

    /// Environment variable name -> ids of the nodes that reference it
    pub fn variable_usage(&self) -> IndexMap<String, Vec<String>> {
        let mut usage: IndexMap<String, Vec<String>> = IndexMap::new();
        visit(&self.nodes, &mut |node| {
            for field in node.template_fields() {
                for name in extract_variable_names(field) {
                    let ids = usage.entry(name).or_default();
                    if !ids.iter().any(|id| id == node.id()) {
                        ids.push(node.id().to_string());
                    }
                }
            }
        });
        usage
    }
}

fn visit<'a>(nodes: &'a [ConfigNode], f: &mut dyn FnMut(&'a ConfigNode)) {
    for node in nodes {
        f(node);
        if let ConfigNode::Folder(folder) = node {
            visit(&folder.children, f);
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn index_positions(nodes: &[ConfigNode], trail: &mut Vec<usize>, out: &mut HashMap<String, Vec<usize>>) {
    for (index, node) in nodes.iter().enumerate() {
        trail.push(index);
        match node {
            ConfigNode::Folder(folder) => index_positions(&folder.children, trail, out),
            ConfigNode::Request(request) => {
                // First declaration wins
                out.entry(request.meta.id.clone()).or_insert_with(|| trail.clone());
            }
        }
        trail.pop();
    }
}

fn collect_requests<'a>(nodes: &'a [ConfigNode], prefix: &str, out: &mut Vec<(String, &'a Request)>) {
    for node in nodes {
        let path = join_path(prefix, node.name());
        match node {
            ConfigNode::Folder(folder) => collect_requests(&folder.children, &path, out),
            ConfigNode::Request(request) => out.push((path, request)),
        }
    }
}

#[derive(Debug, PartialEq)]
enum LookupStep<'a> {
    Key(&'a str),
    Index(usize),
}

/// `a.b[0][1].c` -> [Key(a), Key(b), Index(0), Index(1), Key(c)]
fn parse_lookup_path(path: &str) -> Option<Vec<LookupStep<'_>>> {
    let mut steps = Vec::new();
    for segment in path.split('.') {
        let (key, mut rest) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };
        if !key.is_empty() {
            steps.push(LookupStep::Key(key));
        } else if rest.is_empty() {
            return None;
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            if !rest.starts_with('[') {
                return None;
            }
            steps.push(LookupStep::Index(rest[1..close].trim().parse().ok()?));
            rest = &rest[close + 1..];
        }
    }
    Some(steps)
}
