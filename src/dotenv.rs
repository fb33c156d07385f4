//! Environment overrides from `.env` files and `--var KEY=VALUE` flags
//!
//! Values loaded here take precedence over the collection's own
//! environment data.

use std::path::Path;

use indexmap::IndexMap;

use crate::errors::{ReqchainError, Result};

/// Ordered override variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: IndexMap<String, String>,
}

impl EnvOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a .env file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReqchainError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// `.env` next to the collection, if there is one
    pub fn load_beside(collection: &Path) -> Result<Self> {
        let candidate = collection
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(".env");
        if candidate.is_file() {
            Self::load_file(&candidate)
        } else {
            Ok(Self::new())
        }
    }

    /// Parse .env file content
    pub fn parse(content: &str) -> Result<Self> {
        let mut vars = IndexMap::new();

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = parse_env_line(line).ok_or_else(|| {
                ReqchainError::Config(format!(
                    "Invalid .env syntax at line {}: {}",
                    line_num + 1,
                    line
                ))
            })?;
            vars.insert(key, value);
        }

        Ok(Self { vars })
    }

    /// Add `KEY=VALUE` assignments (e.g. from the command line); later wins
    pub fn extend_assignments<I, S>(&mut self, assignments: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for assignment in assignments {
            let (key, value) = parse_assignment(assignment.as_ref())?;
            self.vars.insert(key, value);
        }
        Ok(())
    }

    /// Other takes precedence
    pub fn merge(&mut self, other: EnvOverrides) {
        self.vars.extend(other.vars);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn into_map(self) -> IndexMap<String, String> {
        self.vars
    }
}

/// `KEY=VALUE`; the value may be empty and may itself contain `=`
pub fn parse_assignment(input: &str) -> Result<(String, String)> {
    match input.split_once('=') {
        Some((key, value)) if is_valid_key(key.trim()) => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ReqchainError::Config(format!(
            "Invalid variable '{}': expected KEY=VALUE",
            input
        ))),
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a single .env line into key-value pair
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let (key, value_part) = line.split_once('=')?;
    let key = key.trim();
    if !is_valid_key(key) {
        return None;
    }

    let value_part = value_part.trim();
    let value = if value_part.len() >= 2 && value_part.starts_with('"') && value_part.ends_with('"') {
        unescape_double_quoted(&value_part[1..value_part.len() - 1])
    } else if value_part.len() >= 2 && value_part.starts_with('\'') && value_part.ends_with('\'') {
        // Single-quoted: literal value
        value_part[1..value_part.len() - 1].to_string()
    } else {
        // Unquoted: stop at an inline comment
        match value_part.find(" #") {
            Some(pos) => value_part[..pos].trim_end().to_string(),
            None => value_part.to_string(),
        }
    };

    Some((key.to_string(), value))
}

fn unescape_double_quoted(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoting_and_comments() {
        let content = r#"
# comment
export TOKEN=abc # inline comment
GREETING="hello world"
RAW='a\nb'
ESCAPED="line1\nline2"
URL=https://example.com/#frag
EMPTY=
"#;
        let env = EnvOverrides::parse(content).unwrap();
        assert_eq!(env.get("TOKEN"), Some("abc"));
        assert_eq!(env.get("GREETING"), Some("hello world"));
        assert_eq!(env.get("RAW"), Some("a\\nb"));
        assert_eq!(env.get("ESCAPED"), Some("line1\nline2"));
        assert_eq!(env.get("URL"), Some("https://example.com/#frag"));
        assert_eq!(env.get("EMPTY"), Some(""));
        assert_eq!(env.len(), 6);
    }

    #[test]
    fn test_invalid_line_reports_number() {
        let err = EnvOverrides::parse("A=1\nnot a pair\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_assignments_override_file() {
        let mut env = EnvOverrides::parse("HOST=file\nPORT=1").unwrap();
        env.extend_assignments(["HOST=cli", "QUERY=a=b"]).unwrap();
        assert_eq!(env.get("HOST"), Some("cli"));
        assert_eq!(env.get("PORT"), Some("1"));
        assert_eq!(env.get("QUERY"), Some("a=b"));

        assert!(env.extend_assignments(["=x"]).is_err());
        assert!(env.extend_assignments(["1BAD=x"]).is_err());
        assert!(env.extend_assignments(["NOEQUALS"]).is_err());
    }

    #[test]
    fn test_load_beside_missing_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let env = EnvOverrides::load_beside(&dir.path().join("collection.yaml")).unwrap();
        assert!(env.is_empty());

        std::fs::write(dir.path().join(".env"), "A=1\n").unwrap();
        let env = EnvOverrides::load_beside(&dir.path().join("collection.yaml")).unwrap();
        assert_eq!(env.get("A"), Some("1"));
    }
}
