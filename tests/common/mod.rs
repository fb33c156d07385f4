//! Common test utilities for reqchain integration tests
//!
//! - Collection fixtures written to a temporary directory
//! - CLI invocation helpers with an isolated config directory
//! - Session construction for library-level tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use reqchain::collection::{parse_collection, LoadOptions};
use reqchain::directives::NonInteractivePrompter;
use reqchain::Session;
use tempfile::TempDir;

/// Result of running the CLI
#[derive(Debug)]
pub struct CliResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CliResponse {
    pub fn contains(&self, needle: &str) -> bool {
        self.stdout.contains(needle)
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.stdout).ok()
    }
}

/// Isolated workspace: a collection directory and a config directory
pub struct MockEnvironment {
    pub dir: TempDir,
    pub config_dir: TempDir,
}

impl Default for MockEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
            config_dir: TempDir::new().expect("Failed to create temp config dir"),
        }
    }

    /// Write `collection.yaml` and return its path
    pub fn write_collection(&self, content: &str) -> PathBuf {
        let path = self.dir.path().join("collection.yaml");
        std::fs::write(&path, content).expect("Failed to write collection");
        path
    }

    /// Write a file next to the collection
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn write_config(&self, content: &str) {
        std::fs::write(self.config_dir.path().join("config.toml"), content)
            .expect("Failed to write config");
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.path().to_path_buf()
    }
}

/// Run the CLI with the given arguments
pub fn reqchain(args: &[&str], env: &MockEnvironment) -> CliResponse {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_reqchain"));
    cmd.args(["--timeout", "2"]);
    cmd.args(args);
    cmd.env("REQCHAIN_CONFIG_DIR", env.config_path());
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("REQCHAIN_LOG");
    cmd.env_remove("RUST_LOG");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    parse_output(cmd.output().expect("Failed to execute command"))
}

fn parse_output(output: Output) -> CliResponse {
    CliResponse {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: strip_colors(&String::from_utf8_lossy(&output.stderr)),
        exit_code: output.status.code().unwrap_or(1),
    }
}

/// Strip ANSI color codes from a string
pub fn strip_colors(s: &str) -> String {
    let re = regex::Regex::new(r"\x1b\[[\d;]*m").unwrap();
    re.replace_all(s, "").to_string()
}

/// Session over an in-memory collection that never prompts
pub fn session(collection: &str) -> Session {
    let tree = parse_collection(collection, &LoadOptions::default()).expect("Failed to parse collection");
    Session::builder(tree)
        .prompter(Arc::new(NonInteractivePrompter))
        .build()
        .expect("Failed to build session")
}

/// Minimal collection whose requests all point at `base`
pub fn chained_collection(base: &str) -> String {
    format!(
        r#"type: collection.insomnia.rest/5.0
name: Chained
collection:
  - name: Auth
    meta: {{ id: fld_auth }}
    children:
      - name: Login
        meta: {{ id: req_auth }}
        url: "{{{{ _.base }}}}/auth"
        method: POST
      - name: Profile
        meta: {{ id: req_profile }}
        url: "{{{{ _.base }}}}/me"
        method: GET
        headers:
          - name: Authorization
            value: "Bearer {{% response 'body', 'req_auth', 'b64::JC5hY2Nlc3NfdG9rZW4=::46b', 'when-expired', 3600 %}}"
environments:
  name: Base
  data:
    base: "{base}"
"#
    )
}
