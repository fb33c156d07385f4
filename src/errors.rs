//! Error types for reqchain

use thiserror::Error;

/// Main error type for reqchain
#[derive(Error, Debug)]
pub enum ReqchainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Malformed collection document
    #[error("Parse error in '{node}': {message}")]
    Parse {
        node: String,
        message: String,
    },

    /// Unknown request path
    #[error("Request not found: {0}")]
    NotFound(String),

    /// Unknown request id (chain target)
    #[error("request not found: no request with id '{0}'")]
    RequestNotFound(String),

    #[error("Circular dependency detected: request '{0}' is already being resolved")]
    CircularDependency(String),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Template nesting exceeded {0} levels")]
    TemplateDepth(usize),

    #[error("Directive '{name}' failed: {message}")]
    Directive {
        name: String,
        message: String,
    },

    #[error("Request failed after {duration_ms}ms: {message}")]
    Transport {
        message: String,
        duration_ms: u64,
    },

    #[error("Timeout after {seconds:.1} seconds")]
    Timeout {
        seconds: f64,
        duration_ms: u64,
    },

    #[error("Authentication error: {0}")]
    Auth(#[from] crate::middleware::auth::AuthError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cookie error: {0}")]
    Cookie(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Interrupted")]
    Interrupted,
}

impl ReqchainError {
    /// Shorthand for a directive failure
    pub fn directive(name: impl Into<String>, message: impl Into<String>) -> Self {
        ReqchainError::Directive {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a collection parse failure
    pub fn parse(node: impl Into<String>, message: impl Into<String>) -> Self {
        ReqchainError::Parse {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Whether the directive engine may swallow this error and leave the span in place.
    ///
    /// Chain failures (unknown target, cycles, network) have no meaningful
    /// substitute value and must reach the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReqchainError::Directive { .. }
                | ReqchainError::UndefinedVariable(_)
                | ReqchainError::TemplateDepth(_)
                | ReqchainError::Cache(_)
                | ReqchainError::Cookie(_)
                | ReqchainError::Json(_)
        )
    }

    /// Elapsed time of a failed network call, when known
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            ReqchainError::Transport { duration_ms, .. } | ReqchainError::Timeout { duration_ms, .. } => {
                Some(*duration_ms)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReqchainError>;
