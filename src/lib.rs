//! reqchain library interface
//!
//! Loads a request collection, resolves `{{ _.var }}` templates and
//! `{% directive %}` tags, and runs requests whose values can come from
//! the responses of other requests in the same collection.
//!
//! # Module Organization
//!
//! - [`collection`] - Collection tree, environments, Insomnia v5 loading
//! - [`template`] - Variable substitution
//! - [`directives`] - Directive engine (faker, prompt, cookie, response)
//! - [`chain`] - Cross-request chaining with cycle detection and caching
//! - [`request`] - Request resolution with folder inheritance
//! - [`sessions`] - Session tying the stores, resolver and transport together
//! - [`cache`], [`cookies`] - Memory and file backed stores
//! - [`core`] - CLI entry point

pub mod cache;
pub mod chain;
pub mod cli;
pub mod client;
pub mod collection;
pub mod config;
pub mod cookies;
pub mod core;
pub mod directives;
pub mod dotenv;
pub mod errors;
pub mod interactive;
pub mod logging;
pub mod middleware;
pub mod output;
pub mod request;
pub mod sessions;
pub mod signals;
pub mod status;
pub mod template;
pub mod utils;

pub use errors::{ReqchainError, Result};
pub use sessions::Session;
pub use status::ExitStatus;
