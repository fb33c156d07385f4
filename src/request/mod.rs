//! Request resolution
//!
//! Produces self-contained request descriptors from the collection tree.

mod resolved;
mod resolver;

pub use resolved::{ResolutionIssue, ResolvedRequest};
pub use resolver::{merge_inheritance, sanitize_url, Inherited, RequestResolver};
