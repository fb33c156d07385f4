//! Request collections: typed node tree, environment, loader

pub mod environment;
pub mod node;
pub mod parser;
pub mod tree;

pub use environment::Environment;
pub use node::{AuthKind, Authentication, Body, BodyContent, BodyParam, ConfigNode, Folder, Header, NodeMeta, Request};
pub use parser::{load_collection, parse_collection, parse_document, LoadOptions};
pub use tree::{ConfigTree, LocatedRequest};
