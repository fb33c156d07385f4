//! Sessions: resolve and run requests of a loaded collection

pub mod session;

pub use session::{Session, SessionBuilder};
