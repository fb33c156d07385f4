//! Request middleware applied between resolution and transport

pub mod auth;

pub use auth::{Auth, AuthError};
