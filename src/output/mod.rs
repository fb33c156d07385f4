//! Output handling

pub mod printer;
pub mod terminal;

pub use printer::{format_body, Printer};
pub use terminal::{colors, error, warning, RESET};
