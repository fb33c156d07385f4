//! Human-readable rendering of responses, resolved requests and listings

use std::io::{self, Write};

use serde_json::Value as JsonValue;

use super::terminal::{self, colors};
use crate::client::ExecutedResponse;
use crate::collection::ConfigTree;
use crate::request::ResolvedRequest;

/// Pretty-print JSON bodies, pass anything else through
pub fn format_body(body: &str) -> String {
    let trimmed = body.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return body.to_string();
    }
    match serde_json::from_str::<JsonValue>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Printer {
    colors: bool,
}

impl Printer {
    pub fn new(colors: bool) -> Self {
        Self { colors }
    }

    /// Colors when stdout is a terminal
    pub fn for_stdout() -> Self {
        Self::new(terminal::stdout_colors())
    }

    fn paint(&self, text: &str, color: u8) -> String {
        if self.colors {
            terminal::colorize(text, color)
        } else {
            text.to_string()
        }
    }

    fn paint_bold(&self, text: &str, color: u8) -> String {
        if self.colors {
            terminal::bold(text, color)
        } else {
            text.to_string()
        }
    }

    /// Status line, headers, blank line, body
    pub fn write_response(&self, out: &mut impl Write, response: &ExecutedResponse) -> io::Result<()> {
        let status = format!("{} {}", response.status, response.status_text);
        writeln!(
            out,
            "{} {} {}",
            self.paint("HTTP", colors::BLUE),
            self.paint_bold(status.trim_end(), terminal::http_status(response.status)),
            self.paint(&format!("({} ms)", response.duration_ms), colors::GREY),
        )?;
        for (name, value) in &response.headers {
            writeln!(out, "{}: {}", self.paint(name, colors::PINK), value)?;
        }
        if !response.body.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", format_body(&response.body))?;
        }
        Ok(())
    }

    /// Resolved request as pretty JSON
    pub fn write_resolved(&self, out: &mut impl Write, resolved: &ResolvedRequest) -> io::Result<()> {
        let json = serde_json::to_string_pretty(resolved)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(out, "{}", json)
    }

    /// One line per request: method, path, id
    pub fn write_request_list(&self, out: &mut impl Write, tree: &ConfigTree) -> io::Result<()> {
        for (path, request) in tree.requests() {
            let method = format!("{:<7}", request.method);
            writeln!(
                out,
                "{} {}  {}",
                self.paint_bold(&method, terminal::http_method(&request.method)),
                path,
                self.paint(&request.meta.id, colors::GREY),
            )?;
        }
        Ok(())
    }

    /// Environment variables, overridden ones marked
    pub fn write_variables(&self, out: &mut impl Write, tree: &ConfigTree) -> io::Result<()> {
        let environment = tree.environment();
        for (name, value) in environment.all() {
            let marker = if environment.is_overridden(&name) { " (override)" } else { "" };
            writeln!(
                out,
                "{} = {}{}",
                self.paint(&name, colors::PINK),
                value,
                self.paint(marker, colors::GREY)
            )?;
        }
        Ok(())
    }
}
