//! Terminal palette and color detection

pub mod colors {
    pub const GREY: u8 = 102;      // #7D7D7D - Punctuation, secondary
    pub const AQUA: u8 = 109;      // #7A9EB5 - Numbers, info
    pub const ORANGE: u8 = 208;    // #F2913D - Warnings, PUT/PATCH
    pub const RED: u8 = 167;       // #E34F45 - Errors, DELETE
    pub const BLUE: u8 = 68;       // #426BD1 - Names, labels
    pub const PINK: u8 = 176;      // #DE85DE - Keys
    pub const GREEN: u8 = 71;      // #63C27A - Success, GET
    pub const YELLOW: u8 = 185;    // #CCCC3D - POST, redirects
}

/// ANSI escape code constants
pub const RESET: &str = "\x1b[0m";

/// Colors on stdout unless it is not a terminal or `NO_COLOR` is set
pub fn stdout_colors() -> bool {
    atty::is(atty::Stream::Stdout)
        && std::env::var_os("NO_COLOR").is_none()
        && std::env::var("TERM").map_or(true, |t| t != "dumb")
}

/// Generate foreground color escape code
#[inline]
pub fn fg(color: u8) -> String {
    format!("\x1b[38;5;{}m", color)
}

/// Generate bold foreground color escape code
#[inline]
pub fn bold_fg(color: u8) -> String {
    format!("\x1b[1;38;5;{}m", color)
}

/// Colorize text with a foreground color
#[inline]
pub fn colorize(text: &str, color: u8) -> String {
    format!("{}{}{}", fg(color), text, RESET)
}

/// Colorize text with bold foreground color
#[inline]
pub fn bold(text: &str, color: u8) -> String {
    format!("{}{}{}", bold_fg(color), text, RESET)
}

/// Error message (red)
#[inline]
pub fn error(text: &str) -> String {
    bold(text, colors::RED)
}

/// Warning message (orange)
#[inline]
pub fn warning(text: &str) -> String {
    bold(text, colors::ORANGE)
}

/// Label/name (blue)
#[inline]
pub fn label(text: &str) -> String {
    colorize(text, colors::BLUE)
}

/// Key (pink)
#[inline]
pub fn key(text: &str) -> String {
    colorize(text, colors::PINK)
}

/// Secondary/muted text (grey)
#[inline]
pub fn muted(text: &str) -> String {
    colorize(text, colors::GREY)
}

/// HTTP status code color
pub fn http_status(code: u16) -> u8 {
    match code / 100 {
        1 => colors::AQUA,   // Informational
        2 => colors::GREEN,  // Success
        3 => colors::YELLOW, // Redirect
        4 => colors::ORANGE, // Client error
        5 => colors::RED,    // Server error
        _ => colors::GREY,
    }
}

/// HTTP method color
pub fn http_method(method: &str) -> u8 {
    match method.to_uppercase().as_str() {
        "GET" | "HEAD" | "OPTIONS" => colors::GREEN,
        "POST" => colors::YELLOW,
        "PUT" | "PATCH" => colors::ORANGE,
        "DELETE" => colors::RED,
        _ => colors::GREY,
    }
}
