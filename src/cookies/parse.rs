//! Set-Cookie parsing and domain matching

/// Parse a (possibly comma-folded) Set-Cookie header into typed cookies
///
/// Commas inside attribute values such as `Expires=Mon, 01 Jan 2024` stay
/// with their cookie. Unparseable entries are skipped.
pub fn parse_set_cookie_header(header: &str) -> Vec<cookie::Cookie<'static>> {
    let mut entries: Vec<String> = Vec::new();
    for piece in header.split(',') {
        match entries.last_mut() {
            Some(current) if !starts_new_cookie(piece) => {
                current.push(',');
                current.push_str(piece);
            }
            _ => entries.push(piece.to_string()),
        }
    }

    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| cookie::Cookie::parse(entry.to_string()).ok())
        .collect()
}

/// `name=...` before the first `;`, with `name` a valid cookie token
fn starts_new_cookie(piece: &str) -> bool {
    let pair = piece.split(';').next().unwrap_or_default();
    match pair.split_once('=') {
        Some((name, _)) => {
            let name = name.trim_start();
            !name.is_empty() && name.bytes().all(is_token_byte)
        }
        None => false,
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}

/// Check if a request host matches a cookie domain
///
/// Handles the leading dot in cookie domains per RFC 6265.
/// Example: "api.example.com" matches ".example.com"
pub fn domain_matches(request_domain: &str, cookie_domain: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.');
    if cookie_domain.is_empty() {
        return false;
    }

    request_domain.eq_ignore_ascii_case(cookie_domain)
        || request_domain
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", cookie_domain.to_ascii_lowercase()))
}

/// RFC 6265 default-path of a request path
pub fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}
