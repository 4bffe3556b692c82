//! Value parsers for repeated command-line options.

use http::Method;

/// `name=value`; the value may be empty and may itself contain `=`.
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    if name.is_empty() {
        return Err(format!("empty name in '{raw}'"));
    }
    Ok((name.to_owned(), value.to_owned()))
}

/// `Name: value`, as written by curl.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{raw}'"));
    }
    Ok((name.to_owned(), value.trim().to_owned()))
}

pub fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| format!("invalid method '{raw}': {e}"))
}

pub fn parse_duration(raw: &str) -> Result<std::time::Duration, String> {
    humantime::parse_duration(raw).map_err(|e| format!("invalid duration '{raw}': {e}"))
}

/// Targets with a scheme bypass the endpoint base URL.
pub fn is_absolute_url(target: &str) -> bool {
    target.starts_with("https://") || target.starts_with("http://")
}
