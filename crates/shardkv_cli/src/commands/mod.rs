//! CLI command implementations.

pub mod build;
pub mod inspect;
pub mod verify;

/// Renders a key for display, escaping bytes that are not valid UTF-8.
pub fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) => s.to_string(),
        Err(_) => key.escape_ascii().to_string(),
    }
}
