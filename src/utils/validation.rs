//! Input validation utilities

/// Validate a username: starts with a letter, then letters, digits,
/// dots, underscores or hyphens.
pub fn validate_username(username: &str) -> bool {
    if username.is_empty() || username.len() > 64 {
        return false;
    }

    let mut chars = username.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

/// Validate a display name for products, licenses and devices
pub fn validate_display_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.len() <= 200
}
