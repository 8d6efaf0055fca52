//! Setting key validation
//!
//! Keys are dot-delimited paths such as `survey.defaultCodes.department`.
//! The empty key addresses the whole tree.

use crate::contract::SettingsError;

/// Longest key accepted by the store
pub const MAX_KEY_LENGTH: usize = 255;

/// Validate a dotted setting key
///
/// Accepts:
/// - "" - the whole tree
/// - one or more non-empty segments separated by '.'
/// - segments made of ASCII alphanumerics, '_' and '-'
pub fn validate_key(key: &str) -> Result<(), SettingsError> {
    if key.is_empty() {
        return Ok(());
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(SettingsError::invalid_key(
            key,
            format!("key exceeds {} characters", MAX_KEY_LENGTH),
        ));
    }

    for (index, segment) in key.split('.').enumerate() {
        if segment.is_empty() {
            return Err(SettingsError::invalid_key(
                key,
                format!("segment {} is empty", index),
            ));
        }

        if let Some(bad) = segment
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(SettingsError::invalid_key(
                key,
                format!("character '{}' is not allowed in segment '{}'", bad, segment),
            ));
        }
    }

    Ok(())
}

/// Path segments of a key; the empty key has none
pub fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('.').filter(|s| !s.is_empty())
}

/// Join a parent key and a child segment
pub fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}
