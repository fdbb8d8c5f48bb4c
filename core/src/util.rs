//! Shared utility functions for the HTTP model clients

use crate::error::{HeraldError, Result};

/// Sanitize a string value for safe use in HTTP headers
///
/// Rejects control characters, DEL, null bytes and line breaks.
pub fn sanitize_for_header(value: &str, field_name: &str) -> Result<String> {
    if value.is_empty() {
        return Err(HeraldError::InvalidConfig {
            message: format!("{} cannot be empty", field_name),
        });
    }

    for (index, ch) in value.char_indices() {
        let code = ch as u32;
        if code <= 0x1F || code == 0x7F {
            return Err(HeraldError::InvalidConfig {
                message: format!(
                    "{} contains invalid character at position {} (code point: {:#04x})",
                    field_name, index, code
                ),
            });
        }
    }

    Ok(value.to_string())
}

/// Validate an API key can be used in an Authorization header
///
/// Combines character sanitization with an actual `HeaderValue` parse.
pub fn validate_api_key(api_key: &str) -> Result<String> {
    let trimmed = api_key.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Err(HeraldError::MissingConfig {
            key: "endpoint.api_key".to_string(),
        });
    }

    sanitize_for_header(trimmed, "API key")?;

    let header_value = format!("Bearer {}", trimmed);
    header_value
        .parse::<reqwest::header::HeaderValue>()
        .map_err(|e| HeraldError::InvalidConfig {
            message: format!(
                "API key results in invalid Authorization header ({}). Key length: {} characters.",
                e,
                trimmed.len()
            ),
        })?;

    Ok(trimmed.to_string())
}

/// Sanitize a base URL for API requests
pub fn sanitize_base_url(url: &str, field_name: &str) -> Result<String> {
    let trimmed = url.trim();

    if trimmed.is_empty() {
        return Err(HeraldError::InvalidConfig {
            message: format!("{} cannot be empty", field_name),
        });
    }

    // Encoded separators usually mean the value was double-encoded somewhere
    if trimmed.contains("%2F") || trimmed.contains("%3D") || trimmed.contains("%20") {
        return Err(HeraldError::InvalidConfig {
            message: format!(
                "{} appears to contain URL-encoded characters (e.g., %2F, %3D, %20)",
                field_name
            ),
        });
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(HeraldError::InvalidConfig {
            message: format!(
                "{} must start with 'http://' or 'https://'. Got: {}",
                field_name, trimmed
            ),
        });
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Shorten a string for log output without splitting a character
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
