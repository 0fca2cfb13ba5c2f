//! Logging utilities with credential protection
//!
//! API keys, client secrets and bearer tokens pass through most of this crate.
//! These helpers keep them out of log lines and bound the size of response
//! bodies that get logged on failure.

/// Obscures a credential string by showing only the first few characters
///
/// # Examples
///
/// ```rust
/// use fabric_relay::utils::logging::obscure_credential;
///
/// assert_eq!(obscure_credential("sk-abcdef123456"), "sk-ab***");
/// assert_eq!(obscure_credential("abc"), "***");
/// ```
pub fn obscure_credential(credential: &str) -> String {
    let char_count = credential.chars().count();
    if char_count <= 5 {
        "*".repeat(char_count)
    } else {
        format!("{}***", truncate_string(credential, 5))
    }
}

/// Safely truncates a string to a maximum number of characters, respecting UTF-8 boundaries
///
/// Backend replies are mostly Chinese text, so byte slicing would panic.
///
/// ```rust
/// use fabric_relay::utils::logging::truncate_string;
///
/// assert_eq!(truncate_string("數據代理程式", 2), "數據");
/// assert_eq!(truncate_string("Short", 100), "Short");
/// ```
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Truncate a response body for a log line, marking that it was cut
pub fn preview_body(body: &str, max_chars: usize) -> String {
    if body.chars().count() > max_chars {
        format!("{}...", truncate_string(body, max_chars))
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obscure_credential() {
        assert_eq!(obscure_credential("0123456789abcdef"), "01234***");
        assert_eq!(obscure_credential("short"), "*****");
        assert_eq!(obscure_credential(""), "");
        assert_eq!(obscure_credential("a"), "*");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello World", 5), "Hello");
        assert_eq!(truncate_string("Hello 👋 World!", 7), "Hello 👋");
        assert_eq!(truncate_string("Short", 100), "Short");
        assert_eq!(truncate_string("", 10), "");
        assert_eq!(truncate_string("日本語テキスト", 3), "日本語");
    }

    #[test]
    fn test_preview_body() {
        assert_eq!(preview_body("abcdef", 3), "abc...");
        assert_eq!(preview_body("abc", 3), "abc");
    }

    #[test]
    fn test_obscure_credential_with_multibyte() {
        assert_eq!(obscure_credential("金鑰金鑰金鑰"), "金鑰金鑰金***");
    }
}
