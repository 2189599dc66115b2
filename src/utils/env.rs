/// Get environment variable with KEELSON_ prefix, falling back to unprefixed version
///
/// Checks `KEELSON_{key}` first, then `{key}`, so deployments can share
/// conventional names like `LOG_LEVEL` with other services.
///
/// # Examples
///
/// ```rust,ignore
/// use keelson::utils::get_env_with_prefix;
///
/// // Checks KEELSON_ENTITLEMENTS_POLICY first, then ENTITLEMENTS_POLICY
/// let policy = get_env_with_prefix("ENTITLEMENTS_POLICY");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("KEELSON_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a prefixed environment variable, ignoring values that fail to parse.
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    get_env_with_prefix(key).and_then(|value| value.trim().parse().ok())
}

/// Interpret a prefixed environment variable as a boolean flag.
///
/// Accepts `true`/`false`, `1`/`0`, `yes`/`no` and `on`/`off`.
pub fn flag_env_with_prefix(key: &str) -> Option<bool> {
    get_env_with_prefix(key).and_then(|value| match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("KEELSON_ENV_TEST_VAR", "prefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_TEST_VAR"),
            Some("prefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("KEELSON_ENV_TEST_VAR");
        }

        unsafe {
            std::env::set_var("ENV_FALLBACK_VAR", "unprefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("ENV_FALLBACK_VAR"),
            Some("unprefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("ENV_FALLBACK_VAR");
        }

        assert_eq!(get_env_with_prefix("ENV_NON_EXISTENT_VAR"), None);
    }

    #[test]
    fn test_parse_and_flag_helpers() {
        unsafe {
            std::env::set_var("KEELSON_ENV_PARSE_VAR", " 42 ");
            std::env::set_var("KEELSON_ENV_FLAG_VAR", "Yes");
            std::env::set_var("KEELSON_ENV_BAD_VAR", "forty-two");
        }
        assert_eq!(parse_env_with_prefix::<u32>("ENV_PARSE_VAR"), Some(42));
        assert_eq!(flag_env_with_prefix("ENV_FLAG_VAR"), Some(true));
        assert_eq!(parse_env_with_prefix::<u32>("ENV_BAD_VAR"), None);
        assert_eq!(flag_env_with_prefix("ENV_BAD_VAR"), None);
        unsafe {
            std::env::remove_var("KEELSON_ENV_PARSE_VAR");
            std::env::remove_var("KEELSON_ENV_FLAG_VAR");
            std::env::remove_var("KEELSON_ENV_BAD_VAR");
        }
    }
}
