//! Type-safe cache key builder with versioning

use crate::core::constants::CACHE_KEY_VERSION;

/// Type-safe cache key builder
///
/// All keys are prefixed with a version (e.g., "v1:") to allow
/// invalidating all cached data on schema changes.
pub struct CacheKey;

impl CacheKey {
    // =========================================================================
    // Users
    // =========================================================================

    /// Cache key for user by ID
    pub fn user(id: &str) -> String {
        format!("{}:user:{}", CACHE_KEY_VERSION, id)
    }

    /// Cache key for user by username
    pub fn user_by_username(username: &str) -> String {
        format!(
            "{}:user:username:{}",
            CACHE_KEY_VERSION,
            username.to_lowercase()
        )
    }

    /// Cache key for negative user lookup by ID (not found)
    pub fn user_negative(id: &str) -> String {
        format!("{}:user:neg:{}", CACHE_KEY_VERSION, id)
    }

    /// Cache key for negative user lookup by username (not found)
    pub fn user_by_username_negative(username: &str) -> String {
        format!(
            "{}:user:username:neg:{}",
            CACHE_KEY_VERSION,
            username.to_lowercase()
        )
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Cache key for a session by its JWT id (jti), for fast revocation checks
    pub fn session_jti(jti: &str) -> String {
        format!("{}:session:jti:{}", CACHE_KEY_VERSION, jti)
    }

    // =========================================================================
    // Presence
    // =========================================================================

    /// Cache key for a user's live presence status, refreshed on every
    /// `upsert_user_profile` and read by anyone viewing a shared server.
    pub fn presence(user_id: &str) -> String {
        format!("{}:presence:{}", CACHE_KEY_VERSION, user_id)
    }

    // =========================================================================
    // Rate Limiting
    // =========================================================================

    /// Cache key for rate limit counter
    ///
    /// Note: Rate limit keys are NOT versioned (counter semantics don't change)
    ///
    /// The identifier is used directly without escaping or truncation.
    /// Callers should ensure bucket names don't contain `:`; identifiers are
    /// typically full user ids or IP addresses.
    pub fn rate_limit(bucket: &str, identifier: &str) -> String {
        format!("rl:{}:{}", bucket, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_keys() {
        assert_eq!(CacheKey::user("u123"), "v1:user:u123");
        assert_eq!(
            CacheKey::user_by_username("Ada"),
            "v1:user:username:ada"
        );
        assert_eq!(CacheKey::user_negative("u123"), "v1:user:neg:u123");
    }

    #[test]
    fn test_session_key() {
        assert_eq!(CacheKey::session_jti("jti1"), "v1:session:jti:jti1");
    }

    #[test]
    fn test_presence_key() {
        assert_eq!(CacheKey::presence("u1"), "v1:presence:u1");
    }

    #[test]
    fn test_rate_limit_key() {
        // Rate limit keys are NOT versioned, and never truncate the identifier.
        assert_eq!(
            CacheKey::rate_limit("api", "192.168.1.1"),
            "rl:api:192.168.1.1"
        );
        let long_user_id = "c".repeat(25);
        assert_eq!(
            CacheKey::rate_limit("auth", &long_user_id),
            format!("rl:auth:{}", long_user_id)
        );
    }
}
