//! Rate limiting for gRPC handlers
//!
//! Unlike the HTTP middleware layer this teacher originally used for its REST
//! surface, gRPC handlers call `check` directly at the top of the RPCs that
//! need it (login attempts, message sends) and map a rejection straight to
//! `Status::resource_exhausted`, matching the `RateLimited` taxonomy entry.

use std::sync::Arc;

use tonic::Status;

use crate::data::cache::{RateLimitBucket, RateLimiter};

/// Check a rate limit bucket for `key`, mapping a miss to a gRPC status.
pub async fn check(limiter: &RateLimiter, bucket: &RateLimitBucket, key: &str) -> Result<(), Status> {
    let result = limiter.check(bucket, key).await;
    if !result.allowed {
        tracing::debug!(bucket = bucket.name, %key, "Rate limit exceeded");
        return Err(Status::resource_exhausted(format!(
            "rate limit exceeded, retry after {}s",
            result.retry_after.unwrap_or(60)
        )));
    }
    Ok(())
}

/// Shared handle threaded into every gRPC service that rate-limits.
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CacheBackendType, CacheConfig, EvictionPolicy};
    use crate::data::cache::CacheService;

    async fn test_limiter() -> RateLimiter {
        let cache = CacheService::new(&CacheConfig {
            backend: CacheBackendType::Memory,
            max_entries: 1000,
            eviction_policy: EvictionPolicy::TinyLfu,
            redis_url: None,
        })
        .await
        .unwrap();
        RateLimiter::new(Arc::new(cache))
    }

    #[tokio::test]
    async fn allows_under_limit_and_rejects_over() {
        let limiter = test_limiter().await;
        let bucket = RateLimitBucket::auth(2);

        assert!(check(&limiter, &bucket, "u1").await.is_ok());
        assert!(check(&limiter, &bucket, "u1").await.is_ok());
        let err = check(&limiter, &bucket, "u1").await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::ResourceExhausted);
    }
}
