// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "SideChat";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "sidechat";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".sidechat";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "sidechat.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "SIDECHAT_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "SIDECHAT_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "SIDECHAT_HOST";

/// Environment variable for HTTP health server port
pub const ENV_PORT: &str = "SIDECHAT_PORT";

/// Environment variable for gRPC server port
pub const ENV_GRPC_PORT: &str = "SIDECHAT_GRPC_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "SIDECHAT_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default HTTP health server port
pub const DEFAULT_PORT: u16 = 5388;

/// Default gRPC server port
pub const DEFAULT_GRPC_PORT: u16 = 5389;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "SIDECHAT_DATA_DIR";

// =============================================================================
// Secrets
// =============================================================================

/// Secret key name for the JWT signing key within the secret vault
pub const SECRET_KEY_JWT_SIGNING: &str = "jwt_signing_key";

// =============================================================================
// Authentication
// =============================================================================

/// Default session TTL in days
pub const DEFAULT_SESSION_TTL_DAYS: u32 = 30;

/// Environment variable for session TTL override (days)
pub const ENV_SESSION_TTL_DAYS: &str = "SIDECHAT_SESSION_TTL_DAYS";

/// Default local user id when auth is disabled (`--no-auth`)
pub const DEFAULT_USER_ID: &str = "local";

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "sidechat.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// PostgreSQL Database
// =============================================================================

/// Environment variable for transactional database backend (sqlite or postgres)
pub const ENV_TRANSACTIONAL_BACKEND: &str = "SIDECHAT_TRANSACTIONAL_BACKEND";

/// Environment variable for PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "SIDECHAT_POSTGRES_URL";

/// PostgreSQL default max connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL default min connections (keep warm for low latency)
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// PostgreSQL default connection acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// PostgreSQL idle connection timeout in seconds (release unused connections)
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// PostgreSQL max connection lifetime in seconds (cycle connections to prevent stale state)
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// PostgreSQL statement timeout in seconds (prevent runaway queries, 0 = disabled)
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Topics (domain event bus)
// =============================================================================

/// Default channel capacity for the domain event bus
pub const DEFAULT_TOPIC_CHANNEL_CAPACITY: usize = 100_000;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds (5 minutes)
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Cache
// =============================================================================

/// Environment variable for cache backend
pub const ENV_CACHE_BACKEND: &str = "SIDECHAT_CACHE_BACKEND";

/// Environment variable for cache max entries
pub const ENV_CACHE_MAX_ENTRIES: &str = "SIDECHAT_CACHE_MAX_ENTRIES";

/// Environment variable for cache eviction policy
pub const ENV_CACHE_EVICTION_POLICY: &str = "SIDECHAT_CACHE_EVICTION_POLICY";

/// Environment variable for Redis-compatible cache URL
/// Supports: redis://, rediss://, redis+sentinel://, rediss+sentinel://
pub const ENV_CACHE_REDIS_URL: &str = "SIDECHAT_CACHE_REDIS_URL";

/// Default cache max entries
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Cache key version (bump on schema changes to invalidate all cached data)
pub const CACHE_KEY_VERSION: &str = "v1";

/// Cache TTL for user profile (5 min)
pub const CACHE_TTL_USER: u64 = 300;

/// Cache TTL for membership/role lookups (1 min - critical for authz freshness)
pub const CACHE_TTL_MEMBERSHIP: u64 = 60;

/// Cache TTL for negative (not-found) results (30 sec - short)
pub const CACHE_TTL_NEGATIVE: u64 = 30;

// =============================================================================
// Rate Limiting
// =============================================================================

/// Environment variable for rate limit enabled
pub const ENV_RATE_LIMIT_ENABLED: &str = "SIDECHAT_RATE_LIMIT_ENABLED";

/// Environment variable for per-IP rate limiting (disabled by default)
pub const ENV_RATE_LIMIT_PER_IP: &str = "SIDECHAT_RATE_LIMIT_PER_IP";

/// Environment variable for API rate limit (requests per minute)
pub const ENV_RATE_LIMIT_API_RPM: &str = "SIDECHAT_RATE_LIMIT_API_RPM";

/// Environment variable for auth rate limit (requests per minute)
pub const ENV_RATE_LIMIT_AUTH_RPM: &str = "SIDECHAT_RATE_LIMIT_AUTH_RPM";

/// Environment variable for rate limit bypass header secret
pub const ENV_RATE_LIMIT_BYPASS_HEADER: &str = "SIDECHAT_RATE_LIMIT_BYPASS_HEADER";

/// Default API rate limit (requests per minute)
pub const DEFAULT_RATE_LIMIT_API_RPM: u32 = 1000;

/// Default auth rate limit (requests per minute, e.g. login attempts)
pub const DEFAULT_RATE_LIMIT_AUTH_RPM: u32 = 30;

/// Default auth failures rate limit (failures per minute per IP)
/// Limits brute force attacks by blocking identities with excessive failed auth attempts
pub const DEFAULT_RATE_LIMIT_AUTH_FAILURES_RPM: u32 = 60;

/// Rate limit window in seconds (fixed 1-minute window)
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

// =============================================================================
// Sync & Query Limits
// =============================================================================

/// Per-class sync page ceiling for messages
pub const SYNC_MAX_MESSAGES: u32 = 100;

/// Per-class sync page ceiling for direct messages
pub const SYNC_MAX_DIRECT_MESSAGES: u32 = 50;

/// Per-class sync page ceiling for everything else (friends, servers, channels, ...)
pub const SYNC_MAX_GENERAL: u32 = 100;

// =============================================================================
// Update Check
// =============================================================================

/// NPM registry URL for checking latest version
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org/sidechat/latest";

/// Update check HTTP timeout in seconds
pub const UPDATE_CHECK_TIMEOUT_SECS: u64 = 3;

/// Number of retry attempts for update check
pub const UPDATE_CHECK_RETRIES: u32 = 2;

/// Delay between retry attempts in milliseconds
pub const UPDATE_CHECK_RETRY_DELAY_MS: u64 = 500;

/// Environment variable to disable update check
pub const ENV_NO_UPDATE_CHECK: &str = "SIDECHAT_NO_UPDATE_CHECK";
