use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_GRPC_PORT, DEFAULT_HOST,
    DEFAULT_PORT, DEFAULT_RATE_LIMIT_API_RPM, DEFAULT_RATE_LIMIT_AUTH_RPM,
    DEFAULT_SESSION_TTL_DAYS, POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS, POSTGRES_DEFAULT_MAX_CONNECTIONS,
    POSTGRES_DEFAULT_MAX_LIFETIME_SECS, POSTGRES_DEFAULT_MIN_CONNECTIONS,
    POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

// =============================================================================
// Transactional Backend Enum (SQLite or PostgreSQL)
// =============================================================================

/// Transactional database backend for chat state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionalBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for TransactionalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionalBackend::Sqlite => write!(f, "sqlite"),
            TransactionalBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// Cache Backend Enum
// =============================================================================

/// Cache backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    #[default]
    Memory,
    Redis,
}

impl fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendType::Memory => write!(f, "memory"),
            CacheBackendType::Redis => write!(f, "redis"),
        }
    }
}

// =============================================================================
// Eviction Policy Enum
// =============================================================================

/// Cache eviction policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// TinyLFU - LRU eviction + LFU admission (near-optimal hit ratio)
    #[default]
    TinyLfu,
    /// Simple LRU (better for recency-biased workloads)
    Lru,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::TinyLfu => write!(f, "tinylfu"),
            EvictionPolicy::Lru => write!(f, "lru"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub grpc_port: Option<u16>,
}

/// Authentication configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuthFileConfig {
    pub enabled: Option<bool>,
    pub session_ttl_days: Option<u32>,
}

/// Update check configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UpdateFileConfig {
    pub enabled: Option<bool>,
}

/// Redis cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RedisFileConfig {
    /// Connection URL for Redis-compatible backends
    pub url: Option<String>,
}

/// Memory cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MemoryCacheFileConfig {
    /// Maximum number of cache entries
    pub max_entries: Option<u64>,
    /// Cache eviction policy
    pub eviction_policy: Option<EvictionPolicy>,
}

/// Rate limit configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RateLimitFileConfig {
    pub enabled: Option<bool>,
    /// Enable per-IP rate limiting (for unauthenticated endpoints). Disabled by default.
    pub per_ip: Option<bool>,
    pub api_rpm: Option<u32>,
    pub auth_rpm: Option<u32>,
    pub bypass_header: Option<String>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use SIDECHAT_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    /// Transactional backend: sqlite (default) or postgres
    pub transactional: Option<TransactionalBackend>,
    /// Cache backend: memory (default) or redis
    pub cache: Option<CacheBackendType>,
    /// PostgreSQL-specific configuration
    pub postgres: Option<PostgresFileConfig>,
    /// Redis cache configuration
    pub redis: Option<RedisFileConfig>,
    /// Memory cache configuration
    pub memory_cache: Option<MemoryCacheFileConfig>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub auth: Option<AuthFileConfig>,
    pub rate_limit: Option<RateLimitFileConfig>,
    pub update: Option<UpdateFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Server
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                current.host = server.host;
            }
            if server.port.is_some() {
                current.port = server.port;
            }
            if server.grpc_port.is_some() {
                current.grpc_port = server.grpc_port;
            }
        }

        // Auth
        if let Some(auth) = other.auth {
            let current = self.auth.get_or_insert_with(AuthFileConfig::default);
            if auth.enabled.is_some() {
                current.enabled = auth.enabled;
            }
            if auth.session_ttl_days.is_some() {
                current.session_ttl_days = auth.session_ttl_days;
            }
        }

        // Rate Limit
        if let Some(rate_limit) = other.rate_limit {
            let current = self
                .rate_limit
                .get_or_insert_with(RateLimitFileConfig::default);
            if rate_limit.enabled.is_some() {
                current.enabled = rate_limit.enabled;
            }
            if rate_limit.per_ip.is_some() {
                current.per_ip = rate_limit.per_ip;
            }
            if rate_limit.api_rpm.is_some() {
                current.api_rpm = rate_limit.api_rpm;
            }
            if rate_limit.auth_rpm.is_some() {
                current.auth_rpm = rate_limit.auth_rpm;
            }
            if rate_limit.bypass_header.is_some() {
                current.bypass_header = rate_limit.bypass_header;
            }
        }

        // Update
        if let Some(update) = other.update {
            let current = self.update.get_or_insert_with(UpdateFileConfig::default);
            if update.enabled.is_some() {
                current.enabled = update.enabled;
            }
        }

        // Database
        if let Some(database) = other.database {
            let current = self
                .database
                .get_or_insert_with(DatabaseFileConfig::default);
            if database.transactional.is_some() {
                current.transactional = database.transactional;
            }
            if let Some(postgres) = database.postgres {
                let current_pg = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                if postgres.url.is_some() {
                    current_pg.url = postgres.url;
                }
                if postgres.max_connections.is_some() {
                    current_pg.max_connections = postgres.max_connections;
                }
                if postgres.acquire_timeout_secs.is_some() {
                    current_pg.acquire_timeout_secs = postgres.acquire_timeout_secs;
                }
            }
            if database.cache.is_some() {
                current.cache = database.cache;
            }
            if let Some(redis) = database.redis {
                let current_redis = current.redis.get_or_insert_with(RedisFileConfig::default);
                if redis.url.is_some() {
                    current_redis.url = redis.url;
                }
            }
            if let Some(memory_cache) = database.memory_cache {
                let current_mc = current
                    .memory_cache
                    .get_or_insert_with(MemoryCacheFileConfig::default);
                if memory_cache.max_entries.is_some() {
                    current_mc.max_entries = memory_cache.max_entries;
                }
                if memory_cache.eviction_policy.is_some() {
                    current_mc.eviction_policy = memory_cache.eviction_policy;
                }
            }
        }

        // Debug
        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// HTTP health server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub grpc_port: u16,
}

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub session_ttl_days: u32,
}

/// Update check configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub enabled: bool,
}

/// Redis cache configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL for Redis-compatible backends
    pub url: String,
}

/// Memory cache configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum number of cache entries
    pub max_entries: u64,
    /// Cache eviction policy
    pub eviction_policy: EvictionPolicy,
}

/// Cache configuration (used internally by CacheService)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache backend type
    pub backend: CacheBackendType,
    /// Maximum entries (memory backend)
    pub max_entries: u64,
    /// Eviction policy (memory backend)
    pub eviction_policy: EvictionPolicy,
    /// Redis URL (redis backend)
    pub redis_url: Option<String>,
}

/// Rate limit configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Enable per-IP rate limiting (unauthenticated endpoints). Disabled by default.
    pub per_ip: bool,
    pub api_rpm: u32,
    pub auth_rpm: u32,
    pub bypass_header: Option<String>,
}

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to keep warm
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
    /// Max connection lifetime in seconds
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// Database configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Transactional backend: sqlite (default) or postgres
    pub transactional: TransactionalBackend,
    /// Cache backend: memory (default) or redis
    pub cache: CacheBackendType,
    /// PostgreSQL-specific configuration (only used if transactional = postgres)
    pub postgres: Option<PostgresConfig>,
    /// Redis cache configuration (only used if cache = redis)
    pub redis: Option<RedisConfig>,
    /// Memory cache configuration
    pub memory_cache: MemoryCacheConfig,
}

impl DatabaseConfig {
    /// Build a CacheConfig for use by CacheService
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            backend: self.cache,
            max_entries: self.memory_cache.max_entries,
            eviction_policy: self.memory_cache.eviction_policy,
            redis_url: self.redis.as_ref().map(|r| r.url.clone()),
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub update: UpdateConfig,
    pub database: DatabaseConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.sidechat/sidechat.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.sidechat/sidechat.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        // 3. Extract file config values with defaults
        let file_server = file_config.server.unwrap_or_default();
        let file_auth = file_config.auth.unwrap_or_default();
        let file_rate_limit = file_config.rate_limit.unwrap_or_default();
        let file_update = file_config.update.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();

        // 4. Layer configs: defaults -> file config -> CLI/env overrides
        let host = cli
            .host
            .clone()
            .or(file_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT);
        let grpc_port = cli
            .grpc_port
            .or(file_server.grpc_port)
            .unwrap_or(DEFAULT_GRPC_PORT);

        // auth.enabled: file config sets default, --no-auth CLI flag disables
        let auth_enabled = if cli.no_auth {
            false
        } else {
            file_auth.enabled.unwrap_or(true)
        };
        let session_ttl_days = file_auth
            .session_ttl_days
            .unwrap_or(DEFAULT_SESSION_TTL_DAYS);

        // debug: CLI/env flag takes precedence, then file config, default false
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        // update config: CLI flag overrides file config, default enabled
        let update_enabled = if cli.no_update_check {
            false
        } else {
            file_update.enabled.unwrap_or(true)
        };

        // cache config: CLI/env overrides file config
        let cache_backend = cli
            .cache_backend
            .or(file_database.cache)
            .unwrap_or_default();

        // Memory cache config
        let file_memory_cache = file_database.memory_cache.unwrap_or_default();
        let cache_max_entries = cli
            .cache_max_entries
            .or(file_memory_cache.max_entries)
            .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);
        let cache_eviction_policy = cli
            .cache_eviction_policy
            .or(file_memory_cache.eviction_policy)
            .unwrap_or_default();
        let memory_cache_config = MemoryCacheConfig {
            max_entries: cache_max_entries,
            eviction_policy: cache_eviction_policy,
        };

        // Redis config (only populated if using redis backend)
        let redis_config = if cache_backend == CacheBackendType::Redis {
            let file_redis = file_database.redis.unwrap_or_default();
            let url = cli
                .cache_redis_url
                .clone()
                .or(file_redis.url)
                .unwrap_or_default();
            Some(RedisConfig { url })
        } else {
            None
        };

        // rate_limit config: CLI/env overrides file config
        let rate_limit_enabled = cli
            .rate_limit_enabled
            .or(file_rate_limit.enabled)
            .unwrap_or(true);
        let rate_limit_per_ip = cli
            .rate_limit_per_ip
            .or(file_rate_limit.per_ip)
            .unwrap_or(false);
        let rate_limit_api_rpm = cli
            .rate_limit_api_rpm
            .or(file_rate_limit.api_rpm)
            .unwrap_or(DEFAULT_RATE_LIMIT_API_RPM);
        let rate_limit_auth_rpm = cli
            .rate_limit_auth_rpm
            .or(file_rate_limit.auth_rpm)
            .unwrap_or(DEFAULT_RATE_LIMIT_AUTH_RPM);
        let rate_limit_bypass_header = cli
            .rate_limit_bypass_header
            .clone()
            .or(file_rate_limit.bypass_header);

        let rate_limit = RateLimitConfig {
            enabled: rate_limit_enabled,
            per_ip: rate_limit_per_ip,
            api_rpm: rate_limit_api_rpm,
            auth_rpm: rate_limit_auth_rpm,
            bypass_header: rate_limit_bypass_header,
        };

        // database config: file config with env var overrides for sensitive values
        let transactional_backend = cli
            .transactional_backend
            .or(file_database.transactional)
            .unwrap_or_default();

        // PostgreSQL config (only populated if using postgres backend)
        let postgres_config = if transactional_backend == TransactionalBackend::Postgres {
            let file_pg = file_database.postgres.unwrap_or_default();
            let url = cli
                .postgres_url
                .clone()
                .or_else(|| std::env::var("SIDECHAT_POSTGRES_URL").ok())
                .or(file_pg.url)
                .unwrap_or_default();
            Some(PostgresConfig {
                url,
                max_connections: file_pg
                    .max_connections
                    .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
                min_connections: file_pg
                    .min_connections
                    .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
                acquire_timeout_secs: file_pg
                    .acquire_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
                idle_timeout_secs: file_pg
                    .idle_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: file_pg
                    .max_lifetime_secs
                    .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
                statement_timeout_secs: file_pg
                    .statement_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
            })
        } else {
            None
        };

        let database = DatabaseConfig {
            transactional: transactional_backend,
            cache: cache_backend,
            postgres: postgres_config,
            redis: redis_config,
            memory_cache: memory_cache_config,
        };

        let config = Self {
            server: ServerConfig {
                host,
                port,
                grpc_port,
            },
            auth: AuthConfig {
                enabled: auth_enabled,
                session_ttl_days,
            },
            rate_limit,
            update: UpdateConfig {
                enabled: update_enabled,
            },
            database,
            debug,
        };

        // Validate configuration
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            grpc_port = config.server.grpc_port,
            auth_enabled = config.auth.enabled,
            debug = config.debug,
            cache_backend = %config.database.cache,
            cache_max_entries = config.database.memory_cache.max_entries,
            rate_limit_enabled = config.rate_limit.enabled,
            update_enabled = config.update.enabled,
            transactional_backend = %config.database.transactional,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        // Host must not be empty
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port must be non-zero (port 0 would cause bind failure)
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }
        if self.server.grpc_port == 0 {
            anyhow::bail!("Configuration error: server.grpc_port must be greater than 0");
        }

        // Port collision check
        if self.server.port == self.server.grpc_port {
            anyhow::bail!(
                "Configuration error: server.port ({}) and server.grpc_port ({}) cannot be the same",
                self.server.port,
                self.server.grpc_port
            );
        }

        if self.database.transactional == TransactionalBackend::Postgres
            && self
                .database
                .postgres
                .as_ref()
                .is_none_or(|p| p.url.is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.postgres.url is required when database.transactional = postgres"
            );
        }

        if self.database.cache == CacheBackendType::Redis
            && self
                .database
                .redis
                .as_ref()
                .is_none_or(|r| r.url.is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.redis.url is required when database.cache = redis"
            );
        }

        Ok(())
    }
}

/// Get path to the profile-level config file (~/.sidechat/sidechat.json)
fn get_profile_config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Whether a host string binds to all interfaces
pub fn is_all_interfaces(host: &str) -> bool {
    host == "0.0.0.0" || host == "::"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_all_interfaces() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(!is_all_interfaces("127.0.0.1"));
        assert!(!is_all_interfaces("localhost"));
    }

    #[test]
    fn test_cache_config_derivation() {
        let db = DatabaseConfig {
            transactional: TransactionalBackend::Sqlite,
            cache: CacheBackendType::Memory,
            postgres: None,
            redis: None,
            memory_cache: MemoryCacheConfig {
                max_entries: 1000,
                eviction_policy: EvictionPolicy::TinyLfu,
            },
        };
        let cache_config = db.cache_config();
        assert_eq!(cache_config.max_entries, 1000);
        assert!(cache_config.redis_url.is_none());
    }

    #[test]
    fn test_file_config_merge_overlay_wins() {
        let mut base = FileConfig {
            server: Some(ServerFileConfig {
                host: Some("127.0.0.1".to_string()),
                port: Some(1234),
                grpc_port: None,
            }),
            ..Default::default()
        };
        let overlay = FileConfig {
            server: Some(ServerFileConfig {
                host: None,
                port: Some(9999),
                grpc_port: None,
            }),
            ..Default::default()
        };
        base.merge(overlay);
        let server = base.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(9999));
    }
}
