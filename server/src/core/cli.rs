use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::{CacheBackendType, EvictionPolicy, TransactionalBackend};
use super::constants::{
    ENV_CACHE_BACKEND, ENV_CACHE_EVICTION_POLICY, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_REDIS_URL,
    ENV_CONFIG, ENV_DEBUG, ENV_GRPC_PORT, ENV_HOST, ENV_NO_UPDATE_CHECK, ENV_PORT,
    ENV_POSTGRES_URL, ENV_RATE_LIMIT_API_RPM, ENV_RATE_LIMIT_AUTH_RPM,
    ENV_RATE_LIMIT_BYPASS_HEADER, ENV_RATE_LIMIT_ENABLED, ENV_RATE_LIMIT_PER_IP,
    ENV_TRANSACTIONAL_BACKEND,
};

#[derive(Parser)]
#[command(name = "sidechat")]
#[command(version, about = "Self-hosted chat server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// HTTP health server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// gRPC server port
    #[arg(long, global = true, env = ENV_GRPC_PORT)]
    pub grpc_port: Option<u16>,

    /// Disable authentication (for development)
    #[arg(long, global = true)]
    pub no_auth: bool,

    /// Enable debug mode
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Disable update check on startup
    #[arg(long, global = true, env = ENV_NO_UPDATE_CHECK)]
    pub no_update_check: bool,

    // Cache options
    /// Cache backend (memory or redis)
    #[arg(long, global = true, env = ENV_CACHE_BACKEND, value_parser = parse_cache_backend_type)]
    pub cache_backend: Option<CacheBackendType>,

    /// Maximum number of cache entries
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Cache eviction policy (tinylfu or lru)
    #[arg(long, global = true, env = ENV_CACHE_EVICTION_POLICY, value_parser = parse_eviction_policy)]
    pub cache_eviction_policy: Option<EvictionPolicy>,

    /// Redis-compatible cache URL. Supports Redis, Sentinel, Valkey, Dragonfly.
    /// Formats: redis://host:port/db, redis+sentinel://s1:port,s2:port/master/db
    #[arg(long, global = true, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,

    // Rate limit options
    /// Enable or disable rate limiting
    #[arg(long, global = true, env = ENV_RATE_LIMIT_ENABLED)]
    pub rate_limit_enabled: Option<bool>,

    /// Enable per-IP rate limiting (unauthenticated endpoints). Disabled by default.
    #[arg(long, global = true, env = ENV_RATE_LIMIT_PER_IP)]
    pub rate_limit_per_ip: Option<bool>,

    /// API rate limit (requests per minute)
    #[arg(long, global = true, env = ENV_RATE_LIMIT_API_RPM)]
    pub rate_limit_api_rpm: Option<u32>,

    /// Auth rate limit (requests per minute)
    #[arg(long, global = true, env = ENV_RATE_LIMIT_AUTH_RPM)]
    pub rate_limit_auth_rpm: Option<u32>,

    /// Rate limit bypass header secret
    #[arg(long, global = true, env = ENV_RATE_LIMIT_BYPASS_HEADER)]
    pub rate_limit_bypass_header: Option<String>,

    // Database options
    /// Transactional database backend (sqlite or postgres)
    #[arg(long, global = true, env = ENV_TRANSACTIONAL_BACKEND, value_parser = parse_transactional_backend)]
    pub transactional_backend: Option<TransactionalBackend>,

    /// PostgreSQL connection URL (when using postgres backend)
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,
}

/// Parse cache backend type from CLI/env string
fn parse_cache_backend_type(s: &str) -> Result<CacheBackendType, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(CacheBackendType::Memory),
        "redis" => Ok(CacheBackendType::Redis),
        _ => Err(format!(
            "Invalid cache backend '{}'. Valid options: memory, redis",
            s
        )),
    }
}

/// Parse eviction policy from CLI/env string
fn parse_eviction_policy(s: &str) -> Result<EvictionPolicy, String> {
    match s.to_lowercase().as_str() {
        "tinylfu" => Ok(EvictionPolicy::TinyLfu),
        "lru" => Ok(EvictionPolicy::Lru),
        _ => Err(format!(
            "Invalid eviction policy '{}'. Valid options: tinylfu, lru",
            s
        )),
    }
}

/// Parse transactional backend from CLI/env string
fn parse_transactional_backend(s: &str) -> Result<TransactionalBackend, String> {
    match s.to_lowercase().as_str() {
        "sqlite" => Ok(TransactionalBackend::Sqlite),
        "postgres" | "postgresql" => Ok(TransactionalBackend::Postgres),
        _ => Err(format!(
            "Invalid transactional backend '{}'. Valid options: sqlite, postgres",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete local data directory (databases, caches). Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub grpc_port: Option<u16>,
    pub no_auth: bool,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub no_update_check: bool,
    pub cache_backend: Option<CacheBackendType>,
    pub cache_max_entries: Option<u64>,
    pub cache_eviction_policy: Option<EvictionPolicy>,
    pub cache_redis_url: Option<String>,
    pub rate_limit_enabled: Option<bool>,
    pub rate_limit_per_ip: Option<bool>,
    pub rate_limit_api_rpm: Option<u32>,
    pub rate_limit_auth_rpm: Option<u32>,
    pub rate_limit_bypass_header: Option<String>,
    pub transactional_backend: Option<TransactionalBackend>,
    pub postgres_url: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        grpc_port: cli.grpc_port,
        no_auth: cli.no_auth,
        debug: cli.debug,
        config: cli.config,
        no_update_check: cli.no_update_check,
        cache_backend: cli.cache_backend,
        cache_max_entries: cli.cache_max_entries,
        cache_eviction_policy: cli.cache_eviction_policy,
        cache_redis_url: cli.cache_redis_url,
        rate_limit_enabled: cli.rate_limit_enabled,
        rate_limit_per_ip: cli.rate_limit_per_ip,
        rate_limit_api_rpm: cli.rate_limit_api_rpm,
        rate_limit_auth_rpm: cli.rate_limit_auth_rpm,
        rate_limit_bypass_header: cli.rate_limit_bypass_header,
        transactional_backend: cli.transactional_backend,
        postgres_url: cli.postgres_url,
    };
    (config, cli.command)
}
