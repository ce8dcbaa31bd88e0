//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{ApiServer, AuthManager};
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands, SystemCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::secret::SecretManager;
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::core::update;
use crate::data::TransactionalService;
use crate::data::cache::{CacheService, RateLimiter};
use crate::data::topics::TopicBus;
use crate::domain::{DomainEvent, ReactiveRouter, SyncEngine};
use crate::grpc::GrpcServer;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub secrets: SecretManager,
    pub database: Arc<TransactionalService>,
    pub bus: Arc<TopicBus<DomainEvent>>,
    pub router: Arc<ReactiveRouter>,
    pub sync_engine: Arc<SyncEngine>,
    pub auth: Arc<AuthManager>,
    pub cache: Arc<CacheService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::System {
                command: system_cmd,
            }) => {
                return Self::handle_system_command(system_cmd);
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        let secrets = SecretManager::init(&storage).await?;

        let cache = Arc::new(
            CacheService::new(&config.database.cache_config())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize cache service: {}", e))?,
        );
        tracing::debug!(backend = cache.backend_name(), "Cache initialized");

        let rate_limiter = Arc::new(RateLimiter::new(cache.clone()));

        let database = Arc::new(
            TransactionalService::init(
                config.database.transactional,
                &storage,
                config.database.postgres.as_ref(),
            )
            .await?,
        );

        let bus = Arc::new(TopicBus::<DomainEvent>::new());
        let router = Arc::new(ReactiveRouter::new(bus.clone()));
        let sync_engine = Arc::new(SyncEngine::new(database.repository()));
        let auth = Arc::new(AuthManager::init(&secrets, config.auth.enabled).await?);
        let shutdown = ShutdownService::new(bus.clone(), database.clone());

        Ok(Self {
            config,
            storage,
            secrets,
            database,
            bus,
            router,
            sync_engine,
            auth,
            shutdown,
            cache,
            rate_limiter,
        })
    }

    fn handle_system_command(cmd: SystemCommands) -> Result<()> {
        match cmd {
            SystemCommands::Prune { yes } => Self::prune_data(yes),
        }
    }

    fn prune_data(skip_confirm: bool) -> Result<()> {
        let data_dir = AppStorage::resolve_data_dir();

        if !data_dir.exists() {
            println!(
                "Nothing to prune. Data directory does not exist: {}",
                data_dir.display()
            );
            return Ok(());
        }

        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        println!("This will permanently delete the local data directory:");
        println!("  {}", data_dir.display());
        println!();
        println!(
            "Make sure the server is not running. \
             Deleting data while the server is running will cause data corruption."
        );

        if !skip_confirm {
            print!("\nContinue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Aborted.");
                return Ok(());
            }
        }

        std::fs::remove_dir_all(&data_dir)
            .with_context(|| format!("Failed to delete data directory: {}", data_dir.display()))?;
        println!("Pruned: {}", data_dir.display());
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        // Spawn update check (runs in background, prints notification when ready)
        if app.config.update.enabled {
            tokio::spawn(async {
                if let Some(new_version) = update::check_for_update().await {
                    banner::print_update_available(update::current_version(), &new_version);
                }
            });
        } else {
            tracing::debug!("Update check disabled by config");
        }

        app.start_background_tasks().await?;

        let grpc_server = GrpcServer::new(&app);
        let grpc_addr = format!("{}:{}", app.config.server.host, app.config.server.grpc_port)
            .parse()
            .context("Invalid gRPC bind address")?;
        let grpc_shutdown = app.shutdown.wait();
        let grpc_handle = tokio::spawn(async move {
            if let Err(e) = grpc_server.serve(grpc_addr, grpc_shutdown).await {
                tracing::error!(error = %e, "gRPC server error");
            }
        });
        app.shutdown.register(grpc_handle).await;

        banner::print_banner(
            &app.config.server.host,
            app.config.server.port,
            app.config.server.grpc_port,
            app.auth.is_enabled(),
            &app.storage.data_dir().display().to_string(),
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) -> Result<()> {
        self.shutdown
            .register(
                self.database
                    .start_checkpoint_task(self.shutdown.subscribe()),
            )
            .await;

        tracing::debug!("Background tasks started");
        Ok(())
    }
}
