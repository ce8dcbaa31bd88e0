//! gRPC transport (component J).
//!
//! Wires the tonic-generated service stubs to the domain layer. Every
//! service except `AuthService` is served behind [`AuthInterceptor`]; the
//! auth service itself is registered bare since `Register`/`Login` and
//! friends have no session to validate yet (see
//! `crate::api::auth::middleware`).

pub mod pb {
    tonic::include_proto!("sidechat.v1");
}

mod auth;
mod convert;
mod direct_message;
mod friend;
mod invite;
mod message;
mod server;
mod sync;
mod typing;
mod user;
mod voice;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tonic::transport::Server as TonicServer;

use crate::api::auth::{AuthInterceptor, AuthManager, AuthService as AuthzService};
use crate::app::CoreApp;
use crate::core::config::RateLimitConfig;
use crate::core::secret::SecretManager;
use crate::data::ChatRepository;
use crate::data::cache::RateLimiter;
use crate::domain::{ReactiveRouter, SyncEngine};

use pb::auth_service_server::AuthServiceServer;
use pb::direct_message_service_server::DirectMessageServiceServer;
use pb::friend_service_server::FriendServiceServer;
use pb::message_service_server::MessageServiceServer;
use pb::server_service_server::ServerServiceServer;
use pb::sync_service_server::SyncServiceServer;
use pb::user_service_server::UserServiceServer;
use pb::voice_channel_service_server::VoiceChannelServiceServer;

/// Holds everything a gRPC service impl needs, cloned cheaply (all `Arc`s).
pub struct GrpcServer {
    repo: Arc<dyn ChatRepository>,
    router: Arc<ReactiveRouter>,
    sync_engine: Arc<SyncEngine>,
    auth_manager: Arc<AuthManager>,
    authz: AuthzService,
    rate_limiter: Arc<RateLimiter>,
    rate_limit_config: RateLimitConfig,
    secrets: SecretManager,
    typing_bus: Arc<typing::TypingBus>,
}

impl GrpcServer {
    pub fn new(app: &CoreApp) -> Self {
        Self {
            repo: app.database.repository(),
            router: app.router.clone(),
            sync_engine: app.sync_engine.clone(),
            auth_manager: app.auth.clone(),
            authz: AuthzService::new(app.database.clone()),
            rate_limiter: app.rate_limiter.clone(),
            rate_limit_config: app.config.rate_limit.clone(),
            secrets: app.secrets.clone(),
            typing_bus: Arc::new(typing::TypingBus::new()),
        }
    }

    pub async fn serve(
        self,
        addr: SocketAddr,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let interceptor = AuthInterceptor::new(self.auth_manager.clone());

        let auth_svc = auth::AuthServiceImpl::new(
            self.repo.clone(),
            self.router.clone(),
            self.auth_manager.clone(),
            self.secrets.clone(),
            self.rate_limiter.clone(),
            self.rate_limit_config.clone(),
        );
        let user_svc = user::UserServiceImpl::new(self.repo.clone(), self.router.clone());
        let friend_svc = friend::FriendServiceImpl::new(self.repo.clone(), self.router.clone());
        let message_svc = message::MessageServiceImpl::new(
            self.repo.clone(),
            self.router.clone(),
            self.authz.clone(),
            self.typing_bus.clone(),
        );
        let dm_svc =
            direct_message::DirectMessageServiceImpl::new(self.repo.clone(), self.router.clone(), self.typing_bus.clone());
        let server_svc = server::ServerServiceImpl::new(
            self.repo.clone(),
            self.router.clone(),
            self.authz.clone(),
            self.secrets.clone(),
        );
        let voice_svc =
            voice::VoiceChannelServiceImpl::new(self.repo.clone(), self.router.clone(), self.authz.clone());
        let sync_svc = sync::SyncServiceImpl::new(self.sync_engine.clone());

        tracing::info!(%addr, "Starting gRPC server");

        TonicServer::builder()
            .add_service(AuthServiceServer::new(auth_svc))
            .add_service(UserServiceServer::with_interceptor(user_svc, interceptor.clone()))
            .add_service(FriendServiceServer::with_interceptor(
                friend_svc,
                interceptor.clone(),
            ))
            .add_service(MessageServiceServer::with_interceptor(
                message_svc,
                interceptor.clone(),
            ))
            .add_service(DirectMessageServiceServer::with_interceptor(
                dm_svc,
                interceptor.clone(),
            ))
            .add_service(ServerServiceServer::with_interceptor(
                server_svc,
                interceptor.clone(),
            ))
            .add_service(VoiceChannelServiceServer::with_interceptor(
                voice_svc,
                interceptor.clone(),
            ))
            .add_service(SyncServiceServer::with_interceptor(sync_svc, interceptor))
            .serve_with_shutdown(addr, shutdown)
            .await?;

        Ok(())
    }
}
