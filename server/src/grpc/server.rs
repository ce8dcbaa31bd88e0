//! `ServerService`: servers, channels, roles, permissions and invites.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};

use crate::api::auth::{user_id, AuthContext, AuthService as AuthzService};
use crate::api::types::ApiError;
use crate::core::secret::SecretManager;
use crate::data::ChatRepository;
use crate::domain::{Operation, ReactiveRouter};

use super::convert::{
    channel_permission_to_pb, channel_to_pb, channel_to_pb_read, role_to_pb, server_member_to_pb_read,
    server_to_pb, server_to_pb_read,
};
use super::invite;
use super::pb::server_service_server::ServerService as ServerServiceTrait;
use super::pb::{
    BanMemberRequest, Channel, ChannelPermission, CreateChannelRequest, CreateInviteRequest,
    CreateRoleRequest, CreateServerRequest, Empty, GetServerRequest, Invite, JoinInviteRequest,
    Role, Server, ServerMember, SetChannelPermissionRequest, UpdateServerRequest,
};

const MODERATOR_LEVEL: i32 = 1;

pub struct ServerServiceImpl {
    repo: Arc<dyn ChatRepository>,
    router: Arc<ReactiveRouter>,
    authz: AuthzService,
    secrets: SecretManager,
}

impl ServerServiceImpl {
    pub fn new(
        repo: Arc<dyn ChatRepository>,
        router: Arc<ReactiveRouter>,
        authz: AuthzService,
        secrets: SecretManager,
    ) -> Self {
        Self {
            repo,
            router,
            authz,
            secrets,
        }
    }
}

type ServerMemberStream = Pin<Box<dyn Stream<Item = Result<ServerMember, Status>> + Send>>;

#[tonic::async_trait]
impl ServerServiceTrait for ServerServiceImpl {
    async fn create_server(
        &self,
        request: Request<CreateServerRequest>,
    ) -> Result<Response<Server>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let server = self
            .repo
            .create_server(&caller, &req.name, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        self.repo
            .add_server_member(&server.id, &caller, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(server_to_pb_read(&server)))
    }

    async fn get_server(
        &self,
        request: Request<GetServerRequest>,
    ) -> Result<Response<Server>, Status> {
        let req = request.into_inner();
        let server = self.repo.get_server(&req.server_id).await.map_err(ApiError::from_data)?;
        Ok(Response::new(server_to_pb_read(&server)))
    }

    async fn update_server(
        &self,
        request: Request<UpdateServerRequest>,
    ) -> Result<Response<Server>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.authz
            .verify_server_owner(&AuthContext::Session { user_id: caller }, &req.server_id)
            .await
            .map_err(Status::from)?;
        let server = self
            .repo
            .update_server(&req.server_id, req.name.as_deref(), req.icon_url.as_deref(), &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(server_to_pb(&server, super::convert::op_to_pb(Operation::Update))))
    }

    async fn delete_server(
        &self,
        request: Request<GetServerRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.authz
            .verify_server_owner(&AuthContext::Session { user_id: caller }, &req.server_id)
            .await
            .map_err(Status::from)?;
        self.repo.delete_server(&req.server_id, &self.router).await.map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    type ListMembersStream = ServerMemberStream;

    async fn list_members(
        &self,
        request: Request<GetServerRequest>,
    ) -> Result<Response<Self::ListMembersStream>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.authz
            .verify_server_access(&AuthContext::Session { user_id: caller }, &req.server_id)
            .await
            .map_err(Status::from)?;

        let rows = self.repo.list_server_members(&req.server_id).await.map_err(ApiError::from_data)?;
        let output = stream! {
            for row in rows {
                yield Ok(server_member_to_pb_read(&row));
            }
        };
        Ok(Response::new(Box::pin(output)))
    }

    async fn create_channel(
        &self,
        request: Request<CreateChannelRequest>,
    ) -> Result<Response<Channel>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.authz
            .verify_server_role(&AuthContext::Session { user_id: caller }, &req.server_id, MODERATOR_LEVEL)
            .await
            .map_err(Status::from)?;
        let channel = self
            .repo
            .create_channel(&req.server_id, &req.name, req.is_voice, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(channel_to_pb_read(&channel)))
    }

    async fn create_role(
        &self,
        request: Request<CreateRoleRequest>,
    ) -> Result<Response<Role>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.authz
            .verify_server_role(&AuthContext::Session { user_id: caller }, &req.server_id, MODERATOR_LEVEL)
            .await
            .map_err(Status::from)?;
        let role = self
            .repo
            .create_role(&req.server_id, &req.name, req.level, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(role_to_pb(&role, super::convert::op_to_pb(Operation::Insert))))
    }

    async fn set_channel_permission(
        &self,
        request: Request<SetChannelPermissionRequest>,
    ) -> Result<Response<ChannelPermission>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();

        let channel = self.repo.get_channel(&req.channel_id).await.map_err(ApiError::from_data)?;
        self.authz
            .verify_server_role(&AuthContext::Session { user_id: caller }, &channel.server_id, MODERATOR_LEVEL)
            .await
            .map_err(Status::from)?;

        let permission = self
            .repo
            .set_channel_permission(&req.channel_id, &req.role_id, req.allow_mask, req.deny_mask, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(channel_permission_to_pb(&permission, super::convert::op_to_pb(Operation::Update))))
    }

    async fn create_invite(
        &self,
        request: Request<CreateInviteRequest>,
    ) -> Result<Response<Invite>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.authz
            .verify_server_role(&AuthContext::Session { user_id: caller }, &req.server_id, MODERATOR_LEVEL)
            .await
            .map_err(Status::from)?;

        let code = invite::create_code(&self.secrets, &req.server_id, req.expires_at)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;
        Ok(Response::new(Invite {
            code,
            server_id: req.server_id,
            expires_at: req.expires_at.unwrap_or(0),
        }))
    }

    async fn join_invite(
        &self,
        request: Request<JoinInviteRequest>,
    ) -> Result<Response<ServerMember>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();

        let decoded = invite::decode_code(&self.secrets, &req.code)
            .await
            .ok_or_else(|| Status::invalid_argument("invalid or tampered invite code"))?;
        if let Some(expires_at) = decoded.expires_at {
            if expires_at < crate::utils::time::now_unix() {
                return Err(Status::invalid_argument("invite code has expired"));
            }
        }

        let member = self
            .repo
            .add_server_member(&decoded.server_id, &caller, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(server_member_to_pb_read(&member)))
    }

    async fn ban_member(
        &self,
        request: Request<BanMemberRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.authz
            .verify_server_role(&AuthContext::Session { user_id: caller }, &req.server_id, MODERATOR_LEVEL)
            .await
            .map_err(Status::from)?;

        self.repo
            .set_server_member_banned(&req.server_id, &req.user_id, true, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::AuthService as AuthzServiceImpl;
    use crate::core::secret::SecretManager;
    use crate::core::storage::AppStorage;
    use crate::data::sqlite::SqliteService;
    use crate::data::topics::TopicBus;
    use crate::data::TransactionalService;
    use crate::utils::crypto;

    async fn test_db() -> Arc<TransactionalService> {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA).execute(&pool).await.unwrap();
        Arc::new(TransactionalService::Sqlite(Arc::new(SqliteService::from_pool(pool))))
    }

    async fn test_secrets() -> SecretManager {
        let storage = AppStorage::init_for_test(
            std::env::temp_dir().join(format!("sidechat-server-svc-test-{}", crypto::generate_token(8))),
        );
        SecretManager::init(&storage).await.unwrap()
    }

    fn authed<T>(body: T, user_id: &str) -> Request<T> {
        let mut request = Request::new(body);
        request.extensions_mut().insert(AuthContext::Session {
            user_id: user_id.to_string(),
        });
        request
    }

    fn router() -> Arc<ReactiveRouter> {
        Arc::new(ReactiveRouter::new(Arc::new(TopicBus::new())))
    }

    #[tokio::test]
    async fn create_channel_requires_moderator() {
        let db = test_db().await;
        let repo = db.repository();
        let router = router();
        let owner = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let member = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let server = repo.create_server(&owner.id, "home", &router).await.unwrap();
        repo.add_server_member(&server.id, &owner.id, &router).await.unwrap();
        repo.add_server_member(&server.id, &member.id, &router).await.unwrap();

        let authz = AuthzServiceImpl::new(db.clone());
        let svc = ServerServiceImpl::new(repo, router, authz, test_secrets().await);

        let err = svc
            .create_channel(authed(
                CreateChannelRequest {
                    server_id: server.id,
                    name: "general".into(),
                    is_voice: false,
                },
                &member.id,
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn invite_round_trips_into_membership() {
        let db = test_db().await;
        let repo = db.repository();
        let router = router();
        let owner = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let joiner = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let server = repo.create_server(&owner.id, "home", &router).await.unwrap();
        repo.add_server_member(&server.id, &owner.id, &router).await.unwrap();

        let authz = AuthzServiceImpl::new(db.clone());
        let svc = ServerServiceImpl::new(repo.clone(), router, authz, test_secrets().await);

        let invite = svc
            .create_invite(authed(
                CreateInviteRequest {
                    server_id: server.id.clone(),
                    expires_at: None,
                },
                &owner.id,
            ))
            .await
            .unwrap()
            .into_inner();

        svc.join_invite(authed(JoinInviteRequest { code: invite.code }, &joiner.id))
            .await
            .unwrap();

        let members = repo.list_server_members(&server.id).await.unwrap();
        assert!(members.iter().any(|m| m.user_id == joiner.id));
    }
}
