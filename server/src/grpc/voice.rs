//! `VoiceChannelService`: voice presence and mute/deafen state.
//!
//! State-only — there is no media transport here, just who is "in" a voice
//! channel and their mute/deafen flags, kept in `voice_states` and fanned out
//! like every other reactive table.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::api::auth::{user_id, AuthContext, AuthService as AuthzService};
use crate::api::types::ApiError;
use crate::data::ChatRepository;
use crate::domain::ReactiveRouter;

use super::convert::voice_state_to_pb_read;
use super::pb::voice_channel_service_server::VoiceChannelService as VoiceChannelServiceTrait;
use super::pb::{
    Empty, JoinVoiceRequest, LeaveVoiceRequest, MoveMemberRequest, ServerMuteRequest, SetDeafenRequest,
    SetMuteRequest, VoiceState,
};

pub struct VoiceChannelServiceImpl {
    repo: Arc<dyn ChatRepository>,
    router: Arc<ReactiveRouter>,
    authz: AuthzService,
}

impl VoiceChannelServiceImpl {
    pub fn new(repo: Arc<dyn ChatRepository>, router: Arc<ReactiveRouter>, authz: AuthzService) -> Self {
        Self { repo, router, authz }
    }

    async fn require_channel_moderator(&self, caller: &str, channel_id: &str) -> Result<(), Status> {
        let channel = self.repo.get_channel(channel_id).await.map_err(ApiError::from_data)?;
        self.authz
            .verify_server_role(&AuthContext::Session { user_id: caller.to_string() }, &channel.server_id, 1)
            .await
            .map_err(Status::from)
    }
}

#[tonic::async_trait]
impl VoiceChannelServiceTrait for VoiceChannelServiceImpl {
    async fn join(&self, request: Request<JoinVoiceRequest>) -> Result<Response<VoiceState>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let row = self
            .repo
            .upsert_voice_state(&req.channel_id, &caller, false, false, false, false, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(voice_state_to_pb_read(&row)))
    }

    async fn leave(&self, request: Request<LeaveVoiceRequest>) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.repo
            .remove_voice_state(&req.channel_id, &caller, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn set_mute(&self, request: Request<SetMuteRequest>) -> Result<Response<VoiceState>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let existing = self
            .repo
            .upsert_voice_state(&req.channel_id, &caller, req.self_mute, false, false, false, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        let row = self
            .repo
            .upsert_voice_state(
                &req.channel_id,
                &caller,
                req.self_mute,
                existing.self_deafen,
                existing.server_mute,
                existing.server_deafen,
                &self.router,
            )
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(voice_state_to_pb_read(&row)))
    }

    async fn set_deafen(&self, request: Request<SetDeafenRequest>) -> Result<Response<VoiceState>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let existing = self
            .repo
            .upsert_voice_state(&req.channel_id, &caller, false, req.self_deafen, false, false, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        let row = self
            .repo
            .upsert_voice_state(
                &req.channel_id,
                &caller,
                existing.self_mute,
                req.self_deafen,
                existing.server_mute,
                existing.server_deafen,
                &self.router,
            )
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(voice_state_to_pb_read(&row)))
    }

    async fn move_member(
        &self,
        request: Request<MoveMemberRequest>,
    ) -> Result<Response<VoiceState>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.require_channel_moderator(&caller, &req.channel_id).await?;

        // There is no "which channel is this user currently in" lookup, only
        // per-(channel, user) rows, so a moderator move force-places the
        // member into the target channel with a clean slate rather than
        // trying to locate and drop a prior row first.
        let row = self
            .repo
            .upsert_voice_state(&req.channel_id, &req.user_id, false, false, false, false, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(voice_state_to_pb_read(&row)))
    }

    async fn set_server_mute(
        &self,
        request: Request<ServerMuteRequest>,
    ) -> Result<Response<VoiceState>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.require_channel_moderator(&caller, &req.channel_id).await?;

        let existing = self
            .repo
            .upsert_voice_state(&req.channel_id, &req.user_id, false, false, req.muted, false, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        let row = self
            .repo
            .upsert_voice_state(
                &req.channel_id,
                &req.user_id,
                existing.self_mute,
                existing.self_deafen,
                req.muted,
                existing.server_deafen,
                &self.router,
            )
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(voice_state_to_pb_read(&row)))
    }

    async fn disconnect(&self, request: Request<LeaveVoiceRequest>) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.require_channel_moderator(&caller, &req.channel_id).await?;
        self.repo
            .remove_voice_state(&req.channel_id, &req.user_id, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::AuthService as AuthzServiceImpl;
    use crate::data::sqlite::SqliteService;
    use crate::data::topics::TopicBus;
    use crate::data::TransactionalService;

    async fn test_db() -> Arc<TransactionalService> {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA).execute(&pool).await.unwrap();
        Arc::new(TransactionalService::Sqlite(Arc::new(SqliteService::from_pool(pool))))
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
    async fn join_then_leave_round_trips() {
        let db = test_db().await;
        let repo = db.repository();
        let router = router();
        let owner = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let server = repo.create_server(&owner.id, "home", &router).await.unwrap();
        let channel = repo.create_channel(&server.id, "voice", true, &router).await.unwrap();

        let authz = AuthzServiceImpl::new(db.clone());
        let svc = VoiceChannelServiceImpl::new(repo.clone(), router.clone(), authz);

        let state = svc
            .join(authed(JoinVoiceRequest { channel_id: channel.id.clone() }, &owner.id))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(state.channel_id, channel.id);

        svc.leave(authed(LeaveVoiceRequest { channel_id: channel.id.clone() }, &owner.id))
            .await
            .unwrap();

        let states = repo.sync_voice_channels(&server.id, 0).await.unwrap();
        assert!(states.rows.is_empty());
    }

    #[tokio::test]
    async fn move_member_requires_moderator() {
        let db = test_db().await;
        let repo = db.repository();
        let router = router();
        let owner = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let member = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let server = repo.create_server(&owner.id, "home", &router).await.unwrap();
        repo.add_server_member(&server.id, &owner.id, &router).await.unwrap();
        repo.add_server_member(&server.id, &member.id, &router).await.unwrap();
        let channel = repo.create_channel(&server.id, "voice", true, &router).await.unwrap();

        let authz = AuthzServiceImpl::new(db.clone());
        let svc = VoiceChannelServiceImpl::new(repo, router, authz);

        let err = svc
            .move_member(authed(
                MoveMemberRequest {
                    channel_id: channel.id,
                    user_id: member.id.clone(),
                },
                &member.id,
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }
}
