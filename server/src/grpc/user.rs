//! `UserService`: profile, status, settings and block-list management.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::api::auth::user_id;
use crate::api::types::ApiError;
use crate::data::ChatRepository;
use crate::domain::ReactiveRouter;

use super::convert::{profile_to_pb, settings_to_pb, user_to_pb};
use super::pb::user_service_server::UserService as UserServiceTrait;
use super::pb::{
    BlockUserRequest, BlockedUsersResponse, DeleteUserRequest, Empty, GetUserRequest, SetCustomStatusRequest,
    UpdateSettingsRequest, UpdateStatusRequest, UpdateUserRequest, User, UserProfile, UserSettings,
};

pub struct UserServiceImpl {
    repo: Arc<dyn ChatRepository>,
    router: Arc<ReactiveRouter>,
}

impl UserServiceImpl {
    pub fn new(repo: Arc<dyn ChatRepository>, router: Arc<ReactiveRouter>) -> Self {
        Self { repo, router }
    }
}

#[tonic::async_trait]
impl UserServiceTrait for UserServiceImpl {
    async fn get_user(&self, request: Request<GetUserRequest>) -> Result<Response<User>, Status> {
        let req = request.into_inner();
        let user = self.repo.get_user(&req.user_id).await.map_err(ApiError::from_data)?;
        Ok(Response::new(user_to_pb(&user)))
    }

    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<User>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let user = self
            .repo
            .update_user(
                &caller,
                req.display_name.as_deref(),
                req.avatar_url.as_deref(),
                &self.router,
            )
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(user_to_pb(&user)))
    }

    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        if req.user_id != caller {
            return Err(Status::permission_denied("cannot delete another user's account"));
        }
        self.repo
            .delete_user(&caller, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn get_user_profile(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<UserProfile>, Status> {
        let req = request.into_inner();
        let profile = self
            .repo
            .get_user_profile(&req.user_id)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(profile_to_pb(&profile)))
    }

    async fn update_status(
        &self,
        request: Request<UpdateStatusRequest>,
    ) -> Result<Response<UserProfile>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let existing = self
            .repo
            .get_user_profile(&caller)
            .await
            .map_err(ApiError::from_data)?;
        let profile = self
            .repo
            .upsert_user_profile(&caller, &req.status, existing.custom_status.as_deref(), &[], &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(profile_to_pb(&profile)))
    }

    async fn get_status(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<UserProfile>, Status> {
        self.get_user_profile(request).await
    }

    async fn set_custom_status(
        &self,
        request: Request<SetCustomStatusRequest>,
    ) -> Result<Response<UserProfile>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let existing = self
            .repo
            .get_user_profile(&caller)
            .await
            .map_err(ApiError::from_data)?;
        let custom_status = if req.custom_status.is_empty() {
            None
        } else {
            Some(req.custom_status.as_str())
        };
        let profile = self
            .repo
            .upsert_user_profile(&caller, &existing.status, custom_status, &[], &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(profile_to_pb(&profile)))
    }

    async fn get_custom_status(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<UserProfile>, Status> {
        self.get_user_profile(request).await
    }

    async fn update_settings(
        &self,
        request: Request<UpdateSettingsRequest>,
    ) -> Result<Response<UserSettings>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let profile = self
            .repo
            .update_user_settings(&caller, req.notifications_enabled, req.theme.as_deref())
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(settings_to_pb(&profile)))
    }

    async fn get_settings(&self, request: Request<Empty>) -> Result<Response<UserSettings>, Status> {
        let caller = user_id(&request)?.to_string();
        let profile = self
            .repo
            .get_user_profile(&caller)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(settings_to_pb(&profile)))
    }

    async fn block_user(
        &self,
        request: Request<BlockUserRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let target = request.into_inner().user_id;
        if target == caller {
            return Err(Status::invalid_argument("cannot block yourself"));
        }
        match self.repo.get_friend_pair(&caller, &target).await {
            Ok(row) => {
                self.repo
                    .update_friend_status(&row.id, "blocked", &self.router)
                    .await
                    .map_err(ApiError::from_data)?;
            }
            Err(_) => {
                let row = self
                    .repo
                    .create_friend_request(&caller, &target, &self.router)
                    .await
                    .map_err(ApiError::from_data)?;
                self.repo
                    .update_friend_status(&row.id, "blocked", &self.router)
                    .await
                    .map_err(ApiError::from_data)?;
            }
        }
        Ok(Response::new(Empty {}))
    }

    async fn unblock_user(
        &self,
        request: Request<BlockUserRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let target = request.into_inner().user_id;
        let row = self
            .repo
            .get_friend_pair(&caller, &target)
            .await
            .map_err(ApiError::from_data)?;
        self.repo
            .delete_friend(&row.id, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn get_blocked_users(
        &self,
        request: Request<Empty>,
    ) -> Result<Response<BlockedUsersResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let blocked = self
            .repo
            .list_friends(&caller, "blocked")
            .await
            .map_err(ApiError::from_data)?;

        let mut users = Vec::with_capacity(blocked.len());
        for row in &blocked {
            let user = self.repo.get_user(&row.friend_id).await.map_err(ApiError::from_data)?;
            users.push(user_to_pb(&user));
        }
        Ok(Response::new(BlockedUsersResponse { users }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::AuthContext;
    use crate::data::sqlite::SqliteService;
    use crate::data::topics::TopicBus;

    async fn test_service() -> Arc<dyn ChatRepository> {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA).execute(&pool).await.unwrap();
        Arc::new(SqliteService::from_pool(pool)) as Arc<dyn ChatRepository>
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
    async fn delete_user_rejects_other_accounts() {
        let repo = test_service().await;
        let router = router();
        let me = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let other = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let svc = UserServiceImpl::new(repo, router);

        let request = authed(DeleteUserRequest { user_id: other.id }, &me.id);
        let err = svc.delete_user(request).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn block_then_get_blocked_users_round_trips() {
        let repo = test_service().await;
        let router = router();
        let me = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let target = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let svc = UserServiceImpl::new(repo, router);

        svc.block_user(authed(BlockUserRequest { user_id: target.id.clone() }, &me.id))
            .await
            .unwrap();

        let resp = svc
            .get_blocked_users(authed(Empty {}, &me.id))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.users.len(), 1);
        assert_eq!(resp.users[0].id, target.id);
    }

    #[tokio::test]
    async fn update_settings_is_partial() {
        let repo = test_service().await;
        let router = router();
        let me = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let svc = UserServiceImpl::new(repo, router);

        svc.update_settings(authed(
            UpdateSettingsRequest {
                notifications_enabled: Some(false),
                theme: None,
            },
            &me.id,
        ))
        .await
        .unwrap();

        let settings = svc
            .get_settings(authed(Empty {}, &me.id))
            .await
            .unwrap()
            .into_inner();
        assert!(!settings.notifications_enabled);
        assert_eq!(settings.theme, "dark");
    }
}
