//! `FriendService`: requests, accept/reject, blocking and live updates.
//!
//! `Friend` rows are one-directional (`user_id` -> `friend_id`); an accepted
//! friendship is represented as a pair of rows, one per direction, so each
//! side's `GetFriends` only ever has to filter its own `user_id`. All of the
//! `FriendActionRequest.friend_id` RPCs below take the *other user's id*,
//! not a `Friend` row id.

use std::pin::Pin;

use async_stream::stream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};

use crate::api::auth::user_id;
use crate::api::types::ApiError;
use crate::data::ChatRepository;
use crate::data::topics::TopicError;
use crate::domain::events::DomainEvent;
use crate::domain::publishers::topic;
use crate::domain::{Operation, ReactiveRouter};
use std::sync::Arc;

use super::convert::{friend_event_to_pb, friend_to_pb, friend_to_pb_read};
use super::pb::friend_service_server::FriendService as FriendServiceTrait;
use super::pb::{
    Friend, FriendActionRequest, FriendsResponse, SearchFriendsRequest, SendFriendRequestRequest,
    StreamFriendUpdatesRequest, UpdateAliasNameRequest,
};

pub struct FriendServiceImpl {
    repo: Arc<dyn ChatRepository>,
    router: Arc<ReactiveRouter>,
}

impl FriendServiceImpl {
    pub fn new(repo: Arc<dyn ChatRepository>, router: Arc<ReactiveRouter>) -> Self {
        Self { repo, router }
    }

    /// Ensure the reverse-direction row exists and is `accepted`, creating it
    /// if the other side never sent a request of its own.
    async fn ensure_reciprocal_accepted(&self, user_id: &str, friend_id: &str) -> Result<(), Status> {
        match self.repo.get_friend_pair(user_id, friend_id).await {
            Ok(row) => {
                if row.status != "accepted" {
                    self.repo
                        .update_friend_status(&row.id, "accepted", &self.router)
                        .await
                        .map_err(ApiError::from_data)?;
                }
            }
            Err(_) => {
                let row = self
                    .repo
                    .create_friend_request(user_id, friend_id, &self.router)
                    .await
                    .map_err(ApiError::from_data)?;
                self.repo
                    .update_friend_status(&row.id, "accepted", &self.router)
                    .await
                    .map_err(ApiError::from_data)?;
            }
        }
        Ok(())
    }
}

type FriendStream = Pin<Box<dyn Stream<Item = Result<Friend, Status>> + Send>>;

#[tonic::async_trait]
impl FriendServiceTrait for FriendServiceImpl {
    async fn send_friend_request(
        &self,
        request: Request<SendFriendRequestRequest>,
    ) -> Result<Response<Friend>, Status> {
        let caller = user_id(&request)?.to_string();
        let username = request.into_inner().username;

        let target = self
            .repo
            .get_user_by_username(&username)
            .await
            .map_err(ApiError::from_data)?;
        if target.id == caller {
            return Err(Status::invalid_argument("cannot friend yourself"));
        }
        if self.repo.get_friend_pair(&caller, &target.id).await.is_ok() {
            return Err(ApiError::conflict("ALREADY_REQUESTED", "A friend relationship already exists").into());
        }

        let row = self
            .repo
            .create_friend_request(&caller, &target.id, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(friend_to_pb_read(&row)))
    }

    async fn accept_friend_request(
        &self,
        request: Request<FriendActionRequest>,
    ) -> Result<Response<Friend>, Status> {
        let caller = user_id(&request)?.to_string();
        let other = request.into_inner().friend_id;

        let incoming = self
            .repo
            .get_friend_pair(&other, &caller)
            .await
            .map_err(ApiError::from_data)?;
        let row = self
            .repo
            .update_friend_status(&incoming.id, "accepted", &self.router)
            .await
            .map_err(ApiError::from_data)?;
        self.ensure_reciprocal_accepted(&caller, &other).await?;

        Ok(Response::new(friend_to_pb(&row, super::convert::op_to_pb(Operation::Update))))
    }

    async fn reject_friend_request(
        &self,
        request: Request<FriendActionRequest>,
    ) -> Result<Response<super::pb::Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let other = request.into_inner().friend_id;

        let incoming = self
            .repo
            .get_friend_pair(&other, &caller)
            .await
            .map_err(ApiError::from_data)?;
        self.repo
            .delete_friend(&incoming.id, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(super::pb::Empty {}))
    }

    async fn remove_friend(
        &self,
        request: Request<FriendActionRequest>,
    ) -> Result<Response<super::pb::Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let other = request.into_inner().friend_id;

        if let Ok(row) = self.repo.get_friend_pair(&caller, &other).await {
            self.repo.delete_friend(&row.id, &self.router).await.map_err(ApiError::from_data)?;
        }
        if let Ok(row) = self.repo.get_friend_pair(&other, &caller).await {
            self.repo.delete_friend(&row.id, &self.router).await.map_err(ApiError::from_data)?;
        }
        Ok(Response::new(super::pb::Empty {}))
    }

    async fn block_friend(
        &self,
        request: Request<FriendActionRequest>,
    ) -> Result<Response<Friend>, Status> {
        let caller = user_id(&request)?.to_string();
        let other = request.into_inner().friend_id;

        let row = match self.repo.get_friend_pair(&caller, &other).await {
            Ok(row) => self
                .repo
                .update_friend_status(&row.id, "blocked", &self.router)
                .await
                .map_err(ApiError::from_data)?,
            Err(_) => {
                let row = self
                    .repo
                    .create_friend_request(&caller, &other, &self.router)
                    .await
                    .map_err(ApiError::from_data)?;
                self.repo
                    .update_friend_status(&row.id, "blocked", &self.router)
                    .await
                    .map_err(ApiError::from_data)?
            }
        };
        Ok(Response::new(friend_to_pb(&row, super::convert::op_to_pb(Operation::Update))))
    }

    async fn unblock_friend(
        &self,
        request: Request<FriendActionRequest>,
    ) -> Result<Response<super::pb::Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let other = request.into_inner().friend_id;

        let row = self
            .repo
            .get_friend_pair(&caller, &other)
            .await
            .map_err(ApiError::from_data)?;
        self.repo.delete_friend(&row.id, &self.router).await.map_err(ApiError::from_data)?;
        Ok(Response::new(super::pb::Empty {}))
    }

    async fn update_alias_name(
        &self,
        request: Request<UpdateAliasNameRequest>,
    ) -> Result<Response<Friend>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();

        let existing = self
            .repo
            .get_friend_pair(&caller, &req.friend_id)
            .await
            .map_err(ApiError::from_data)?;
        let alias_name = if req.alias_name.is_empty() { None } else { Some(req.alias_name.as_str()) };
        let row = self
            .repo
            .update_friend_alias(&existing.id, alias_name, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(friend_to_pb(&row, super::convert::op_to_pb(Operation::Update))))
    }

    async fn get_friends(
        &self,
        request: Request<super::pb::Empty>,
    ) -> Result<Response<FriendsResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let rows = self.repo.list_friends(&caller, "accepted").await.map_err(ApiError::from_data)?;
        Ok(Response::new(FriendsResponse {
            friends: rows.iter().map(friend_to_pb_read).collect(),
        }))
    }

    async fn get_pending_requests(
        &self,
        request: Request<super::pb::Empty>,
    ) -> Result<Response<FriendsResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let rows = self
            .repo
            .list_incoming_friend_requests(&caller)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(FriendsResponse {
            friends: rows.iter().map(friend_to_pb_read).collect(),
        }))
    }

    async fn get_blocked_users(
        &self,
        request: Request<super::pb::Empty>,
    ) -> Result<Response<FriendsResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let rows = self.repo.list_friends(&caller, "blocked").await.map_err(ApiError::from_data)?;
        Ok(Response::new(FriendsResponse {
            friends: rows.iter().map(friend_to_pb_read).collect(),
        }))
    }

    async fn search_friends(
        &self,
        request: Request<SearchFriendsRequest>,
    ) -> Result<Response<FriendsResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let query = request.into_inner().query.to_lowercase();
        let rows = self.repo.list_friends(&caller, "accepted").await.map_err(ApiError::from_data)?;

        let mut matched = Vec::new();
        for row in rows {
            let friend_user = self.repo.get_user(&row.friend_id).await.map_err(ApiError::from_data)?;
            if friend_user.username.to_lowercase().contains(&query) {
                matched.push(friend_to_pb_read(&row));
            }
        }
        Ok(Response::new(FriendsResponse { friends: matched }))
    }

    type StreamFriendUpdatesStream = FriendStream;

    async fn stream_friend_updates(
        &self,
        request: Request<StreamFriendUpdatesRequest>,
    ) -> Result<Response<Self::StreamFriendUpdatesStream>, Status> {
        let caller = user_id(&request)?.to_string();
        let bus = self.router.bus().clone();
        let mut sub = bus.subscribe(topic::friend(&caller)).await;

        let output = stream! {
            loop {
                match sub.recv().await {
                    Ok(DomainEvent::Friend(event)) => yield Ok(friend_event_to_pb(&event)),
                    Ok(_) => continue,
                    Err(TopicError::Lagged(_)) => continue,
                    Err(TopicError::ChannelClosed) => break,
                }
            }
        };
        Ok(Response::new(Box::pin(output)))
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
    async fn accept_leaves_both_directions_accepted() {
        let repo = test_service().await;
        let router = router();
        let ada = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let bo = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let svc = FriendServiceImpl::new(repo.clone(), router);

        svc.send_friend_request(authed(SendFriendRequestRequest { username: "bo".into() }, &ada.id))
            .await
            .unwrap();
        svc.accept_friend_request(authed(FriendActionRequest { friend_id: ada.id.clone() }, &bo.id))
            .await
            .unwrap();

        let ada_side = repo.get_friend_pair(&ada.id, &bo.id).await.unwrap();
        let bo_side = repo.get_friend_pair(&bo.id, &ada.id).await.unwrap();
        assert_eq!(ada_side.status, "accepted");
        assert_eq!(bo_side.status, "accepted");
    }

    #[tokio::test]
    async fn get_pending_requests_lists_incoming_only() {
        let repo = test_service().await;
        let router = router();
        let ada = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let bo = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let svc = FriendServiceImpl::new(repo, router);

        svc.send_friend_request(authed(SendFriendRequestRequest { username: "bo".into() }, &ada.id))
            .await
            .unwrap();

        let ada_pending = svc
            .get_pending_requests(authed(super::super::pb::Empty {}, &ada.id))
            .await
            .unwrap()
            .into_inner();
        assert!(ada_pending.friends.is_empty(), "requester has no incoming request");

        let bo_pending = svc
            .get_pending_requests(authed(super::super::pb::Empty {}, &bo.id))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(bo_pending.friends.len(), 1);
        assert_eq!(bo_pending.friends[0].user_id, ada.id);
    }

    #[tokio::test]
    async fn cannot_friend_yourself() {
        let repo = test_service().await;
        let router = router();
        let ada = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let svc = FriendServiceImpl::new(repo, router);

        let err = svc
            .send_friend_request(authed(SendFriendRequestRequest { username: "ada".into() }, &ada.id))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
