//! `DirectMessageService`: one-to-one messages and live typing.
//!
//! `SearchMessagesRequest` is shared with [`super::message`]; here its
//! `channel_id` field carries the conversation partner's user id rather than
//! a channel id, since a DM thread has no channel of its own.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status, Streaming};

use crate::api::auth::user_id;
use crate::api::types::ApiError;
use crate::data::ChatRepository;
use crate::domain::{Operation, ReactiveRouter};

use super::convert::{direct_message_to_pb, direct_message_to_pb_read};
use super::pb::direct_message_service_server::DirectMessageService as DirectMessageServiceTrait;
use super::pb::{
    BulkDeleteMessagesRequest, DeleteDirectMessageRequest, DirectMessage, DirectMessagesResponse,
    EditDirectMessageRequest, Empty, GetDirectMessagesRequest, SearchMessagesRequest,
    SendDirectMessageRequest, TypingEvent,
};
use super::typing::TypingBus;

pub struct DirectMessageServiceImpl {
    repo: Arc<dyn ChatRepository>,
    router: Arc<ReactiveRouter>,
    typing_bus: Arc<TypingBus>,
}

impl DirectMessageServiceImpl {
    pub fn new(repo: Arc<dyn ChatRepository>, router: Arc<ReactiveRouter>, typing_bus: Arc<TypingBus>) -> Self {
        Self {
            repo,
            router,
            typing_bus,
        }
    }
}

/// A DM typing topic has to be the same string regardless of who dials in
/// first, so sort the pair rather than keying off sender/recipient order.
fn dm_typing_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("dm:{a}:{b}")
    } else {
        format!("dm:{b}:{a}")
    }
}

type DirectMessageStream = Pin<Box<dyn Stream<Item = Result<DirectMessage, Status>> + Send>>;
type TypingStream = Pin<Box<dyn Stream<Item = Result<TypingEvent, Status>> + Send>>;

#[tonic::async_trait]
impl DirectMessageServiceTrait for DirectMessageServiceImpl {
    async fn send_message(
        &self,
        request: Request<SendDirectMessageRequest>,
    ) -> Result<Response<DirectMessage>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let row = self
            .repo
            .create_direct_message(&caller, &req.recipient_id, &req.content, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(direct_message_to_pb_read(&row)))
    }

    type GetMessagesStream = DirectMessageStream;

    async fn get_messages(
        &self,
        request: Request<GetDirectMessagesRequest>,
    ) -> Result<Response<Self::GetMessagesStream>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let peer = req.peer_id;

        let page = self
            .repo
            .sync_direct_messages(&caller, req.since)
            .await
            .map_err(ApiError::from_data)?;

        let output = stream! {
            for row in page.rows {
                if row.sender_id == peer || row.recipient_id == peer {
                    yield Ok(direct_message_to_pb_read(&row));
                }
            }
        };
        Ok(Response::new(Box::pin(output)))
    }

    async fn edit_message(
        &self,
        request: Request<EditDirectMessageRequest>,
    ) -> Result<Response<DirectMessage>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();

        let existing = self.repo.get_direct_message(&req.message_id).await.map_err(ApiError::from_data)?;
        if existing.sender_id != caller {
            return Err(Status::permission_denied("cannot edit another user's message"));
        }
        let row = self
            .repo
            .update_direct_message_content(&req.message_id, &req.content, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(direct_message_to_pb(&row, super::convert::op_to_pb(Operation::Update))))
    }

    async fn delete_message(
        &self,
        request: Request<DeleteDirectMessageRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();

        let existing = self.repo.get_direct_message(&req.message_id).await.map_err(ApiError::from_data)?;
        if existing.sender_id != caller {
            return Err(Status::permission_denied("cannot delete another user's message"));
        }
        self.repo.delete_direct_message(&req.message_id, &self.router).await.map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn pin_message(
        &self,
        request: Request<DeleteDirectMessageRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.repo
            .set_direct_message_pinned(&req.message_id, true, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn unpin_message(
        &self,
        request: Request<DeleteDirectMessageRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.repo
            .set_direct_message_pinned(&req.message_id, false, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn bulk_delete_messages(
        &self,
        request: Request<BulkDeleteMessagesRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        for id in &req.message_ids {
            self.repo.delete_direct_message(id, &self.router).await.map_err(ApiError::from_data)?;
        }
        Ok(Response::new(Empty {}))
    }

    async fn search_messages(
        &self,
        request: Request<SearchMessagesRequest>,
    ) -> Result<Response<DirectMessagesResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let rows = self
            .repo
            .search_direct_messages(&caller, &req.channel_id, &req.query, crate::core::constants::SYNC_MAX_GENERAL as i64)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(DirectMessagesResponse {
            messages: rows.iter().map(direct_message_to_pb_read).collect(),
        }))
    }

    type SendTypingStream = TypingStream;

    async fn send_typing(
        &self,
        request: Request<Streaming<TypingEvent>>,
    ) -> Result<Response<Self::SendTypingStream>, Status> {
        let caller = user_id(&request)?.to_string();
        let mut inbound = request.into_inner();

        // The relay topic is keyed by the (caller, peer) pair, which we only
        // learn from the first inbound event (`channel_id` carries the peer's
        // user id, see the module doc). No first event, no conversation to
        // relay into.
        let first = match inbound.next().await {
            Some(Ok(event)) => event,
            _ => {
                let empty: Self::SendTypingStream = Box::pin(tokio_stream::empty());
                return Ok(Response::new(empty));
            }
        };
        let key = dm_typing_key(&caller, &first.channel_id);

        let mut sub = self.typing_bus.subscribe(&key).await;
        self.typing_bus
            .publish(
                &key,
                TypingEvent {
                    channel_id: first.channel_id,
                    user_id: caller.clone(),
                },
            )
            .await;

        let typing_bus = self.typing_bus.clone();
        let publisher = caller.clone();
        tokio::spawn(async move {
            while let Some(Ok(event)) = inbound.next().await {
                let key = dm_typing_key(&publisher, &event.channel_id);
                typing_bus
                    .publish(
                        &key,
                        TypingEvent {
                            channel_id: event.channel_id,
                            user_id: publisher.clone(),
                        },
                    )
                    .await;
            }
        });

        let output = stream! {
            loop {
                match sub.recv().await {
                    Ok(event) if event.user_id != caller => yield Ok(event),
                    Ok(_) => continue,
                    Err(crate::data::topics::TopicError::Lagged(_)) => continue,
                    Err(crate::data::topics::TopicError::ChannelClosed) => break,
                }
            }
        };
        Ok(Response::new(Box::pin(output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::SqliteService;

    #[test]
    fn typing_key_is_order_independent() {
        assert_eq!(dm_typing_key("a", "b"), dm_typing_key("b", "a"));
    }

    async fn test_service() -> Arc<dyn ChatRepository> {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA).execute(&pool).await.unwrap();
        Arc::new(SqliteService::from_pool(pool)) as Arc<dyn ChatRepository>
    }

    fn authed<T>(body: T, user_id: &str) -> Request<T> {
        let mut request = Request::new(body);
        request.extensions_mut().insert(crate::api::auth::AuthContext::Session {
            user_id: user_id.to_string(),
        });
        request
    }

    fn router() -> Arc<ReactiveRouter> {
        Arc::new(ReactiveRouter::new(Arc::new(crate::data::topics::TopicBus::new())))
    }

    #[tokio::test]
    async fn edit_message_rejects_non_senders() {
        let repo = test_service().await;
        let router = router();
        let ada = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let bo = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let message = repo
            .create_direct_message(&ada.id, &bo.id, "hi", &router)
            .await
            .unwrap();

        let svc = DirectMessageServiceImpl::new(repo, router, Arc::new(TypingBus::new()));
        let err = svc
            .edit_message(authed(
                EditDirectMessageRequest {
                    message_id: message.id,
                    content: "edited".into(),
                },
                &bo.id,
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }
}
