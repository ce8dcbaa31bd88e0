//! `MessageService`: channel messages, pins, reactions and typing.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use tokio_stream::Stream;
use tonic::{Request, Response, Status};

use crate::api::auth::{user_id, AuthContext, AuthService as AuthzService};
use crate::api::types::ApiError;
use crate::data::ChatRepository;
use crate::domain::ReactiveRouter;

use super::convert::{message_to_pb, message_to_pb_read};
use super::pb::message_service_server::MessageService as MessageServiceTrait;
use super::pb::{
    AddAttachmentRequest, AddReactionRequest, Attachment, AttachmentsResponse,
    BulkDeleteMessagesRequest, DeleteMessageRequest, EditMessageRequest, Empty,
    GetMessageRequest, GetMessagesRequest, Message, PinMessageRequest, PinnedMessagesResponse,
    Reaction, ReactionsResponse, RemoveReactionRequest, SearchMessagesRequest, MessagesResponse,
    TypingEvent,
};
use super::typing::TypingBus;

pub struct MessageServiceImpl {
    repo: Arc<dyn ChatRepository>,
    router: Arc<ReactiveRouter>,
    authz: AuthzService,
    typing_bus: Arc<TypingBus>,
}

impl MessageServiceImpl {
    pub fn new(
        repo: Arc<dyn ChatRepository>,
        router: Arc<ReactiveRouter>,
        authz: AuthzService,
        typing_bus: Arc<TypingBus>,
    ) -> Self {
        Self {
            repo,
            router,
            authz,
            typing_bus,
        }
    }

    async fn require_channel_access(&self, caller: &str, channel_id: &str) -> Result<(), Status> {
        let channel = self.repo.get_channel(channel_id).await.map_err(ApiError::from_data)?;
        self.authz
            .verify_server_access(
                &AuthContext::Session {
                    user_id: caller.to_string(),
                },
                &channel.server_id,
            )
            .await
            .map_err(Status::from)?;
        Ok(())
    }
}

type MessageStream = Pin<Box<dyn Stream<Item = Result<Message, Status>> + Send>>;

#[tonic::async_trait]
impl MessageServiceTrait for MessageServiceImpl {
    async fn send_message(
        &self,
        request: Request<super::pb::SendMessageRequest>,
    ) -> Result<Response<Message>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.require_channel_access(&caller, &req.channel_id).await?;

        let row = self
            .repo
            .create_message(
                &req.channel_id,
                &caller,
                &req.content,
                req.reply_to_message_id.as_deref(),
                &self.router,
            )
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(message_to_pb_read(&row)))
    }

    type GetMessagesStream = MessageStream;

    async fn get_messages(
        &self,
        request: Request<GetMessagesRequest>,
    ) -> Result<Response<Self::GetMessagesStream>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.require_channel_access(&caller, &req.channel_id).await?;

        let page = self
            .repo
            .sync_messages(&req.channel_id, req.since)
            .await
            .map_err(ApiError::from_data)?;

        let output = stream! {
            for row in page.rows {
                yield Ok(message_to_pb_read(&row));
            }
        };
        Ok(Response::new(Box::pin(output)))
    }

    async fn get_message(
        &self,
        request: Request<GetMessageRequest>,
    ) -> Result<Response<Message>, Status> {
        let req = request.into_inner();
        let row = self.repo.get_message(&req.message_id).await.map_err(ApiError::from_data)?;
        Ok(Response::new(message_to_pb_read(&row)))
    }

    async fn edit_message(
        &self,
        request: Request<EditMessageRequest>,
    ) -> Result<Response<Message>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();

        let existing = self.repo.get_message(&req.message_id).await.map_err(ApiError::from_data)?;
        if existing.author_id != caller {
            return Err(Status::permission_denied("cannot edit another user's message"));
        }
        let row = self
            .repo
            .update_message_content(&req.message_id, &req.content, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(message_to_pb(&row, super::convert::op_to_pb(crate::domain::Operation::Update))))
    }

    async fn delete_message(
        &self,
        request: Request<DeleteMessageRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();

        let existing = self.repo.get_message(&req.message_id).await.map_err(ApiError::from_data)?;
        if existing.author_id != caller {
            self.require_channel_access(&caller, &existing.channel_id).await?;
            self.authz
                .verify_server_role(
                    &AuthContext::Session { user_id: caller.clone() },
                    &self.repo.get_channel(&existing.channel_id).await.map_err(ApiError::from_data)?.server_id,
                    1,
                )
                .await
                .map_err(Status::from)?;
        }
        self.repo.delete_message(&req.message_id, &self.router).await.map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn bulk_delete_messages(
        &self,
        request: Request<BulkDeleteMessagesRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        for id in &req.message_ids {
            self.repo.delete_message(id, &self.router).await.map_err(ApiError::from_data)?;
        }
        Ok(Response::new(Empty {}))
    }

    async fn pin_message(
        &self,
        request: Request<PinMessageRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.repo
            .set_message_pinned(&req.message_id, true, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn unpin_message(
        &self,
        request: Request<PinMessageRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.repo
            .set_message_pinned(&req.message_id, false, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn get_pinned_messages(
        &self,
        request: Request<GetMessagesRequest>,
    ) -> Result<Response<PinnedMessagesResponse>, Status> {
        let req = request.into_inner();
        let rows = self.repo.list_pinned_messages(&req.channel_id).await.map_err(ApiError::from_data)?;
        Ok(Response::new(PinnedMessagesResponse {
            messages: rows.iter().map(message_to_pb_read).collect(),
        }))
    }

    async fn add_reaction(
        &self,
        request: Request<AddReactionRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let message = self.repo.get_message(&req.message_id).await.map_err(ApiError::from_data)?;
        self.repo
            .add_message_reaction(&req.message_id, &message.channel_id, &caller, &req.emoji, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn remove_reaction(
        &self,
        request: Request<RemoveReactionRequest>,
    ) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let message = self.repo.get_message(&req.message_id).await.map_err(ApiError::from_data)?;
        self.repo
            .remove_message_reaction(&req.message_id, &message.channel_id, &caller, &req.emoji, &self.router)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn get_reactions(
        &self,
        request: Request<GetMessageRequest>,
    ) -> Result<Response<ReactionsResponse>, Status> {
        let req = request.into_inner();
        let rows = self.repo.list_message_reactions(&req.message_id).await.map_err(ApiError::from_data)?;
        Ok(Response::new(ReactionsResponse {
            reactions: rows
                .into_iter()
                .map(|r| Reaction {
                    message_id: r.message_id,
                    user_id: r.user_id,
                    emoji: r.emoji,
                })
                .collect(),
        }))
    }

    async fn add_attachment(
        &self,
        request: Request<AddAttachmentRequest>,
    ) -> Result<Response<Attachment>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let message = self.repo.get_message(&req.message_id).await.map_err(ApiError::from_data)?;
        self.require_channel_access(&caller, &message.channel_id).await?;
        let row = self
            .repo
            .add_message_attachment(
                &req.message_id,
                &message.channel_id,
                &req.url,
                req.content_type.as_deref(),
                req.size_bytes,
                &self.router,
            )
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Attachment {
            id: row.id,
            message_id: row.message_id,
            url: row.url,
            content_type: row.content_type.unwrap_or_default(),
            size_bytes: row.size_bytes,
            operation: super::pb::Operation::Insert as i32,
        }))
    }

    async fn get_attachments(
        &self,
        request: Request<GetMessageRequest>,
    ) -> Result<Response<AttachmentsResponse>, Status> {
        let req = request.into_inner();
        let rows = self.repo.list_message_attachments(&req.message_id).await.map_err(ApiError::from_data)?;
        Ok(Response::new(AttachmentsResponse {
            attachments: rows
                .into_iter()
                .map(|r| Attachment {
                    id: r.id,
                    message_id: r.message_id,
                    url: r.url,
                    content_type: r.content_type.unwrap_or_default(),
                    size_bytes: r.size_bytes,
                    operation: super::pb::Operation::Unspecified as i32,
                })
                .collect(),
        }))
    }

    async fn send_typing(&self, request: Request<TypingEvent>) -> Result<Response<Empty>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        self.typing_bus
            .publish(
                &req.channel_id,
                TypingEvent {
                    channel_id: req.channel_id.clone(),
                    user_id: caller,
                },
            )
            .await;
        Ok(Response::new(Empty {}))
    }

    async fn search_messages(
        &self,
        request: Request<SearchMessagesRequest>,
    ) -> Result<Response<MessagesResponse>, Status> {
        let req = request.into_inner();
        let rows = self
            .repo
            .search_messages(&req.channel_id, &req.query, crate::core::constants::SYNC_MAX_GENERAL as i64)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(MessagesResponse {
            messages: rows.iter().map(message_to_pb_read).collect(),
        }))
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
    async fn send_message_rejects_non_members() {
        let db = test_db().await;
        let repo = db.repository();
        let router = router();
        let owner = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let outsider = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let server = repo.create_server(&owner.id, "home", &router).await.unwrap();
        repo.add_server_member(&server.id, &owner.id, &router).await.unwrap();
        let channel = repo.create_channel(&server.id, "general", false, &router).await.unwrap();

        let authz = AuthzServiceImpl::new(db.clone());
        let svc = MessageServiceImpl::new(repo, router, authz, Arc::new(TypingBus::new()));

        let err = svc
            .send_message(authed(
                super::super::pb::SendMessageRequest {
                    channel_id: channel.id,
                    content: "hi".into(),
                    reply_to_message_id: None,
                },
                &outsider.id,
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn edit_message_rejects_non_authors() {
        let db = test_db().await;
        let repo = db.repository();
        let router = router();
        let owner = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let other = repo.create_user("bo", "bo@example.com", "h", None, &router).await.unwrap();
        let server = repo.create_server(&owner.id, "home", &router).await.unwrap();
        repo.add_server_member(&server.id, &owner.id, &router).await.unwrap();
        repo.add_server_member(&server.id, &other.id, &router).await.unwrap();
        let channel = repo.create_channel(&server.id, "general", false, &router).await.unwrap();
        let message = repo
            .create_message(&channel.id, &owner.id, "hi", None, &router)
            .await
            .unwrap();

        let authz = AuthzServiceImpl::new(db.clone());
        let svc = MessageServiceImpl::new(repo, router, authz, Arc::new(TypingBus::new()));

        let err = svc
            .edit_message(authed(
                EditMessageRequest {
                    message_id: message.id,
                    content: "edited".into(),
                },
                &other.id,
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::PermissionDenied);
    }

    #[tokio::test]
    async fn add_attachment_then_get_attachments_round_trips() {
        let db = test_db().await;
        let repo = db.repository();
        let router = router();
        let owner = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let server = repo.create_server(&owner.id, "home", &router).await.unwrap();
        repo.add_server_member(&server.id, &owner.id, &router).await.unwrap();
        let channel = repo.create_channel(&server.id, "general", false, &router).await.unwrap();
        let message = repo
            .create_message(&channel.id, &owner.id, "hi", None, &router)
            .await
            .unwrap();

        let authz = AuthzServiceImpl::new(db.clone());
        let svc = MessageServiceImpl::new(repo, router, authz, Arc::new(TypingBus::new()));

        let attachment = svc
            .add_attachment(authed(
                AddAttachmentRequest {
                    message_id: message.id.clone(),
                    url: "https://files.example.com/a.png".into(),
                    content_type: Some("image/png".into()),
                    size_bytes: 1024,
                },
                &owner.id,
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(attachment.content_type, "image/png");

        let attachments = svc
            .get_attachments(Request::new(GetMessageRequest {
                message_id: message.id,
            }))
            .await
            .unwrap()
            .into_inner()
            .attachments;
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].url, "https://files.example.com/a.png");
    }
}
