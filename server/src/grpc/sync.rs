//! `SyncService`: delta-sync entry points for a reconnecting client.
//!
//! Thin translation layer over [`crate::domain::SyncEngine`] — every handler
//! pulls `since` out of the request, calls the matching engine method, and
//! maps the result onto its response message. `SyncTextChannels` is
//! `SyncChannels` filtered down to non-voice rows; the two RPCs exist
//! because a client's text and voice channel lists render in different
//! places and resync independently.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::api::auth::user_id;
use crate::api::types::ApiError;
use crate::domain::SyncEngine;

use super::convert::{
    channel_to_pb_read, friend_to_pb_read, message_to_pb_read, direct_message_to_pb_read,
    channel_permission_to_pb, profile_to_pb, server_to_pb_read, voice_state_to_pb,
};
use super::pb::sync_service_server::SyncService as SyncServiceTrait;
use super::pb::{
    Empty, SyncAllRequest, SyncAllResponse, SyncChannelsRequest, SyncChannelsResponse,
    SyncDirectMessagesRequest, SyncDirectMessagesResponse, SyncFriendsResponse, SyncMessagesRequest,
    SyncMessagesResponse, SyncPermissionsRequest, SyncPermissionsResponse, SyncRequest,
    SyncServersResponse, SyncUserProfileResponse, SyncVoiceChannelsRequest, SyncVoiceChannelsResponse,
};

pub struct SyncServiceImpl {
    engine: Arc<SyncEngine>,
}

impl SyncServiceImpl {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }
}

#[tonic::async_trait]
impl SyncServiceTrait for SyncServiceImpl {
    async fn sync_friends(
        &self,
        request: Request<SyncRequest>,
    ) -> Result<Response<SyncFriendsResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let since = request.into_inner().since;
        let sync = self.engine.sync_friends(&caller, since).await.map_err(ApiError::from_data)?;
        Ok(Response::new(SyncFriendsResponse {
            friends: sync.friends.iter().map(friend_to_pb_read).collect(),
            pending_requests: sync.pending_requests.iter().map(friend_to_pb_read).collect(),
            server_timestamp: sync.server_timestamp,
            is_synced: sync.is_synced,
            total_updates: sync.total_updates as i32,
        }))
    }

    async fn sync_messages(
        &self,
        request: Request<SyncMessagesRequest>,
    ) -> Result<Response<SyncMessagesResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .engine
            .sync_messages(&req.channel_id, req.since)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(SyncMessagesResponse {
            messages: page.rows.iter().map(message_to_pb_read).collect(),
            server_timestamp: page.server_timestamp,
            is_synced: page.is_synced,
            has_more: page.has_more,
            total_updates: page.total_count as i32,
        }))
    }

    async fn sync_direct_messages(
        &self,
        request: Request<SyncDirectMessagesRequest>,
    ) -> Result<Response<SyncDirectMessagesResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let req = request.into_inner();
        let page = self
            .engine
            .sync_direct_messages(&caller, req.since)
            .await
            .map_err(ApiError::from_data)?;
        let messages: Vec<_> = page
            .rows
            .iter()
            .filter(|row| row.sender_id == req.peer_id || row.recipient_id == req.peer_id)
            .map(direct_message_to_pb_read)
            .collect();
        Ok(Response::new(SyncDirectMessagesResponse {
            total_updates: messages.len() as i32,
            messages,
            server_timestamp: page.server_timestamp,
            is_synced: page.is_synced,
            has_more: page.has_more,
        }))
    }

    async fn sync_servers(
        &self,
        request: Request<SyncRequest>,
    ) -> Result<Response<SyncServersResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let since = request.into_inner().since;
        let page = self.engine.sync_servers(&caller, since).await.map_err(ApiError::from_data)?;
        Ok(Response::new(SyncServersResponse {
            servers: page.rows.iter().map(server_to_pb_read).collect(),
            server_timestamp: page.server_timestamp,
            is_synced: page.is_synced,
            total_updates: page.total_count as i32,
        }))
    }

    async fn sync_channels(
        &self,
        request: Request<SyncChannelsRequest>,
    ) -> Result<Response<SyncChannelsResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .engine
            .sync_channels(&req.server_id, req.since)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(SyncChannelsResponse {
            channels: page.rows.iter().map(channel_to_pb_read).collect(),
            server_timestamp: page.server_timestamp,
            is_synced: page.is_synced,
            total_updates: page.total_count as i32,
        }))
    }

    async fn sync_user_profile(
        &self,
        request: Request<Empty>,
    ) -> Result<Response<SyncUserProfileResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let sync = self.engine.sync_user_profile(&caller).await.map_err(ApiError::from_data)?;
        Ok(Response::new(SyncUserProfileResponse {
            profile: Some(profile_to_pb(&sync.profile)),
            server_timestamp: sync.server_timestamp,
            is_synced: sync.is_synced,
        }))
    }

    async fn sync_voice_channels(
        &self,
        request: Request<SyncVoiceChannelsRequest>,
    ) -> Result<Response<SyncVoiceChannelsResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .engine
            .sync_voice_channels(&req.server_id, req.since)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(SyncVoiceChannelsResponse {
            states: page
                .rows
                .iter()
                .map(|row| voice_state_to_pb(row, crate::domain::Operation::Update as i32))
                .collect(),
            server_timestamp: page.server_timestamp,
            is_synced: page.is_synced,
            total_updates: page.total_count as i32,
        }))
    }

    async fn sync_text_channels(
        &self,
        request: Request<SyncChannelsRequest>,
    ) -> Result<Response<SyncChannelsResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .engine
            .sync_channels(&req.server_id, req.since)
            .await
            .map_err(ApiError::from_data)?;
        let channels: Vec<_> = page
            .rows
            .iter()
            .filter(|row| !row.is_voice)
            .map(channel_to_pb_read)
            .collect();
        Ok(Response::new(SyncChannelsResponse {
            total_updates: channels.len() as i32,
            channels,
            server_timestamp: page.server_timestamp,
            is_synced: page.is_synced,
        }))
    }

    async fn sync_permissions(
        &self,
        request: Request<SyncPermissionsRequest>,
    ) -> Result<Response<SyncPermissionsResponse>, Status> {
        let req = request.into_inner();
        let page = self
            .engine
            .sync_permissions(&req.server_id, req.since)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(SyncPermissionsResponse {
            permissions: page
                .rows
                .iter()
                .map(|row| channel_permission_to_pb(row, crate::domain::Operation::Update as i32))
                .collect(),
            server_timestamp: page.server_timestamp,
            is_synced: page.is_synced,
            total_updates: page.total_count as i32,
        }))
    }

    async fn sync_all(
        &self,
        request: Request<SyncAllRequest>,
    ) -> Result<Response<SyncAllResponse>, Status> {
        let caller = user_id(&request)?.to_string();
        let since_by_class = request.into_inner().since_by_class;
        let sync = self.engine.sync_all(&caller, &since_by_class).await.map_err(ApiError::from_data)?;

        let friends = SyncFriendsResponse {
            friends: sync.friends.friends.iter().map(friend_to_pb_read).collect(),
            pending_requests: sync.friends.pending_requests.iter().map(friend_to_pb_read).collect(),
            server_timestamp: sync.friends.server_timestamp,
            is_synced: sync.friends.is_synced,
            total_updates: sync.friends.total_updates as i32,
        };
        let servers = SyncServersResponse {
            servers: sync.servers.rows.iter().map(server_to_pb_read).collect(),
            server_timestamp: sync.servers.server_timestamp,
            is_synced: sync.servers.is_synced,
            total_updates: sync.servers.total_count as i32,
        };
        let profile = SyncUserProfileResponse {
            profile: Some(profile_to_pb(&sync.profile.profile)),
            server_timestamp: sync.profile.server_timestamp,
            is_synced: sync.profile.is_synced,
        };

        Ok(Response::new(SyncAllResponse {
            friends: Some(friends),
            servers: Some(servers),
            profile: Some(profile),
            server_timestamp: sync.server_timestamp,
            is_synced: sync.is_synced,
            total_updates: sync.total_updates as i32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::SqliteService;
    use crate::data::ChatRepository;
    use crate::data::topics::TopicBus;

    fn authed<T>(body: T, user_id: &str) -> Request<T> {
        let mut request = Request::new(body);
        request.extensions_mut().insert(crate::api::auth::AuthContext::Session {
            user_id: user_id.to_string(),
        });
        request
    }

    #[tokio::test]
    async fn sync_text_channels_excludes_voice() {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA).execute(&pool).await.unwrap();
        let repo: std::sync::Arc<dyn ChatRepository> = std::sync::Arc::new(SqliteService::from_pool(pool));
        let router = std::sync::Arc::new(crate::domain::ReactiveRouter::new(std::sync::Arc::new(TopicBus::new())));

        let owner = repo.create_user("ada", "ada@example.com", "h", None, &router).await.unwrap();
        let server = repo.create_server(&owner.id, "home", &router).await.unwrap();
        repo.create_channel(&server.id, "general", false, &router).await.unwrap();
        repo.create_channel(&server.id, "voice-lounge", true, &router).await.unwrap();

        let engine = std::sync::Arc::new(SyncEngine::new(repo));
        let svc = SyncServiceImpl::new(engine);

        let resp = svc
            .sync_text_channels(authed(SyncChannelsRequest { server_id: server.id, since: 0 }, &owner.id))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.channels.len(), 1);
        assert_eq!(resp.channels[0].name, "general");
    }
}
