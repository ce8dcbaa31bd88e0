//! Delta-sync engine (component G).
//!
//! One entry point per entity class, each returning `{rows, serverT,
//! isSynced, totalUpdates}` (plus `hasMore` for the classes with a client
//! that can page). `isSynced` additionally requires any secondary collection
//! (pending friend requests) to be empty, not just the primary page. Ceilings
//! are enforced at the repository query layer; this module only decides
//! whether the ceiling was hit.

use std::collections::HashMap;
use std::sync::Arc;

use crate::data::error::DataError;
use crate::data::traits::{ChatRepository, SyncPage};
use crate::data::types::{ChannelRow, FriendRow, ServerRow, UserProfileRow};

#[derive(Debug, Clone)]
pub struct FriendsSync {
    pub friends: Vec<FriendRow>,
    pub pending_requests: Vec<FriendRow>,
    pub server_timestamp: i64,
    pub is_synced: bool,
    pub total_updates: i64,
}

#[derive(Debug, Clone)]
pub struct ProfileSync {
    pub profile: UserProfileRow,
    pub server_timestamp: i64,
    pub is_synced: bool,
}

#[derive(Debug, Clone)]
pub struct SyncAllResult {
    pub friends: FriendsSync,
    pub servers: SyncPage<ServerRow>,
    pub profile: ProfileSync,
    pub server_timestamp: i64,
    pub is_synced: bool,
    pub total_updates: i64,
}

pub struct SyncEngine {
    repo: Arc<dyn ChatRepository>,
}

impl SyncEngine {
    pub fn new(repo: Arc<dyn ChatRepository>) -> Self {
        Self { repo }
    }

    pub async fn sync_friends(&self, user_id: &str, since: i64) -> Result<FriendsSync, DataError> {
        let page = self.repo.sync_friends(user_id, since).await?;
        let pending = self.repo.list_friends(user_id, "pending").await?;
        let is_synced = page.is_synced && pending.is_empty();
        Ok(FriendsSync {
            total_updates: page.total_count,
            friends: page.rows,
            pending_requests: pending,
            server_timestamp: page.server_timestamp,
            is_synced,
        })
    }

    pub async fn sync_messages(
        &self,
        channel_id: &str,
        since: i64,
    ) -> Result<SyncPage<crate::data::types::MessageRow>, DataError> {
        self.repo.sync_messages(channel_id, since).await
    }

    pub async fn sync_direct_messages(
        &self,
        user_id: &str,
        since: i64,
    ) -> Result<SyncPage<crate::data::types::DirectMessageRow>, DataError> {
        self.repo.sync_direct_messages(user_id, since).await
    }

    pub async fn sync_servers(&self, user_id: &str, since: i64) -> Result<SyncPage<ServerRow>, DataError> {
        self.repo.sync_servers(user_id, since).await
    }

    pub async fn sync_channels(&self, server_id: &str, since: i64) -> Result<SyncPage<ChannelRow>, DataError> {
        self.repo.sync_channels(server_id, since).await
    }

    pub async fn sync_voice_channels(
        &self,
        server_id: &str,
        since: i64,
    ) -> Result<SyncPage<crate::data::types::VoiceStateRow>, DataError> {
        self.repo.sync_voice_channels(server_id, since).await
    }

    pub async fn sync_permissions(
        &self,
        server_id: &str,
        since: i64,
    ) -> Result<SyncPage<crate::data::types::ChannelPermissionRow>, DataError> {
        self.repo.sync_permissions(server_id, since).await
    }

    pub async fn sync_user_profile(&self, user_id: &str) -> Result<ProfileSync, DataError> {
        let profile = self.repo.get_user_profile(user_id).await?;
        Ok(ProfileSync {
            server_timestamp: self.repo.server_timestamp(),
            is_synced: true,
            profile,
        })
    }

    /// `syncAll.totalUpdates` sums every numeric-class count it aggregates
    /// (friends + servers), not just the first class, since a reconnecting
    /// client gets strictly more value from the superset than from an
    /// arbitrary single class.
    ///
    /// `since_by_class` carries one watermark per entity class (`"friends"`,
    /// `"servers"`), so a client can be caught up on one class and far behind
    /// on another in the same call. A class missing from the map syncs from 0.
    pub async fn sync_all(
        &self,
        user_id: &str,
        since_by_class: &HashMap<String, i64>,
    ) -> Result<SyncAllResult, DataError> {
        let friends_since = since_by_class.get("friends").copied().unwrap_or(0);
        let servers_since = since_by_class.get("servers").copied().unwrap_or(0);

        let friends = self.sync_friends(user_id, friends_since).await?;
        let servers = self.sync_servers(user_id, servers_since).await?;
        let profile = self.sync_user_profile(user_id).await?;

        let is_synced = friends.is_synced && servers.is_synced && profile.is_synced;
        let total_updates = friends.total_updates + servers.total_count;

        Ok(SyncAllResult {
            server_timestamp: self.repo.server_timestamp(),
            is_synced,
            total_updates,
            friends,
            servers,
            profile,
        })
    }
}
