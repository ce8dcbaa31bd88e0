//! Repository port (component I).
//!
//! One trait implemented by both backends (SQLite/PostgreSQL), mirrored after
//! the way the original kept a single `TransactionalRepository` surface over
//! two SQL engines. Every mutation method is responsible for calling the
//! matching `ReactiveRouter` method once its write has committed; callers
//! never invoke the router directly.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{
    ChannelPermissionRow, ChannelRow, DirectMessageRow, FriendRow, MemberRoleRow,
    MessageAttachmentRow, MessageReactionRow, MessageRow, RoleRow, ServerMemberRow, ServerRow,
    UserProfileRow, UserRow, VoiceStateRow,
};
use crate::domain::router::ReactiveRouter;

/// A page of rows returned from a delta-sync query, alongside the bookkeeping
/// a reconnecting client needs to decide whether it is caught up.
#[derive(Debug, Clone)]
pub struct SyncPage<T> {
    pub rows: Vec<T>,
    pub server_timestamp: i64,
    pub is_synced: bool,
    pub has_more: bool,
    pub total_count: i64,
}

pub const SYNC_CEILING_MESSAGES: i64 = 100;
pub const SYNC_CEILING_DIRECT_MESSAGES: i64 = 50;
pub const SYNC_CEILING_GENERAL: i64 = 100;

#[async_trait]
pub trait ChatRepository: Send + Sync {
    // ---- users -------------------------------------------------------
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<UserRow, DataError>;

    async fn get_user(&self, id: &str) -> Result<UserRow, DataError>;
    async fn get_user_by_username(&self, username: &str) -> Result<UserRow, DataError>;
    async fn get_user_by_email(&self, email: &str) -> Result<UserRow, DataError>;

    async fn update_user(
        &self,
        id: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<UserRow, DataError>;

    async fn delete_user(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError>;

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<(), DataError>;

    async fn set_totp(&self, id: &str, secret: Option<&str>, enabled: bool) -> Result<(), DataError>;

    // ---- user profiles -------------------------------------------------
    async fn get_user_profile(&self, user_id: &str) -> Result<UserProfileRow, DataError>;

    async fn upsert_user_profile(
        &self,
        user_id: &str,
        status: &str,
        custom_status: Option<&str>,
        friend_user_ids: &[String],
        router: &ReactiveRouter,
    ) -> Result<UserProfileRow, DataError>;

    async fn update_user_settings(
        &self,
        user_id: &str,
        notifications_enabled: Option<bool>,
        theme: Option<&str>,
    ) -> Result<UserProfileRow, DataError>;

    // ---- friends ---------------------------------------------------------
    async fn create_friend_request(
        &self,
        user_id: &str,
        friend_id: &str,
        router: &ReactiveRouter,
    ) -> Result<FriendRow, DataError>;

    async fn update_friend_status(
        &self,
        id: &str,
        status: &str,
        router: &ReactiveRouter,
    ) -> Result<FriendRow, DataError>;

    async fn update_friend_alias(
        &self,
        id: &str,
        alias_name: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<FriendRow, DataError>;

    async fn delete_friend(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError>;

    async fn get_friend(&self, id: &str) -> Result<FriendRow, DataError>;
    async fn get_friend_pair(&self, user_id: &str, friend_id: &str) -> Result<FriendRow, DataError>;
    async fn list_friends(&self, user_id: &str, status: &str) -> Result<Vec<FriendRow>, DataError>;
    async fn count_pending_requests(&self, user_id: &str) -> Result<i64, DataError>;

    /// Pending requests sent *to* `user_id` (as opposed to `list_friends`,
    /// which is always scoped to rows `user_id` itself created).
    async fn list_incoming_friend_requests(&self, user_id: &str) -> Result<Vec<FriendRow>, DataError>;

    async fn sync_friends(&self, user_id: &str, since_t: i64) -> Result<SyncPage<FriendRow>, DataError>;

    // ---- messages ----------------------------------------------------
    async fn create_message(
        &self,
        channel_id: &str,
        author_id: &str,
        content: &str,
        reply_to_message_id: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<MessageRow, DataError>;

    async fn get_message(&self, id: &str) -> Result<MessageRow, DataError>;

    async fn update_message_content(
        &self,
        id: &str,
        content: &str,
        router: &ReactiveRouter,
    ) -> Result<MessageRow, DataError>;

    async fn set_message_pinned(
        &self,
        id: &str,
        pinned: bool,
        router: &ReactiveRouter,
    ) -> Result<MessageRow, DataError>;

    async fn delete_message(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError>;

    async fn list_messages(
        &self,
        channel_id: &str,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MessageRow>, DataError>;

    async fn list_pinned_messages(&self, channel_id: &str) -> Result<Vec<MessageRow>, DataError>;

    async fn search_messages(
        &self,
        channel_id: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<MessageRow>, DataError>;

    async fn sync_messages(
        &self,
        channel_id: &str,
        since_t: i64,
    ) -> Result<SyncPage<MessageRow>, DataError>;

    // ---- message attachments / reactions ------------------------------
    async fn add_message_attachment(
        &self,
        message_id: &str,
        channel_id: &str,
        url: &str,
        content_type: Option<&str>,
        size_bytes: i64,
        router: &ReactiveRouter,
    ) -> Result<MessageAttachmentRow, DataError>;

    async fn list_message_attachments(&self, message_id: &str) -> Result<Vec<MessageAttachmentRow>, DataError>;

    async fn add_message_reaction(
        &self,
        message_id: &str,
        channel_id: &str,
        user_id: &str,
        emoji: &str,
        router: &ReactiveRouter,
    ) -> Result<MessageReactionRow, DataError>;

    async fn remove_message_reaction(
        &self,
        message_id: &str,
        channel_id: &str,
        user_id: &str,
        emoji: &str,
        router: &ReactiveRouter,
    ) -> Result<(), DataError>;

    async fn list_message_reactions(&self, message_id: &str) -> Result<Vec<MessageReactionRow>, DataError>;

    // ---- direct messages -----------------------------------------------
    async fn create_direct_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
        router: &ReactiveRouter,
    ) -> Result<DirectMessageRow, DataError>;

    async fn get_direct_message(&self, id: &str) -> Result<DirectMessageRow, DataError>;

    async fn update_direct_message_content(
        &self,
        id: &str,
        content: &str,
        router: &ReactiveRouter,
    ) -> Result<DirectMessageRow, DataError>;

    async fn set_direct_message_pinned(
        &self,
        id: &str,
        pinned: bool,
        router: &ReactiveRouter,
    ) -> Result<DirectMessageRow, DataError>;

    async fn delete_direct_message(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError>;

    async fn list_direct_messages(
        &self,
        user_id: &str,
        other_user_id: &str,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<DirectMessageRow>, DataError>;

    async fn search_direct_messages(
        &self,
        user_id: &str,
        other_user_id: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<DirectMessageRow>, DataError>;

    async fn sync_direct_messages(
        &self,
        user_id: &str,
        since_t: i64,
    ) -> Result<SyncPage<DirectMessageRow>, DataError>;

    // ---- servers / channels / roles ------------------------------------
    async fn create_server(
        &self,
        owner_id: &str,
        name: &str,
        router: &ReactiveRouter,
    ) -> Result<ServerRow, DataError>;

    async fn get_server(&self, id: &str) -> Result<ServerRow, DataError>;

    async fn update_server(
        &self,
        id: &str,
        name: Option<&str>,
        icon_url: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<ServerRow, DataError>;

    async fn delete_server(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError>;

    async fn sync_servers(&self, user_id: &str, since_t: i64) -> Result<SyncPage<ServerRow>, DataError>;

    async fn create_channel(
        &self,
        server_id: &str,
        name: &str,
        is_voice: bool,
        router: &ReactiveRouter,
    ) -> Result<ChannelRow, DataError>;

    async fn get_channel(&self, id: &str) -> Result<ChannelRow, DataError>;

    async fn sync_channels(&self, server_id: &str, since_t: i64) -> Result<SyncPage<ChannelRow>, DataError>;

    async fn create_role(
        &self,
        server_id: &str,
        name: &str,
        level: i32,
        router: &ReactiveRouter,
    ) -> Result<RoleRow, DataError>;

    async fn get_role(&self, id: &str) -> Result<RoleRow, DataError>;

    async fn sync_permissions(
        &self,
        server_id: &str,
        since_t: i64,
    ) -> Result<SyncPage<ChannelPermissionRow>, DataError>;

    async fn set_channel_permission(
        &self,
        channel_id: &str,
        role_id: &str,
        allow_mask: i64,
        deny_mask: i64,
        router: &ReactiveRouter,
    ) -> Result<ChannelPermissionRow, DataError>;

    async fn add_server_member(
        &self,
        server_id: &str,
        user_id: &str,
        router: &ReactiveRouter,
    ) -> Result<ServerMemberRow, DataError>;

    async fn set_server_member_banned(
        &self,
        server_id: &str,
        user_id: &str,
        banned: bool,
        router: &ReactiveRouter,
    ) -> Result<ServerMemberRow, DataError>;

    async fn list_server_members(&self, server_id: &str) -> Result<Vec<ServerMemberRow>, DataError>;

    async fn assign_member_role(
        &self,
        server_id: &str,
        user_id: &str,
        role_id: &str,
        router: &ReactiveRouter,
    ) -> Result<MemberRoleRow, DataError>;

    async fn highest_role_level(&self, server_id: &str, user_id: &str) -> Result<i32, DataError>;

    // ---- voice -----------------------------------------------------------
    async fn upsert_voice_state(
        &self,
        channel_id: &str,
        user_id: &str,
        self_mute: bool,
        self_deafen: bool,
        server_mute: bool,
        server_deafen: bool,
        router: &ReactiveRouter,
    ) -> Result<VoiceStateRow, DataError>;

    async fn remove_voice_state(
        &self,
        channel_id: &str,
        user_id: &str,
        router: &ReactiveRouter,
    ) -> Result<(), DataError>;

    async fn sync_voice_channels(
        &self,
        server_id: &str,
        since_t: i64,
    ) -> Result<SyncPage<VoiceStateRow>, DataError>;

    /// Current server timestamp, monotonic across calls (component H).
    fn server_timestamp(&self) -> i64;
}
