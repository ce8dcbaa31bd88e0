//! The domain event sum type (component E's output).
//!
//! The original service represented every reactive event as an untyped
//! `map[string]interface{}` bag, reflected into shape by each per-table
//! publisher. That is replaced here by one closed enum: every event on the
//! bus is a `DomainEvent`, and every streaming endpoint matches on its
//! variant instead of probing a map for keys that may or may not be there.

use crate::data::types::FriendStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct UserEvent {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct UserProfileEvent {
    pub user_id: String,
    pub status: String,
    pub custom_status: String,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct FriendEvent {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub alias_name: String,
    pub status: FriendStatus,
    pub is_favorite: bool,
    pub is_muted: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
    pub reply_to_message_id: Option<String>,
    pub is_pinned: bool,
    pub is_edited: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct DirectMessageEvent {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub is_pinned: bool,
    pub is_edited: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct MessageAttachmentEvent {
    pub id: String,
    pub message_id: String,
    pub channel_id: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct MessageReactionEvent {
    pub message_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub emoji: String,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct ServerEvent {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub icon_url: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub id: String,
    pub server_id: String,
    pub name: String,
    pub position: i32,
    pub is_voice: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct RoleEvent {
    pub id: String,
    pub server_id: String,
    pub name: String,
    pub level: i32,
    pub created_at: i64,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct ChannelPermissionEvent {
    pub id: String,
    pub channel_id: String,
    pub role_id: String,
    pub allow_mask: i64,
    pub deny_mask: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct ServerMemberEvent {
    pub id: String,
    pub server_id: String,
    pub user_id: String,
    pub is_banned: bool,
    pub joined_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct MemberRoleEvent {
    pub server_id: String,
    pub user_id: String,
    pub role_id: String,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct VoiceStateEvent {
    pub channel_id: String,
    pub user_id: String,
    pub self_mute: bool,
    pub self_deafen: bool,
    pub server_mute: bool,
    pub server_deafen: bool,
    pub updated_at: i64,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub enum DomainEvent {
    User(UserEvent),
    UserProfile(UserProfileEvent),
    Friend(FriendEvent),
    Message(MessageEvent),
    DirectMessage(DirectMessageEvent),
    MessageAttachment(MessageAttachmentEvent),
    MessageReaction(MessageReactionEvent),
    Server(ServerEvent),
    Channel(ChannelEvent),
    Role(RoleEvent),
    ChannelPermission(ChannelPermissionEvent),
    ServerMember(ServerMemberEvent),
    MemberRole(MemberRoleEvent),
    VoiceState(VoiceStateEvent),
}
