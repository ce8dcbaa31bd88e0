//! Row -> wire-type conversions.
//!
//! Kept as free functions rather than `From` impls so a caller can pass the
//! `Operation` a mutation actually performed (insert/update/delete) rather
//! than `Unspecified`, which plain reads use.

use crate::data::types::{
    ChannelPermissionRow, ChannelRow, DirectMessageRow, FriendRow, FriendStatus, MessageRow,
    RoleRow, ServerMemberRow, ServerRow, UserProfileRow, UserRow, VoiceStateRow, unix_seconds,
};
use crate::domain::events::{DirectMessageEvent, FriendEvent, MessageEvent, Operation as DomainOp};

use super::pb;

pub fn op_to_pb(op: DomainOp) -> i32 {
    match op {
        DomainOp::Insert => pb::Operation::Insert as i32,
        DomainOp::Update => pb::Operation::Update as i32,
        DomainOp::Delete => pb::Operation::Delete as i32,
    }
}

const UNSPECIFIED: i32 = pb::Operation::Unspecified as i32;

pub fn friend_status_to_pb(status: FriendStatus) -> i32 {
    match status {
        FriendStatus::Pending => pb::FriendStatus::Pending as i32,
        FriendStatus::Accepted => pb::FriendStatus::Accepted as i32,
        FriendStatus::Rejected => pb::FriendStatus::Rejected as i32,
        FriendStatus::Blocked => pb::FriendStatus::Blocked as i32,
    }
}

pub fn user_to_pb(row: &UserRow) -> pb::User {
    pb::User {
        id: row.id.clone(),
        username: row.username.clone(),
        email: row.email.clone(),
        display_name: row.display_name.clone().unwrap_or_default(),
        avatar_url: row.avatar_url.clone().unwrap_or_default(),
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
    }
}

pub fn profile_to_pb(row: &UserProfileRow) -> pb::UserProfile {
    pb::UserProfile {
        user_id: row.user_id.clone(),
        status: row.status.clone(),
        custom_status: row.custom_status.clone().unwrap_or_default(),
        updated_at: unix_seconds(row.updated_at),
    }
}

pub fn settings_to_pb(row: &UserProfileRow) -> pb::UserSettings {
    pb::UserSettings {
        user_id: row.user_id.clone(),
        notifications_enabled: row.notifications_enabled,
        theme: row.theme.clone(),
    }
}

pub fn friend_to_pb(row: &FriendRow, op: i32) -> pb::Friend {
    let status = FriendStatus::parse(&row.status).unwrap_or(FriendStatus::Pending);
    pb::Friend {
        id: row.id.clone(),
        user_id: row.user_id.clone(),
        friend_id: row.friend_id.clone(),
        alias_name: row.alias_name.clone().unwrap_or_default(),
        status: friend_status_to_pb(status),
        is_favorite: row.is_favorite,
        is_muted: row.is_muted,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    }
}

pub fn friend_to_pb_read(row: &FriendRow) -> pb::Friend {
    friend_to_pb(row, UNSPECIFIED)
}

pub fn message_to_pb(row: &MessageRow, op: i32) -> pb::Message {
    pb::Message {
        id: row.id.clone(),
        channel_id: row.channel_id.clone(),
        author_id: row.author_id.clone(),
        content: row.content.clone(),
        reply_to_message_id: row.reply_to_message_id.clone(),
        is_pinned: row.is_pinned,
        is_edited: row.is_edited,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    }
}

pub fn message_to_pb_read(row: &MessageRow) -> pb::Message {
    message_to_pb(row, UNSPECIFIED)
}

pub fn friend_event_to_pb(event: &FriendEvent) -> pb::Friend {
    pb::Friend {
        id: event.id.clone(),
        user_id: event.user_id.clone(),
        friend_id: event.friend_id.clone(),
        alias_name: event.alias_name.clone(),
        status: friend_status_to_pb(event.status),
        is_favorite: event.is_favorite,
        is_muted: event.is_muted,
        created_at: event.created_at,
        updated_at: event.updated_at,
        operation: op_to_pb(event.operation),
    }
}

pub fn message_event_to_pb(event: &MessageEvent) -> pb::Message {
    pb::Message {
        id: event.id.clone(),
        channel_id: event.channel_id.clone(),
        author_id: event.author_id.clone(),
        content: event.content.clone(),
        reply_to_message_id: event.reply_to_message_id.clone(),
        is_pinned: event.is_pinned,
        is_edited: event.is_edited,
        created_at: event.created_at,
        updated_at: event.updated_at,
        operation: op_to_pb(event.operation),
    }
}

pub fn direct_message_event_to_pb(event: &DirectMessageEvent) -> pb::DirectMessage {
    pb::DirectMessage {
        id: event.id.clone(),
        sender_id: event.sender_id.clone(),
        recipient_id: event.recipient_id.clone(),
        content: event.content.clone(),
        is_pinned: event.is_pinned,
        is_edited: event.is_edited,
        created_at: event.created_at,
        updated_at: event.updated_at,
        operation: op_to_pb(event.operation),
    }
}

pub fn direct_message_to_pb(row: &DirectMessageRow, op: i32) -> pb::DirectMessage {
    pb::DirectMessage {
        id: row.id.clone(),
        sender_id: row.sender_id.clone(),
        recipient_id: row.recipient_id.clone(),
        content: row.content.clone(),
        is_pinned: row.is_pinned,
        is_edited: row.is_edited,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    }
}

pub fn direct_message_to_pb_read(row: &DirectMessageRow) -> pb::DirectMessage {
    direct_message_to_pb(row, UNSPECIFIED)
}

pub fn server_to_pb(row: &ServerRow, op: i32) -> pb::Server {
    pb::Server {
        id: row.id.clone(),
        owner_id: row.owner_id.clone(),
        name: row.name.clone(),
        icon_url: row.icon_url.clone().unwrap_or_default(),
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    }
}

pub fn server_to_pb_read(row: &ServerRow) -> pb::Server {
    server_to_pb(row, UNSPECIFIED)
}

pub fn channel_to_pb(row: &ChannelRow, op: i32) -> pb::Channel {
    pb::Channel {
        id: row.id.clone(),
        server_id: row.server_id.clone(),
        name: row.name.clone(),
        position: row.position,
        is_voice: row.is_voice,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    }
}

pub fn channel_to_pb_read(row: &ChannelRow) -> pb::Channel {
    channel_to_pb(row, UNSPECIFIED)
}

pub fn role_to_pb(row: &RoleRow, op: i32) -> pb::Role {
    pb::Role {
        id: row.id.clone(),
        server_id: row.server_id.clone(),
        name: row.name.clone(),
        level: row.level,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    }
}

pub fn channel_permission_to_pb(row: &ChannelPermissionRow, op: i32) -> pb::ChannelPermission {
    pb::ChannelPermission {
        id: row.id.clone(),
        channel_id: row.channel_id.clone(),
        role_id: row.role_id.clone(),
        allow_mask: row.allow_mask,
        deny_mask: row.deny_mask,
        operation: op,
    }
}

pub fn server_member_to_pb(row: &ServerMemberRow, op: i32) -> pb::ServerMember {
    pb::ServerMember {
        id: row.id.clone(),
        server_id: row.server_id.clone(),
        user_id: row.user_id.clone(),
        joined_at: unix_seconds(row.joined_at),
        operation: op,
    }
}

pub fn server_member_to_pb_read(row: &ServerMemberRow) -> pb::ServerMember {
    server_member_to_pb(row, UNSPECIFIED)
}

pub fn voice_state_to_pb(row: &VoiceStateRow, op: i32) -> pb::VoiceState {
    pb::VoiceState {
        channel_id: row.channel_id.clone(),
        user_id: row.user_id.clone(),
        self_mute: row.self_mute,
        self_deafen: row.self_deafen,
        server_mute: row.server_mute,
        server_deafen: row.server_deafen,
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    }
}

pub fn voice_state_to_pb_read(row: &VoiceStateRow) -> pb::VoiceState {
    voice_state_to_pb(row, UNSPECIFIED)
}
