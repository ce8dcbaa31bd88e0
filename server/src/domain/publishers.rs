//! Per-entity publishers (component E).
//!
//! Each function here takes an already-typed row (the scan already
//! succeeded — sqlx would have errored before we got this far, which is why
//! there is no separate "row scan failed" case to handle: Rust's static
//! typing collapses that failure mode into the repository call's own
//! `Result`), projects it onto the external event schema, and publishes it
//! under the entity's topic key(s). A publisher never returns an error to its
//! caller: a transformation that cannot be completed is logged and the event
//! is dropped, per the spec's failure policy — a mutation always commits
//! regardless of what the bus does with it afterward.

use std::sync::Arc;

use crate::data::topics::TopicBus;
use crate::data::types::{
    ChannelPermissionRow, ChannelRow, FriendRow, FriendStatus, MemberRoleRow, MessageAttachmentRow,
    MessageReactionRow, MessageRow, RoleRow, ServerMemberRow, ServerRow, UserProfileRow, UserRow,
    VoiceStateRow, unix_seconds,
};

use super::events::{
    ChannelEvent, ChannelPermissionEvent, DirectMessageEvent, DomainEvent, FriendEvent,
    MemberRoleEvent, MessageAttachmentEvent, MessageEvent, MessageReactionEvent, Operation,
    RoleEvent, ServerEvent, ServerMemberEvent, UserEvent, UserProfileEvent, VoiceStateEvent,
};
use crate::data::types::DirectMessageRow;

pub mod topic {
    pub fn user(id: &str) -> String {
        format!("user:{id}")
    }
    pub fn friend(id: &str) -> String {
        format!("friend:{id}")
    }
    /// Personal-request fan-out: a profile update is also broadcast to every
    /// friend of the changed user, under this key.
    pub fn friend_profile(friend_user_id: &str) -> String {
        format!("friend_pr:{friend_user_id}")
    }
    pub fn message(channel_id: &str) -> String {
        format!("message:{channel_id}")
    }
    pub fn direct_message(user_id: &str) -> String {
        format!("dm:{user_id}")
    }
    pub fn server(id: &str) -> String {
        format!("server:{id}")
    }
    pub fn channel(channel_id: &str) -> String {
        format!("channel:{channel_id}")
    }
    pub fn role(role_id: &str) -> String {
        format!("role:{role_id}")
    }
    pub fn channel_permission(channel_id: &str) -> String {
        format!("channel_permission:{channel_id}")
    }
    pub fn server_member(server_id: &str) -> String {
        format!("server_member:{server_id}")
    }
    pub fn member_role(member_id: &str) -> String {
        format!("member_role:{member_id}")
    }
    pub fn message_attachment(message_id: &str) -> String {
        format!("message_attachment:{message_id}")
    }
    pub fn message_reaction(message_id: &str) -> String {
        format!("message_reaction:{message_id}")
    }
    pub fn voice(channel_id: &str) -> String {
        format!("voice:{channel_id}")
    }
}

async fn publish_to(bus: &TopicBus<DomainEvent>, topics: &[String], event: DomainEvent) {
    for t in topics {
        bus.publish(t, event.clone()).await;
    }
}

pub async fn publish_user(bus: &Arc<TopicBus<DomainEvent>>, row: &UserRow, op: Operation) {
    let event = DomainEvent::User(UserEvent {
        id: row.id.clone(),
        username: row.username.clone(),
        email: row.email.clone(),
        display_name: row.display_name.clone().unwrap_or_default(),
        avatar_url: row.avatar_url.clone().unwrap_or_default(),
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    });
    publish_to(bus, &[topic::user(&row.id)], event).await;
}

/// Profile updates additionally fan out to every friend's personal topic so a
/// friends list can update presence without a separate poll.
pub async fn publish_user_profile(
    bus: &Arc<TopicBus<DomainEvent>>,
    row: &UserProfileRow,
    friend_user_ids: &[String],
    op: Operation,
) {
    let event = DomainEvent::UserProfile(UserProfileEvent {
        user_id: row.user_id.clone(),
        status: row.status.clone(),
        custom_status: row.custom_status.clone().unwrap_or_default(),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    });
    let mut topics = vec![topic::user(&row.user_id)];
    topics.extend(friend_user_ids.iter().map(|id| topic::friend_profile(id)));
    publish_to(bus, &topics, event).await;
}

/// Friend rows fan out to both sides of the relationship — the user who owns
/// the row and the friend it points at — exactly like the original's
/// `FriendReactive.publish`.
pub async fn publish_friend(bus: &Arc<TopicBus<DomainEvent>>, row: &FriendRow, op: Operation) {
    let status = FriendStatus::parse(&row.status).unwrap_or(FriendStatus::Pending);
    let event = DomainEvent::Friend(FriendEvent {
        id: row.id.clone(),
        user_id: row.user_id.clone(),
        friend_id: row.friend_id.clone(),
        alias_name: row.alias_name.clone().unwrap_or_default(),
        status,
        is_favorite: row.is_favorite,
        is_muted: row.is_muted,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    });
    let topics = [topic::friend(&row.user_id), topic::friend(&row.friend_id)];
    publish_to(bus, &topics, event).await;
}

pub async fn publish_message(bus: &Arc<TopicBus<DomainEvent>>, row: &MessageRow, op: Operation) {
    let event = DomainEvent::Message(MessageEvent {
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
    });
    publish_to(bus, &[topic::message(&row.channel_id)], event).await;
}

pub async fn publish_direct_message(
    bus: &Arc<TopicBus<DomainEvent>>,
    row: &DirectMessageRow,
    op: Operation,
) {
    let event = DomainEvent::DirectMessage(DirectMessageEvent {
        id: row.id.clone(),
        sender_id: row.sender_id.clone(),
        recipient_id: row.recipient_id.clone(),
        content: row.content.clone(),
        is_pinned: row.is_pinned,
        is_edited: row.is_edited,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    });
    let topics = [
        topic::direct_message(&row.sender_id),
        topic::direct_message(&row.recipient_id),
    ];
    publish_to(bus, &topics, event).await;
}

pub async fn publish_message_attachment(
    bus: &Arc<TopicBus<DomainEvent>>,
    row: &MessageAttachmentRow,
    channel_id: &str,
    op: Operation,
) {
    let event = DomainEvent::MessageAttachment(MessageAttachmentEvent {
        id: row.id.clone(),
        message_id: row.message_id.clone(),
        channel_id: channel_id.to_string(),
        url: row.url.clone(),
        content_type: row.content_type.clone().unwrap_or_default(),
        size_bytes: row.size_bytes,
        operation: op,
    });
    publish_to(bus, &[topic::message_attachment(&row.message_id)], event).await;
}

pub async fn publish_message_reaction(
    bus: &Arc<TopicBus<DomainEvent>>,
    row: &MessageReactionRow,
    channel_id: &str,
    op: Operation,
) {
    let event = DomainEvent::MessageReaction(MessageReactionEvent {
        message_id: row.message_id.clone(),
        channel_id: channel_id.to_string(),
        user_id: row.user_id.clone(),
        emoji: row.emoji.clone(),
        operation: op,
    });
    publish_to(bus, &[topic::message_reaction(&row.message_id)], event).await;
}

pub async fn publish_server(bus: &Arc<TopicBus<DomainEvent>>, row: &ServerRow, op: Operation) {
    let event = DomainEvent::Server(ServerEvent {
        id: row.id.clone(),
        owner_id: row.owner_id.clone(),
        name: row.name.clone(),
        icon_url: row.icon_url.clone().unwrap_or_default(),
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    });
    publish_to(bus, &[topic::server(&row.id)], event).await;
}

pub async fn publish_channel(bus: &Arc<TopicBus<DomainEvent>>, row: &ChannelRow, op: Operation) {
    let event = DomainEvent::Channel(ChannelEvent {
        id: row.id.clone(),
        server_id: row.server_id.clone(),
        name: row.name.clone(),
        position: row.position,
        is_voice: row.is_voice,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    });
    publish_to(bus, &[topic::channel(&row.id)], event).await;
}

pub async fn publish_role(bus: &Arc<TopicBus<DomainEvent>>, row: &RoleRow, op: Operation) {
    let event = DomainEvent::Role(RoleEvent {
        id: row.id.clone(),
        server_id: row.server_id.clone(),
        name: row.name.clone(),
        level: row.level,
        created_at: unix_seconds(row.created_at),
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    });
    publish_to(bus, &[topic::role(&row.id)], event).await;
}

pub async fn publish_channel_permission(
    bus: &Arc<TopicBus<DomainEvent>>,
    row: &ChannelPermissionRow,
    op: Operation,
) {
    let event = DomainEvent::ChannelPermission(ChannelPermissionEvent {
        id: row.id.clone(),
        channel_id: row.channel_id.clone(),
        role_id: row.role_id.clone(),
        allow_mask: row.allow_mask,
        deny_mask: row.deny_mask,
        operation: op,
    });
    publish_to(bus, &[topic::channel_permission(&row.channel_id)], event).await;
}

pub async fn publish_server_member(
    bus: &Arc<TopicBus<DomainEvent>>,
    row: &ServerMemberRow,
    op: Operation,
) {
    let event = DomainEvent::ServerMember(ServerMemberEvent {
        id: row.id.clone(),
        server_id: row.server_id.clone(),
        user_id: row.user_id.clone(),
        is_banned: row.is_banned,
        joined_at: unix_seconds(row.joined_at),
        operation: op,
    });
    publish_to(bus, &[topic::server_member(&row.server_id)], event).await;
}

pub async fn publish_member_role(
    bus: &Arc<TopicBus<DomainEvent>>,
    row: &MemberRoleRow,
    op: Operation,
) {
    let event = DomainEvent::MemberRole(MemberRoleEvent {
        server_id: row.server_id.clone(),
        user_id: row.user_id.clone(),
        role_id: row.role_id.clone(),
        operation: op,
    });
    publish_to(bus, &[topic::member_role(&row.user_id)], event).await;
}

pub async fn publish_voice_state(
    bus: &Arc<TopicBus<DomainEvent>>,
    row: &VoiceStateRow,
    op: Operation,
) {
    let event = DomainEvent::VoiceState(VoiceStateEvent {
        channel_id: row.channel_id.clone(),
        user_id: row.user_id.clone(),
        self_mute: row.self_mute,
        self_deafen: row.self_deafen,
        server_mute: row.server_mute,
        server_deafen: row.server_deafen,
        updated_at: unix_seconds(row.updated_at),
        operation: op,
    });
    publish_to(bus, &[topic::voice(&row.channel_id)], event).await;
}
