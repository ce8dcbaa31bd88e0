//! Reactive router (component D).
//!
//! The original service parsed the table name out of every executed
//! statement at runtime and dispatched through a `switch` into one of twelve
//! per-entity handlers (see `pkg/reactive/reactive.go`). Here the row type
//! already pins the table statically — a `FriendRow` can only have come from
//! `friends` — so the router is one method per table rather than a runtime
//! string switch. Every repository mutation that touches a reactive table
//! calls exactly one of these after its write commits.

use std::sync::Arc;

use tracing::debug;

use crate::data::topics::TopicBus;
use crate::data::types::{
    ChannelPermissionRow, ChannelRow, DirectMessageRow, FriendRow, MemberRoleRow,
    MessageAttachmentRow, MessageReactionRow, MessageRow, RoleRow, ServerMemberRow, ServerRow,
    UserProfileRow, UserRow, VoiceStateRow,
};

use super::events::{DomainEvent, Operation};
use super::publishers;

#[derive(Clone)]
pub struct ReactiveRouter {
    bus: Arc<TopicBus<DomainEvent>>,
}

impl ReactiveRouter {
    pub fn new(bus: Arc<TopicBus<DomainEvent>>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<TopicBus<DomainEvent>> {
        &self.bus
    }

    pub async fn users(&self, row: &UserRow, op: Operation) {
        debug!(table = "users", id = %row.id, "routing reactive event");
        publishers::publish_user(&self.bus, row, op).await;
    }

    pub async fn user_profiles(&self, row: &UserProfileRow, friend_user_ids: &[String], op: Operation) {
        debug!(table = "user_profiles", user_id = %row.user_id, "routing reactive event");
        publishers::publish_user_profile(&self.bus, row, friend_user_ids, op).await;
    }

    pub async fn friends(&self, row: &FriendRow, op: Operation) {
        debug!(table = "friends", id = %row.id, "routing reactive event");
        publishers::publish_friend(&self.bus, row, op).await;
    }

    pub async fn messages(&self, row: &MessageRow, op: Operation) {
        debug!(table = "messages", id = %row.id, "routing reactive event");
        publishers::publish_message(&self.bus, row, op).await;
    }

    pub async fn direct_messages(&self, row: &DirectMessageRow, op: Operation) {
        debug!(table = "direct_messages", id = %row.id, "routing reactive event");
        publishers::publish_direct_message(&self.bus, row, op).await;
    }

    pub async fn message_attachments(&self, row: &MessageAttachmentRow, channel_id: &str, op: Operation) {
        debug!(table = "message_attachments", id = %row.id, "routing reactive event");
        publishers::publish_message_attachment(&self.bus, row, channel_id, op).await;
    }

    pub async fn message_reactions(&self, row: &MessageReactionRow, channel_id: &str, op: Operation) {
        debug!(table = "message_reactions", message_id = %row.message_id, "routing reactive event");
        publishers::publish_message_reaction(&self.bus, row, channel_id, op).await;
    }

    pub async fn servers(&self, row: &ServerRow, op: Operation) {
        debug!(table = "servers", id = %row.id, "routing reactive event");
        publishers::publish_server(&self.bus, row, op).await;
    }

    pub async fn channels(&self, row: &ChannelRow, op: Operation) {
        debug!(table = "channels", id = %row.id, "routing reactive event");
        publishers::publish_channel(&self.bus, row, op).await;
    }

    pub async fn roles(&self, row: &RoleRow, op: Operation) {
        debug!(table = "roles", id = %row.id, "routing reactive event");
        publishers::publish_role(&self.bus, row, op).await;
    }

    pub async fn channel_permissions(&self, row: &ChannelPermissionRow, op: Operation) {
        debug!(table = "channel_permissions", id = %row.id, "routing reactive event");
        publishers::publish_channel_permission(&self.bus, row, op).await;
    }

    pub async fn server_members(&self, row: &ServerMemberRow, op: Operation) {
        debug!(table = "server_members", id = %row.id, "routing reactive event");
        publishers::publish_server_member(&self.bus, row, op).await;
    }

    pub async fn member_roles(&self, row: &MemberRoleRow, op: Operation) {
        debug!(table = "member_roles", server_id = %row.server_id, user_id = %row.user_id, "routing reactive event");
        publishers::publish_member_role(&self.bus, row, op).await;
    }

    pub async fn voice_states(&self, row: &VoiceStateRow, op: Operation) {
        debug!(table = "voice_states", channel_id = %row.channel_id, "routing reactive event");
        publishers::publish_voice_state(&self.bus, row, op).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn routing_a_friend_row_fans_out_to_both_sides() {
        let bus = Arc::new(TopicBus::new());
        let router = ReactiveRouter::new(bus.clone());
        let mut user_sub = bus.subscribe("friend:1").await;
        let mut friend_sub = bus.subscribe("friend:2").await;

        let row = FriendRow {
            id: "f1".into(),
            user_id: "1".into(),
            friend_id: "2".into(),
            alias_name: None,
            status: "pending".into(),
            is_favorite: false,
            is_muted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        router.friends(&row, Operation::Insert).await;

        assert!(matches!(user_sub.recv().await.unwrap(), DomainEvent::Friend(_)));
        assert!(matches!(friend_sub.recv().await.unwrap(), DomainEvent::Friend(_)));
    }
}
