//! `ChatRepository` implementation backed by PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;

use crate::data::error::DataError;
use crate::data::traits::{
    ChatRepository, SyncPage, SYNC_CEILING_DIRECT_MESSAGES, SYNC_CEILING_GENERAL,
    SYNC_CEILING_MESSAGES,
};
use crate::data::types::{
    ChannelPermissionRow, ChannelRow, DirectMessageRow, FriendRow, MemberRoleRow,
    MessageAttachmentRow, MessageReactionRow, MessageRow, RoleRow, ServerMemberRow, ServerRow,
    UserProfileRow, UserRow, VoiceStateRow,
};
use crate::domain::router::ReactiveRouter;
use crate::utils::sql::escape_like_pattern;

use super::PostgresService;

fn now() -> i64 {
    Utc::now().timestamp()
}

fn new_id() -> String {
    cuid2::create_id()
}

#[async_trait]
impl ChatRepository for PostgresService {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<UserRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO users (id, username, email, password_hash, display_name, avatar_url, totp_secret, totp_enabled, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, NULL, NULL, false, $6, $6)";
        sqlx::query(sql)
        .bind(&id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_user(&id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.users(&row, op).await;
        Ok(row)
    }

    async fn get_user(&self, id: &str) -> Result<UserRow, DataError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<UserRow, DataError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserRow, DataError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn update_user(
        &self,
        id: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<UserRow, DataError> {
        let sql = "UPDATE users SET display_name = COALESCE($1, display_name), avatar_url = COALESCE($2, avatar_url), updated_at = $3 WHERE id = $4";
        sqlx::query(sql)
        .bind(display_name)
        .bind(avatar_url)
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_user(id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.users(&row, op).await;
        Ok(row)
    }

    async fn delete_user(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError> {
        let row = self.get_user(id).await?;
        let sql = "DELETE FROM users WHERE id = $1";
        sqlx::query(sql)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Delete,
        );
        router.users(&row, op).await;
        Ok(())
    }

    async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<(), DataError> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        Ok(())
    }

    async fn set_totp(&self, id: &str, secret: Option<&str>, enabled: bool) -> Result<(), DataError> {
        sqlx::query("UPDATE users SET totp_secret = $1, totp_enabled = $2, updated_at = $3 WHERE id = $4")
            .bind(secret)
            .bind(enabled)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        Ok(())
    }

    async fn get_user_profile(&self, user_id: &str) -> Result<UserProfileRow, DataError> {
        sqlx::query_as::<_, UserProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn upsert_user_profile(
        &self,
        user_id: &str,
        status: &str,
        custom_status: Option<&str>,
        friend_user_ids: &[String],
        router: &ReactiveRouter,
    ) -> Result<UserProfileRow, DataError> {
        let sql = "INSERT INTO user_profiles (user_id, status, custom_status, notifications_enabled, theme, updated_at)
             VALUES ($1, $2, $3, true, 'dark', $4)
             ON CONFLICT(user_id) DO UPDATE SET status = excluded.status, custom_status = excluded.custom_status, updated_at = excluded.updated_at";
        sqlx::query(sql)
        .bind(user_id)
        .bind(status)
        .bind(custom_status)
        .bind(now())
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_user_profile(user_id).await?;
        // Upsert: always classifies as Insert, regardless of the conflict branch.
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.user_profiles(&row, friend_user_ids, op).await;
        Ok(row)
    }

    async fn update_user_settings(
        &self,
        user_id: &str,
        notifications_enabled: Option<bool>,
        theme: Option<&str>,
    ) -> Result<UserProfileRow, DataError> {
        sqlx::query(
            "UPDATE user_profiles SET
                 notifications_enabled = COALESCE($1, notifications_enabled),
                 theme = COALESCE($2, theme),
                 updated_at = $3
             WHERE user_id = $4",
        )
        .bind(notifications_enabled)
        .bind(theme)
        .bind(now())
        .bind(user_id)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        self.get_user_profile(user_id).await
    }

    async fn create_friend_request(
        &self,
        user_id: &str,
        friend_id: &str,
        router: &ReactiveRouter,
    ) -> Result<FriendRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO friends (id, user_id, friend_id, alias_name, status, is_favorite, is_muted, created_at, updated_at)
             VALUES ($1, $2, $3, NULL, 'pending', false, false, $4, $4)";
        sqlx::query(sql)
        .bind(&id)
        .bind(user_id)
        .bind(friend_id)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_friend(&id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.friends(&row, op).await;
        Ok(row)
    }

    async fn update_friend_status(
        &self,
        id: &str,
        status: &str,
        router: &ReactiveRouter,
    ) -> Result<FriendRow, DataError> {
        let sql = "UPDATE friends SET status = $1, updated_at = $2 WHERE id = $3";
        sqlx::query(sql)
            .bind(status)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let row = self.get_friend(id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.friends(&row, op).await;
        Ok(row)
    }

    async fn update_friend_alias(
        &self,
        id: &str,
        alias_name: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<FriendRow, DataError> {
        let sql = "UPDATE friends SET alias_name = $1, updated_at = $2 WHERE id = $3";
        sqlx::query(sql)
            .bind(alias_name)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let row = self.get_friend(id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.friends(&row, op).await;
        Ok(row)
    }

    async fn delete_friend(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError> {
        let row = self.get_friend(id).await?;
        let sql = "DELETE FROM friends WHERE id = $1";
        sqlx::query(sql)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Delete,
        );
        router.friends(&row, op).await;
        Ok(())
    }

    async fn get_friend(&self, id: &str) -> Result<FriendRow, DataError> {
        sqlx::query_as::<_, FriendRow>("SELECT * FROM friends WHERE id = $1")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn get_friend_pair(&self, user_id: &str, friend_id: &str) -> Result<FriendRow, DataError> {
        sqlx::query_as::<_, FriendRow>(
            "SELECT * FROM friends WHERE user_id = $1 AND friend_id = $2",
        )
        .bind(user_id)
        .bind(friend_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn list_friends(&self, user_id: &str, status: &str) -> Result<Vec<FriendRow>, DataError> {
        sqlx::query_as::<_, FriendRow>(
            "SELECT * FROM friends WHERE user_id = $1 AND status = $2 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn count_pending_requests(&self, user_id: &str) -> Result<i64, DataError> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM friends WHERE friend_id = $1 AND status = 'pending'",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn list_incoming_friend_requests(&self, user_id: &str) -> Result<Vec<FriendRow>, DataError> {
        sqlx::query_as::<_, FriendRow>(
            "SELECT * FROM friends WHERE friend_id = $1 AND status = 'pending' ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn sync_friends(&self, user_id: &str, since_t: i64) -> Result<SyncPage<FriendRow>, DataError> {
        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM friends WHERE user_id = $1 AND updated_at > $2",
        )
        .bind(user_id)
        .bind(since_t)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let rows = sqlx::query_as::<_, FriendRow>(
            "SELECT * FROM friends WHERE user_id = $1 AND updated_at > $2 ORDER BY updated_at ASC LIMIT $3",
        )
        .bind(user_id)
        .bind(since_t)
        .bind(SYNC_CEILING_GENERAL)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let has_more = total_count > rows.len() as i64;
        Ok(SyncPage {
            is_synced: !has_more,
            has_more,
            total_count,
            server_timestamp: self.server_timestamp(),
            rows,
        })
    }

    async fn create_message(
        &self,
        channel_id: &str,
        author_id: &str,
        content: &str,
        reply_to_message_id: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<MessageRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO messages (id, channel_id, author_id, content, reply_to_message_id, is_pinned, is_edited, is_deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, false, false, false, $6, $6)";
        sqlx::query(sql)
        .bind(&id)
        .bind(channel_id)
        .bind(author_id)
        .bind(content)
        .bind(reply_to_message_id)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_message(&id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.messages(&row, op).await;
        Ok(row)
    }

    async fn get_message(&self, id: &str) -> Result<MessageRow, DataError> {
        sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = $1 AND is_deleted = false")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn update_message_content(
        &self,
        id: &str,
        content: &str,
        router: &ReactiveRouter,
    ) -> Result<MessageRow, DataError> {
        let sql = "UPDATE messages SET content = $1, is_edited = true, updated_at = $2 WHERE id = $3";
        sqlx::query(sql)
            .bind(content)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let row = self.get_message(id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.messages(&row, op).await;
        Ok(row)
    }

    async fn set_message_pinned(
        &self,
        id: &str,
        pinned: bool,
        router: &ReactiveRouter,
    ) -> Result<MessageRow, DataError> {
        let sql = "UPDATE messages SET is_pinned = $1, updated_at = $2 WHERE id = $3";
        sqlx::query(sql)
            .bind(pinned)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let row = self.get_message(id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.messages(&row, op).await;
        Ok(row)
    }

    async fn delete_message(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError> {
        sqlx::query("UPDATE messages SET is_deleted = true, updated_at = $1 WHERE id = $2")
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        // Soft-delete: the executed statement is an UPDATE, but the entity's
        // lifecycle event is a delete, so this stays a literal rather than
        // routing through the parser.
        router.messages(&row, crate::domain::events::Operation::Delete).await;
        Ok(())
    }

    async fn list_messages(
        &self,
        channel_id: &str,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MessageRow>, DataError> {
        sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE channel_id = $1 AND is_deleted = false AND ($2::BIGINT IS NULL OR created_at < $2)
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(channel_id)
        .bind(before)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn list_pinned_messages(&self, channel_id: &str) -> Result<Vec<MessageRow>, DataError> {
        sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE channel_id = $1 AND is_deleted = false AND is_pinned = true ORDER BY updated_at DESC",
        )
        .bind(channel_id)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn search_messages(
        &self,
        channel_id: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<MessageRow>, DataError> {
        let pattern = format!("%{}%", escape_like_pattern(query));
        sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE channel_id = $1 AND is_deleted = false AND content ILIKE $2 ORDER BY created_at DESC LIMIT $3",
        )
        .bind(channel_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn sync_messages(
        &self,
        channel_id: &str,
        since_t: i64,
    ) -> Result<SyncPage<MessageRow>, DataError> {
        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE channel_id = $1 AND updated_at > $2",
        )
        .bind(channel_id)
        .bind(since_t)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT * FROM messages WHERE channel_id = $1 AND updated_at > $2 ORDER BY updated_at ASC LIMIT $3",
        )
        .bind(channel_id)
        .bind(since_t)
        .bind(SYNC_CEILING_MESSAGES)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let has_more = total_count > rows.len() as i64;
        Ok(SyncPage {
            is_synced: !has_more,
            has_more,
            total_count,
            server_timestamp: self.server_timestamp(),
            rows,
        })
    }

    async fn add_message_attachment(
        &self,
        message_id: &str,
        channel_id: &str,
        url: &str,
        content_type: Option<&str>,
        size_bytes: i64,
        router: &ReactiveRouter,
    ) -> Result<MessageAttachmentRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO message_attachments (id, message_id, url, content_type, size_bytes, created_at) VALUES ($1, $2, $3, $4, $5, $6)";
        sqlx::query(sql)
        .bind(&id)
        .bind(message_id)
        .bind(url)
        .bind(content_type)
        .bind(size_bytes)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, MessageAttachmentRow>(
            "SELECT * FROM message_attachments WHERE id = $1",
        )
        .bind(&id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.message_attachments(&row, channel_id, op).await;
        Ok(row)
    }

    async fn list_message_attachments(&self, message_id: &str) -> Result<Vec<MessageAttachmentRow>, DataError> {
        sqlx::query_as::<_, MessageAttachmentRow>(
            "SELECT * FROM message_attachments WHERE message_id = $1 ORDER BY created_at ASC",
        )
        .bind(message_id)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn add_message_reaction(
        &self,
        message_id: &str,
        channel_id: &str,
        user_id: &str,
        emoji: &str,
        router: &ReactiveRouter,
    ) -> Result<MessageReactionRow, DataError> {
        let sql = "INSERT INTO message_reactions (message_id, user_id, emoji, created_at) VALUES ($1, $2, $3, $4)
             ON CONFLICT(message_id, user_id, emoji) DO NOTHING";
        sqlx::query(sql)
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .bind(now())
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, MessageReactionRow>(
            "SELECT * FROM message_reactions WHERE message_id = $1 AND user_id = $2 AND emoji = $3",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.message_reactions(&row, channel_id, op).await;
        Ok(row)
    }

    async fn remove_message_reaction(
        &self,
        message_id: &str,
        channel_id: &str,
        user_id: &str,
        emoji: &str,
        router: &ReactiveRouter,
    ) -> Result<(), DataError> {
        let row = sqlx::query_as::<_, MessageReactionRow>(
            "SELECT * FROM message_reactions WHERE message_id = $1 AND user_id = $2 AND emoji = $3",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let sql =
            "DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2 AND emoji = $3";
        sqlx::query(sql)
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Delete,
        );
        router.message_reactions(&row, channel_id, op).await;
        Ok(())
    }

    async fn list_message_reactions(&self, message_id: &str) -> Result<Vec<MessageReactionRow>, DataError> {
        sqlx::query_as::<_, MessageReactionRow>(
            "SELECT * FROM message_reactions WHERE message_id = $1",
        )
        .bind(message_id)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn create_direct_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
        router: &ReactiveRouter,
    ) -> Result<DirectMessageRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO direct_messages (id, sender_id, recipient_id, content, is_pinned, is_edited, is_deleted, created_at, updated_at)
             VALUES ($1, $2, $3, $4, false, false, false, $5, $5)";
        sqlx::query(sql)
        .bind(&id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_direct_message(&id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.direct_messages(&row, op).await;
        Ok(row)
    }

    async fn get_direct_message(&self, id: &str) -> Result<DirectMessageRow, DataError> {
        sqlx::query_as::<_, DirectMessageRow>(
            "SELECT * FROM direct_messages WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn update_direct_message_content(
        &self,
        id: &str,
        content: &str,
        router: &ReactiveRouter,
    ) -> Result<DirectMessageRow, DataError> {
        let sql = "UPDATE direct_messages SET content = $1, is_edited = true, updated_at = $2 WHERE id = $3";
        sqlx::query(sql)
            .bind(content)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let row = self.get_direct_message(id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.direct_messages(&row, op).await;
        Ok(row)
    }

    async fn set_direct_message_pinned(
        &self,
        id: &str,
        pinned: bool,
        router: &ReactiveRouter,
    ) -> Result<DirectMessageRow, DataError> {
        let sql = "UPDATE direct_messages SET is_pinned = $1, updated_at = $2 WHERE id = $3";
        sqlx::query(sql)
            .bind(pinned)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let row = self.get_direct_message(id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.direct_messages(&row, op).await;
        Ok(row)
    }

    async fn delete_direct_message(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError> {
        sqlx::query("UPDATE direct_messages SET is_deleted = true, updated_at = $1 WHERE id = $2")
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, DirectMessageRow>("SELECT * FROM direct_messages WHERE id = $1")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        // Soft-delete, same as `delete_message` — executed statement is an
        // UPDATE, the lifecycle event is a delete.
        router
            .direct_messages(&row, crate::domain::events::Operation::Delete)
            .await;
        Ok(())
    }

    async fn list_direct_messages(
        &self,
        user_id: &str,
        other_user_id: &str,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<DirectMessageRow>, DataError> {
        sqlx::query_as::<_, DirectMessageRow>(
            "SELECT * FROM direct_messages
             WHERE is_deleted = false
               AND ((sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1))
               AND ($3::BIGINT IS NULL OR created_at < $3)
             ORDER BY created_at DESC LIMIT $4",
        )
        .bind(user_id)
        .bind(other_user_id)
        .bind(before)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn search_direct_messages(
        &self,
        user_id: &str,
        other_user_id: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<DirectMessageRow>, DataError> {
        let pattern = format!("%{}%", escape_like_pattern(query));
        sqlx::query_as::<_, DirectMessageRow>(
            "SELECT * FROM direct_messages
             WHERE is_deleted = false
               AND ((sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1))
               AND content ILIKE $3
             ORDER BY created_at DESC LIMIT $4",
        )
        .bind(user_id)
        .bind(other_user_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn sync_direct_messages(
        &self,
        user_id: &str,
        since_t: i64,
    ) -> Result<SyncPage<DirectMessageRow>, DataError> {
        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM direct_messages WHERE (sender_id = $1 OR recipient_id = $1) AND updated_at > $2",
        )
        .bind(user_id)
        .bind(since_t)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let rows = sqlx::query_as::<_, DirectMessageRow>(
            "SELECT * FROM direct_messages WHERE (sender_id = $1 OR recipient_id = $1) AND updated_at > $2 ORDER BY updated_at ASC LIMIT $3",
        )
        .bind(user_id)
        .bind(since_t)
        .bind(SYNC_CEILING_DIRECT_MESSAGES)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let has_more = total_count > rows.len() as i64;
        Ok(SyncPage {
            is_synced: !has_more,
            has_more,
            total_count,
            server_timestamp: self.server_timestamp(),
            rows,
        })
    }

    async fn create_server(
        &self,
        owner_id: &str,
        name: &str,
        router: &ReactiveRouter,
    ) -> Result<ServerRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO servers (id, owner_id, name, icon_url, created_at, updated_at) VALUES ($1, $2, $3, NULL, $4, $4)";
        sqlx::query(sql)
        .bind(&id)
        .bind(owner_id)
        .bind(name)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_server(&id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.servers(&row, op).await;
        Ok(row)
    }

    async fn get_server(&self, id: &str) -> Result<ServerRow, DataError> {
        sqlx::query_as::<_, ServerRow>("SELECT * FROM servers WHERE id = $1")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn update_server(
        &self,
        id: &str,
        name: Option<&str>,
        icon_url: Option<&str>,
        router: &ReactiveRouter,
    ) -> Result<ServerRow, DataError> {
        let sql = "UPDATE servers SET name = COALESCE($1, name), icon_url = COALESCE($2, icon_url), updated_at = $3 WHERE id = $4";
        sqlx::query(sql)
        .bind(name)
        .bind(icon_url)
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_server(id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.servers(&row, op).await;
        Ok(row)
    }

    async fn delete_server(&self, id: &str, router: &ReactiveRouter) -> Result<(), DataError> {
        let row = self.get_server(id).await?;
        let sql = "DELETE FROM servers WHERE id = $1";
        sqlx::query(sql)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Delete,
        );
        router.servers(&row, op).await;
        Ok(())
    }

    async fn sync_servers(&self, user_id: &str, since_t: i64) -> Result<SyncPage<ServerRow>, DataError> {
        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM servers s
             JOIN server_members sm ON sm.server_id = s.id
             WHERE sm.user_id = $1 AND s.updated_at > $2",
        )
        .bind(user_id)
        .bind(since_t)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let rows = sqlx::query_as::<_, ServerRow>(
            "SELECT s.* FROM servers s
             JOIN server_members sm ON sm.server_id = s.id
             WHERE sm.user_id = $1 AND s.updated_at > $2
             ORDER BY s.updated_at ASC LIMIT $3",
        )
        .bind(user_id)
        .bind(since_t)
        .bind(SYNC_CEILING_GENERAL)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let has_more = total_count > rows.len() as i64;
        Ok(SyncPage {
            is_synced: !has_more,
            has_more,
            total_count,
            server_timestamp: self.server_timestamp(),
            rows,
        })
    }

    async fn create_channel(
        &self,
        server_id: &str,
        name: &str,
        is_voice: bool,
        router: &ReactiveRouter,
    ) -> Result<ChannelRow, DataError> {
        let id = new_id();
        let ts = now();
        let position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM channels WHERE server_id = $1",
        )
        .bind(server_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let sql = "INSERT INTO channels (id, server_id, name, position, is_voice, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $6)";
        sqlx::query(sql)
        .bind(&id)
        .bind(server_id)
        .bind(name)
        .bind(position)
        .bind(is_voice)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_channel(&id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.channels(&row, op).await;
        Ok(row)
    }

    async fn get_channel(&self, id: &str) -> Result<ChannelRow, DataError> {
        sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels WHERE id = $1")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn sync_channels(&self, server_id: &str, since_t: i64) -> Result<SyncPage<ChannelRow>, DataError> {
        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM channels WHERE server_id = $1 AND updated_at > $2",
        )
        .bind(server_id)
        .bind(since_t)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT * FROM channels WHERE server_id = $1 AND updated_at > $2 ORDER BY updated_at ASC LIMIT $3",
        )
        .bind(server_id)
        .bind(since_t)
        .bind(SYNC_CEILING_GENERAL)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let has_more = total_count > rows.len() as i64;
        Ok(SyncPage {
            is_synced: !has_more,
            has_more,
            total_count,
            server_timestamp: self.server_timestamp(),
            rows,
        })
    }

    async fn create_role(
        &self,
        server_id: &str,
        name: &str,
        level: i32,
        router: &ReactiveRouter,
    ) -> Result<RoleRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO roles (id, server_id, name, level, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $5)";
        sqlx::query(sql)
        .bind(&id)
        .bind(server_id)
        .bind(name)
        .bind(level)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = self.get_role(&id).await?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.roles(&row, op).await;
        Ok(row)
    }

    async fn get_role(&self, id: &str) -> Result<RoleRow, DataError> {
        sqlx::query_as::<_, RoleRow>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)
    }

    async fn sync_permissions(
        &self,
        server_id: &str,
        since_t: i64,
    ) -> Result<SyncPage<ChannelPermissionRow>, DataError> {
        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM channel_permissions cp
             JOIN channels c ON c.id = cp.channel_id
             WHERE c.server_id = $1 AND cp.updated_at > $2",
        )
        .bind(server_id)
        .bind(since_t)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let rows = sqlx::query_as::<_, ChannelPermissionRow>(
            "SELECT cp.* FROM channel_permissions cp
             JOIN channels c ON c.id = cp.channel_id
             WHERE c.server_id = $1 AND cp.updated_at > $2
             ORDER BY cp.updated_at ASC LIMIT $3",
        )
        .bind(server_id)
        .bind(since_t)
        .bind(SYNC_CEILING_GENERAL)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let has_more = total_count > rows.len() as i64;
        Ok(SyncPage {
            is_synced: !has_more,
            has_more,
            total_count,
            server_timestamp: self.server_timestamp(),
            rows,
        })
    }

    async fn set_channel_permission(
        &self,
        channel_id: &str,
        role_id: &str,
        allow_mask: i64,
        deny_mask: i64,
        router: &ReactiveRouter,
    ) -> Result<ChannelPermissionRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO channel_permissions (id, channel_id, role_id, allow_mask, deny_mask, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             ON CONFLICT(channel_id, role_id) DO UPDATE SET allow_mask = excluded.allow_mask, deny_mask = excluded.deny_mask, updated_at = excluded.updated_at";
        sqlx::query(sql)
        .bind(&id)
        .bind(channel_id)
        .bind(role_id)
        .bind(allow_mask)
        .bind(deny_mask)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, ChannelPermissionRow>(
            "SELECT * FROM channel_permissions WHERE channel_id = $1 AND role_id = $2",
        )
        .bind(channel_id)
        .bind(role_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.channel_permissions(&row, op).await;
        Ok(row)
    }

    async fn add_server_member(
        &self,
        server_id: &str,
        user_id: &str,
        router: &ReactiveRouter,
    ) -> Result<ServerMemberRow, DataError> {
        let id = new_id();
        let ts = now();
        let sql = "INSERT INTO server_members (id, server_id, user_id, is_banned, joined_at, updated_at) VALUES ($1, $2, $3, false, $4, $4)";
        sqlx::query(sql)
        .bind(&id)
        .bind(server_id)
        .bind(user_id)
        .bind(ts)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, ServerMemberRow>("SELECT * FROM server_members WHERE id = $1")
            .bind(&id)
            .fetch_one(self.pool())
            .await
            .map_err(DataError::from_postgres)?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.server_members(&row, op).await;
        Ok(row)
    }

    async fn set_server_member_banned(
        &self,
        server_id: &str,
        user_id: &str,
        banned: bool,
        router: &ReactiveRouter,
    ) -> Result<ServerMemberRow, DataError> {
        let sql =
            "UPDATE server_members SET is_banned = $1, updated_at = $2 WHERE server_id = $3 AND user_id = $4";
        sqlx::query(sql)
        .bind(banned)
        .bind(now())
        .bind(server_id)
        .bind(user_id)
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, ServerMemberRow>(
            "SELECT * FROM server_members WHERE server_id = $1 AND user_id = $2",
        )
        .bind(server_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;
        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.server_members(&row, op).await;
        Ok(row)
    }

    async fn list_server_members(&self, server_id: &str) -> Result<Vec<ServerMemberRow>, DataError> {
        sqlx::query_as::<_, ServerMemberRow>(
            "SELECT * FROM server_members WHERE server_id = $1 ORDER BY joined_at ASC",
        )
        .bind(server_id)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)
    }

    async fn assign_member_role(
        &self,
        server_id: &str,
        user_id: &str,
        role_id: &str,
        router: &ReactiveRouter,
    ) -> Result<MemberRoleRow, DataError> {
        let sql = "INSERT INTO member_roles (server_id, user_id, role_id, created_at) VALUES ($1, $2, $3, $4)
             ON CONFLICT(server_id, user_id, role_id) DO NOTHING";
        sqlx::query(sql)
        .bind(server_id)
        .bind(user_id)
        .bind(role_id)
        .bind(now())
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, MemberRoleRow>(
            "SELECT * FROM member_roles WHERE server_id = $1 AND user_id = $2 AND role_id = $3",
        )
        .bind(server_id)
        .bind(user_id)
        .bind(role_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Insert,
        );
        router.member_roles(&row, op).await;
        Ok(row)
    }

    async fn highest_role_level(&self, server_id: &str, user_id: &str) -> Result<i32, DataError> {
        let level: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(r.level) FROM member_roles mr
             JOIN roles r ON r.id = mr.role_id
             WHERE mr.server_id = $1 AND mr.user_id = $2",
        )
        .bind(server_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;
        Ok(level.unwrap_or(0))
    }

    async fn upsert_voice_state(
        &self,
        channel_id: &str,
        user_id: &str,
        self_mute: bool,
        self_deafen: bool,
        server_mute: bool,
        server_deafen: bool,
        router: &ReactiveRouter,
    ) -> Result<VoiceStateRow, DataError> {
        let sql = "INSERT INTO voice_states (channel_id, user_id, self_mute, self_deafen, server_mute, server_deafen, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT(channel_id, user_id) DO UPDATE SET
                self_mute = excluded.self_mute,
                self_deafen = excluded.self_deafen,
                server_mute = excluded.server_mute,
                server_deafen = excluded.server_deafen,
                updated_at = excluded.updated_at";
        sqlx::query(sql)
        .bind(channel_id)
        .bind(user_id)
        .bind(self_mute)
        .bind(self_deafen)
        .bind(server_mute)
        .bind(server_deafen)
        .bind(now())
        .execute(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let row = sqlx::query_as::<_, VoiceStateRow>(
            "SELECT * FROM voice_states WHERE channel_id = $1 AND user_id = $2",
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Update,
        );
        router.voice_states(&row, op).await;
        Ok(row)
    }

    async fn remove_voice_state(
        &self,
        channel_id: &str,
        user_id: &str,
        router: &ReactiveRouter,
    ) -> Result<(), DataError> {
        let row = sqlx::query_as::<_, VoiceStateRow>(
            "SELECT * FROM voice_states WHERE channel_id = $1 AND user_id = $2",
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let sql = "DELETE FROM voice_states WHERE channel_id = $1 AND user_id = $2";
        sqlx::query(sql)
            .bind(channel_id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(DataError::from_postgres)?;

        let op = crate::data::sql::parser::classify_operation(
            sql,
            crate::domain::events::Operation::Delete,
        );
        router.voice_states(&row, op).await;
        Ok(())
    }

    async fn sync_voice_channels(
        &self,
        server_id: &str,
        since_t: i64,
    ) -> Result<SyncPage<VoiceStateRow>, DataError> {
        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM voice_states vs
             JOIN channels c ON c.id = vs.channel_id
             WHERE c.server_id = $1 AND vs.updated_at > $2",
        )
        .bind(server_id)
        .bind(since_t)
        .fetch_one(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let rows = sqlx::query_as::<_, VoiceStateRow>(
            "SELECT vs.* FROM voice_states vs
             JOIN channels c ON c.id = vs.channel_id
             WHERE c.server_id = $1 AND vs.updated_at > $2
             ORDER BY vs.updated_at ASC LIMIT $3",
        )
        .bind(server_id)
        .bind(since_t)
        .bind(SYNC_CEILING_GENERAL)
        .fetch_all(self.pool())
        .await
        .map_err(DataError::from_postgres)?;

        let has_more = total_count > rows.len() as i64;
        Ok(SyncPage {
            is_synced: !has_more,
            has_more,
            total_count,
            server_timestamp: self.server_timestamp(),
            rows,
        })
    }

    fn server_timestamp(&self) -> i64 {
        self.clock().now()
    }
}
