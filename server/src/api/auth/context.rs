//! Authentication context and server-role authorization
//!
//! `AuthContext` is attached to every RPC request by the auth interceptor.
//! `AuthService` answers "can this user do X on this server" by walking the
//! server-membership + role-level model in `ChatRepository`.

use std::sync::Arc;

use crate::api::types::ApiError;
use crate::data::TransactionalService;
use crate::data::types::has_min_role_level;

/// Authentication context for an RPC call
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// Session-authenticated user via JWT
    Session { user_id: String },
    /// Default local user (--no-auth mode)
    LocalDefault { user_id: String },
}

impl AuthContext {
    pub fn user_id(&self) -> &str {
        match self {
            Self::Session { user_id } | Self::LocalDefault { user_id } => user_id,
        }
    }
}

/// Authorization service for server-membership + role-level checks
#[derive(Clone)]
pub struct AuthService {
    database: Arc<TransactionalService>,
}

impl AuthService {
    pub fn new(database: Arc<TransactionalService>) -> Self {
        Self { database }
    }

    /// Verify the caller is a member (and not banned) of `server_id`.
    pub async fn verify_server_access(
        &self,
        auth: &AuthContext,
        server_id: &str,
    ) -> Result<(), ApiError> {
        let user_id = auth.user_id();
        let members = self
            .database
            .repository()
            .list_server_members(server_id)
            .await
            .map_err(ApiError::from_data)?;

        let member = members
            .iter()
            .find(|m| m.user_id == user_id)
            .ok_or_else(|| ApiError::forbidden("NOT_A_MEMBER", "Not a member of this server"))?;

        if member.is_banned {
            return Err(ApiError::forbidden("BANNED", "Banned from this server"));
        }

        Ok(())
    }

    /// Verify the caller holds at least `min_role_level` on `server_id`.
    ///
    /// Implies membership: a user with no roles has an implicit level of 0.
    pub async fn verify_server_role(
        &self,
        auth: &AuthContext,
        server_id: &str,
        min_role_level: i32,
    ) -> Result<(), ApiError> {
        self.verify_server_access(auth, server_id).await?;

        let level = self
            .database
            .repository()
            .highest_role_level(server_id, auth.user_id())
            .await
            .map_err(ApiError::from_data)?;

        if !has_min_role_level(level, min_role_level) {
            return Err(ApiError::forbidden(
                "INSUFFICIENT_ROLE",
                format!("Role level {} or higher required", min_role_level),
            ));
        }

        Ok(())
    }

    /// Verify the caller owns `server_id` (e.g. for delete/transfer operations).
    pub async fn verify_server_owner(
        &self,
        auth: &AuthContext,
        server_id: &str,
    ) -> Result<(), ApiError> {
        let server = self
            .database
            .repository()
            .get_server(server_id)
            .await
            .map_err(ApiError::from_data)?;

        if server.owner_id != auth.user_id() {
            return Err(ApiError::forbidden("NOT_OWNER", "Only the server owner can do this"));
        }

        Ok(())
    }
}
