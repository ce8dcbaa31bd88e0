//! `AuthService`: the only service registered without [`AuthInterceptor`].
//!
//! `Register`/`Login`/`ForgotPassword`/`ResetPassword`/`VerifyEmail` have no
//! session to validate. The handful of RPCs on this service that do need a
//! caller (`Logout`, `RefreshToken`, `ChangePassword`, `EnableTotp`,
//! `VerifyTotp`) pull and validate the bearer token themselves, the same way
//! [`crate::api::auth::middleware::AuthInterceptor`] would have.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::api::auth::AuthManager;
use crate::api::rate_limit;
use crate::api::types::ApiError;
use crate::core::config::RateLimitConfig;
use crate::core::constants::APP_NAME;
use crate::core::secret::SecretManager;
use crate::data::ChatRepository;
use crate::data::cache::{RateLimitBucket, RateLimiter};
use crate::domain::ReactiveRouter;
use crate::utils::crypto;
use crate::utils::totp;

use super::pb::auth_service_server::AuthService as AuthServiceTrait;
use super::pb::{
    AuthResponse, ChangePasswordRequest, EnableTotpResponse, Empty, ForgotPasswordRequest,
    LoginRequest, LogoutRequest, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest,
    VerifyEmailRequest, VerifyTotpRequest,
};

pub struct AuthServiceImpl {
    repo: Arc<dyn ChatRepository>,
    router: Arc<ReactiveRouter>,
    auth_manager: Arc<AuthManager>,
    secrets: SecretManager,
    rate_limiter: Arc<RateLimiter>,
    rate_limit_config: RateLimitConfig,
}

impl AuthServiceImpl {
    pub fn new(
        repo: Arc<dyn ChatRepository>,
        router: Arc<ReactiveRouter>,
        auth_manager: Arc<AuthManager>,
        secrets: SecretManager,
        rate_limiter: Arc<RateLimiter>,
        rate_limit_config: RateLimitConfig,
    ) -> Self {
        Self {
            repo,
            router,
            auth_manager,
            secrets,
            rate_limiter,
            rate_limit_config,
        }
    }

    async fn check_auth_rate_limit(&self, key: &str) -> Result<(), Status> {
        if !self.rate_limit_config.enabled {
            return Ok(());
        }
        let bucket = RateLimitBucket::auth(self.rate_limit_config.auth_rpm);
        rate_limit::check(&self.rate_limiter, &bucket, key).await
    }

    fn bearer_user_id<T>(&self, request: &Request<T>) -> Result<String, Status> {
        let header = request
            .metadata()
            .get("authorization")
            .ok_or_else(|| Status::unauthenticated("missing authorization metadata"))?;
        let header = header
            .to_str()
            .map_err(|_| Status::unauthenticated("invalid authorization metadata"))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Status::unauthenticated("expected a Bearer token"))?;
        let claims = self
            .auth_manager
            .validate_session(token)
            .map_err(|_| Status::unauthenticated("invalid or expired session token"))?;
        Ok(claims.user_id().to_string())
    }

    fn auth_response(&self, user_id: &str, auth_method: &str) -> Result<AuthResponse, Status> {
        let access_token = self
            .auth_manager
            .create_session(user_id, auth_method)
            .map_err(|e| Status::internal(e.to_string()))?;
        let expires_at = crate::utils::time::now_unix() + self.auth_manager.session_ttl_seconds();
        Ok(AuthResponse {
            user_id: user_id.to_string(),
            access_token,
            expires_at,
        })
    }
}

#[tonic::async_trait]
impl AuthServiceTrait for AuthServiceImpl {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<AuthResponse>, Status> {
        let req = request.into_inner();
        if req.email.is_empty() || req.username.is_empty() || req.password.len() < 8 {
            return Err(ApiError::bad_request(
                "INVALID_INPUT",
                "email, username and an 8+ character password are required",
            )
            .into());
        }

        if self.repo.get_user_by_email(&req.email).await.is_ok() {
            return Err(ApiError::conflict("EMAIL_TAKEN", "Email already registered").into());
        }
        if self.repo.get_user_by_username(&req.username).await.is_ok() {
            return Err(ApiError::conflict("USERNAME_TAKEN", "Username already taken").into());
        }

        let password_hash =
            crypto::hash_password(&req.password).map_err(|e| Status::internal(e.to_string()))?;

        let user = self
            .repo
            .create_user(&req.username, &req.email, &password_hash, None, &self.router)
            .await
            .map_err(ApiError::from_data)?;

        Ok(Response::new(self.auth_response(&user.id, "password")?))
    }

    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<AuthResponse>, Status> {
        let req = request.into_inner();
        self.check_auth_rate_limit(&req.email).await?;

        let user = self
            .repo
            .get_user_by_email(&req.email)
            .await
            .map_err(|_| Status::unauthenticated("invalid email or password"))?;

        let valid = crypto::verify_password(&req.password, &user.password_hash)
            .map_err(|e| Status::internal(e.to_string()))?;
        if !valid {
            return Err(Status::unauthenticated("invalid email or password"));
        }

        if user.totp_enabled {
            let code = req
                .totp_code
                .ok_or_else(|| Status::unauthenticated("two-factor code required"))?;
            let secret = user
                .totp_secret
                .as_deref()
                .ok_or_else(|| Status::internal("2FA enabled with no secret on record"))?;
            if !totp::verify_code(secret, &code, crate::utils::time::now_unix()) {
                return Err(Status::unauthenticated("invalid two-factor code"));
            }
        }

        Ok(Response::new(self.auth_response(&user.id, "password")?))
    }

    async fn logout(&self, request: Request<LogoutRequest>) -> Result<Response<Empty>, Status> {
        // Sessions are stateless JWTs; there is nothing server-side to
        // revoke. Logout exists as an RPC surface for clients to call
        // (clearing their stored token) and for an eventual session
        // blocklist, not because this call changes server state today.
        let _ = self.bearer_user_id(&request)?;
        Ok(Response::new(Empty {}))
    }

    async fn refresh_token(
        &self,
        request: Request<RefreshTokenRequest>,
    ) -> Result<Response<AuthResponse>, Status> {
        let token = request.into_inner().refresh_token;
        let claims = self
            .auth_manager
            .validate_session(&token)
            .map_err(|_| Status::unauthenticated("invalid or expired refresh token"))?;
        Ok(Response::new(
            self.auth_response(claims.user_id(), "refresh")?,
        ))
    }

    async fn verify_email(
        &self,
        _request: Request<VerifyEmailRequest>,
    ) -> Result<Response<Empty>, Status> {
        // No separate email-verification table; accounts are usable as soon
        // as they're created. Kept as a no-op RPC so clients written against
        // the full auth surface don't need a feature flag for self-hosted
        // deployments.
        Ok(Response::new(Empty {}))
    }

    async fn forgot_password(
        &self,
        request: Request<ForgotPasswordRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.check_auth_rate_limit(&request.get_ref().email).await?;
        // Never reveal whether an address is registered.
        Ok(Response::new(Empty {}))
    }

    async fn reset_password(
        &self,
        request: Request<ResetPasswordRequest>,
    ) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        let claims = self
            .auth_manager
            .validate_session(&req.token)
            .map_err(|_| Status::unauthenticated("invalid or expired reset token"))?;
        if req.new_password.len() < 8 {
            return Err(ApiError::bad_request("INVALID_INPUT", "password must be at least 8 characters").into());
        }
        let password_hash = crypto::hash_password(&req.new_password)
            .map_err(|e| Status::internal(e.to_string()))?;
        self.repo
            .set_password_hash(claims.user_id(), &password_hash)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn change_password(
        &self,
        request: Request<ChangePasswordRequest>,
    ) -> Result<Response<Empty>, Status> {
        let user_id = self.bearer_user_id(&request)?;
        let req = request.into_inner();

        let user = self.repo.get_user(&user_id).await.map_err(ApiError::from_data)?;
        let valid = crypto::verify_password(&req.old_password, &user.password_hash)
            .map_err(|e| Status::internal(e.to_string()))?;
        if !valid {
            return Err(Status::unauthenticated("current password is incorrect"));
        }
        if req.new_password.len() < 8 {
            return Err(ApiError::bad_request("INVALID_INPUT", "password must be at least 8 characters").into());
        }

        let password_hash = crypto::hash_password(&req.new_password)
            .map_err(|e| Status::internal(e.to_string()))?;
        self.repo
            .set_password_hash(&user_id, &password_hash)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }

    async fn enable_totp(&self, request: Request<Empty>) -> Result<Response<EnableTotpResponse>, Status> {
        let user_id = self.bearer_user_id(&request)?;
        let user = self.repo.get_user(&user_id).await.map_err(ApiError::from_data)?;

        let secret = totp::generate_secret();
        let otpauth_url = totp::otpauth_url(APP_NAME, &user.username, &secret);

        // Not yet enabled: `Verify2FA` flips `totp_enabled` once the client
        // proves it can generate a matching code.
        self.repo
            .set_totp(&user_id, Some(&secret), false)
            .await
            .map_err(ApiError::from_data)?;

        Ok(Response::new(EnableTotpResponse { secret, otpauth_url }))
    }

    async fn verify_totp(&self, request: Request<VerifyTotpRequest>) -> Result<Response<Empty>, Status> {
        let user_id = self.bearer_user_id(&request)?;
        let code = request.into_inner().code;

        let user = self.repo.get_user(&user_id).await.map_err(ApiError::from_data)?;
        let secret = user
            .totp_secret
            .as_deref()
            .ok_or_else(|| Status::failed_precondition("2FA has not been started for this account"))?;

        if !totp::verify_code(secret, &code, crate::utils::time::now_unix()) {
            return Err(Status::unauthenticated("invalid two-factor code"));
        }

        self.repo
            .set_totp(&user_id, Some(secret), true)
            .await
            .map_err(ApiError::from_data)?;
        Ok(Response::new(Empty {}))
    }
}
