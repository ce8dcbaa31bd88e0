//! gRPC auth interceptor
//!
//! Validates the bearer session token carried in the `authorization` metadata
//! entry and attaches an [`AuthContext`] to the request extensions for
//! handlers and extractors to read. Applied to every service except the
//! public `Auth` RPCs (Register, Login, ForgotPassword, ResetPassword), which
//! are served from an un-intercepted service instance.

use std::sync::Arc;

use tonic::{Request, Status};

use super::context::AuthContext;
use super::jwt::JwtError;
use super::manager::AuthManager;
use crate::core::constants::DEFAULT_USER_ID;

#[derive(Clone)]
pub struct AuthInterceptor {
    auth_manager: Arc<AuthManager>,
}

impl AuthInterceptor {
    pub fn new(auth_manager: Arc<AuthManager>) -> Self {
        Self { auth_manager }
    }
}

impl tonic::service::Interceptor for AuthInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if !self.auth_manager.is_enabled() {
            request.extensions_mut().insert(AuthContext::LocalDefault {
                user_id: DEFAULT_USER_ID.to_string(),
            });
            return Ok(request);
        }

        let token = bearer_token(&request)?.to_string();
        let claims = self
            .auth_manager
            .validate_session(&token)
            .map_err(|e| match e {
                JwtError::Expired => Status::unauthenticated("session expired"),
                JwtError::InvalidSignature | JwtError::Invalid(_) => {
                    Status::unauthenticated("invalid session token")
                }
            })?;

        request.extensions_mut().insert(AuthContext::Session {
            user_id: claims.user_id().to_string(),
        });
        Ok(request)
    }
}

fn bearer_token<T>(request: &Request<T>) -> Result<&str, Status> {
    let header = request
        .metadata()
        .get("authorization")
        .ok_or_else(|| Status::unauthenticated("missing authorization metadata"))?;
    let header = header
        .to_str()
        .map_err(|_| Status::unauthenticated("invalid authorization metadata"))?;
    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| Status::unauthenticated("expected a Bearer token"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_metadata() {
        let request = Request::new(());
        let err = bearer_token(&request).unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("authorization", "Basic abc123".parse().unwrap());
        assert!(bearer_token(&request).is_err());
    }

    #[test]
    fn extracts_bearer_token() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&request).unwrap(), "abc.def.ghi");
    }
}
