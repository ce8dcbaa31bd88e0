//! Pulling auth context out of incoming gRPC requests
//!
//! The auth interceptor ([`super::middleware::AuthInterceptor`]) stashes an
//! [`AuthContext`] in request extensions before the handler runs; these
//! helpers pull it back out with a uniform `Status::unauthenticated` on miss.

use tonic::{Request, Status};

use super::context::AuthContext;

/// Fetch the auth context a prior interceptor pass attached to this request.
pub fn auth_context<T>(request: &Request<T>) -> Result<&AuthContext, Status> {
    request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| Status::unauthenticated("missing auth context"))
}

/// Convenience accessor for the common case of just needing the caller's id.
pub fn user_id<T>(request: &Request<T>) -> Result<&str, Status> {
    Ok(auth_context(request)?.user_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_context_is_unauthenticated() {
        let request = Request::new(());
        let err = auth_context(&request).unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn user_id_reads_through_auth_context() {
        let mut request = Request::new(());
        request.extensions_mut().insert(AuthContext::Session {
            user_id: "u1".to_string(),
        });
        assert_eq!(user_id(&request).unwrap(), "u1");
    }
}
