//! API surface: gRPC services plus a minimal HTTP health endpoint

pub mod auth;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
mod server;
pub mod types;

pub use auth::AuthManager;
pub use server::ApiServer;
