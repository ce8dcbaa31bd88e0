//! HTTP route handlers (health/readiness only — everything else is gRPC)

pub mod health;
