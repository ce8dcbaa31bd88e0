//! Domain logic for the chat backend.
//!
//! - `events` - the closed `DomainEvent` sum type every reactive publish carries
//! - `publishers` - per-entity projections from a committed row to a `DomainEvent`
//! - `router` - dispatches a committed mutation to its publisher (component D)
//! - `sync` - delta-sync engine used by reconnecting clients (component G)
//! - `clock` - monotonic server timestamp source (component H)

pub mod clock;
pub mod events;
pub mod publishers;
pub mod router;
pub mod sync;

pub use clock::ServerClock;
pub use events::{DomainEvent, Operation};
pub use router::ReactiveRouter;
pub use sync::SyncEngine;
