//! In-process event distribution: the topic bus (component A) and the
//! watchable cell (component B). Both are best-effort and process-local —
//! see the module docs on [`bus`] and [`cell`] for the exact contract.

pub mod bus;
pub mod cell;
pub mod error;

pub use bus::{BulkSubscription, Subscription, TopicBus};
pub use cell::{CellSubscription, WatchableCell};
pub use error::TopicError;
