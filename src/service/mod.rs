//! Service layer: long-running orchestration of the domain and the bus.

pub mod supervisor;

pub use supervisor::{BackoffPolicy, MIN_BACKOFF, SubscriptionStatus, Supervisor};
