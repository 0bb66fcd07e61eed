//! Subscription-driven trading signal broadcaster.
//!
//! Subscribers pick an asset; on a fixed schedule the bot pulls recent closes
//! for every selected asset, derives a directional signal (EMA crossover or
//! RSI), and delivers a formatted message to each subscriber. Fetch and
//! delivery failures stay local to the subscriber they hit.

pub mod catalog;
pub mod clock;
pub mod commands;
pub mod cycle;
pub mod delivery;
pub mod format;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod signal;
pub mod source;
pub mod telegram;
pub mod types;

pub use crate::registry::SubscriberRegistry;
pub use crate::scheduler::{BroadcastScheduler, SchedulerConfig};
