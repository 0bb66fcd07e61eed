pub mod stats;

pub use stats::BroadcastStats;
