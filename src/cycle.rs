use crate::types::SubscriberId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Subscribed but never picked an asset.
    NoAsset,
    /// Signal was Insufficient-Data and the policy suppresses those.
    InsufficientData,
}

/// What happened to one subscriber in one cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Delivered,
    Skipped(SkipReason),
    FetchFailed(String),
    DeliveryFailed(String),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::FetchFailed(_) | Outcome::DeliveryFailed(_))
    }
}

/// Result of one broadcast pass over a registry snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// 1-based cycle sequence number for this scheduler.
    pub cycle: u64,
    pub elapsed: Duration,
    pub outcomes: Vec<(SubscriberId, Outcome)>,
}

impl CycleReport {
    pub fn outcome_for(&self, id: SubscriberId) -> Option<&Outcome> {
        self.outcomes.iter().find(|(s, _)| *s == id).map(|(_, o)| o)
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == Outcome::Delivered)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Skipped(_)))
            .count()
    }
}
