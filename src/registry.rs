//! In-memory subscriber registry.
//!
//! The registry is the only mutable state shared between the command front end
//! and the broadcast scheduler. Mutations and snapshot reads are serialized per
//! entry by the underlying `DashMap` shards; no lock outlives a single copy.

use crate::types::{Asset, SubscriberId};
use dashmap::DashMap;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Option<Asset>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `id` was not subscribed before. An existing selection is kept.
    pub fn subscribe(&self, id: SubscriberId) -> bool {
        let mut inserted = false;
        self.subscribers.entry(id).or_insert_with(|| {
            inserted = true;
            None
        });
        if inserted {
            tracing::info!(subscriber = %id, "subscribed");
        }
        inserted
    }

    /// Returns `true` if `id` was subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            tracing::info!(subscriber = %id, "unsubscribed");
        }
        removed
    }

    /// Set or replace the asset for a subscribed id. Unknown ids are left alone.
    pub fn select_asset(&self, id: SubscriberId, asset: Asset) -> bool {
        match self.subscribers.get_mut(&id) {
            Some(mut entry) => {
                tracing::info!(subscriber = %id, asset = %asset.name, "asset selected");
                *entry = Some(asset);
                true
            }
            None => {
                tracing::debug!(subscriber = %id, asset = %asset.name, "selection for unknown subscriber ignored");
                false
            }
        }
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    pub fn selected_asset(&self, id: SubscriberId) -> Option<Asset> {
        self.subscribers.get(&id).and_then(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self
                .subscribers
                .iter()
                .map(|kv| (*kv.key(), kv.value().clone()))
                .collect(),
        }
    }
}

/// Point-in-time copy of the registry, detached from later mutations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    entries: BTreeMap<SubscriberId, Option<Asset>>,
}

impl Snapshot {
    pub fn get(&self, id: SubscriberId) -> Option<&Option<Asset>> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubscriberId, Option<&Asset>)> {
        self.entries.iter().map(|(id, asset)| (*id, asset.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
