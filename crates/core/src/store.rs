use anima_shared::{LimitPeriod, RecentChangeStore, RecentChanges, TraitVector};
use async_trait::async_trait;
use dashmap::DashMap;

/// Process-local [`RecentChangeStore`].
///
/// Holds accumulators exactly as given. Nothing expires on its own; the
/// owner calls [`Self::reset_period`] when a period rolls over.
#[derive(Debug, Default)]
pub struct InMemoryRecentChangeStore {
    changes: DashMap<String, RecentChanges>,
}

impl InMemoryRecentChangeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, agent_id: &str, changes: RecentChanges) {
        self.changes.insert(agent_id.to_string(), changes);
    }

    /// Add |deltas| to every period for `agent_id`.
    pub fn record(&self, agent_id: &str, deltas: &TraitVector) {
        self.changes
            .entry(agent_id.to_string())
            .or_default()
            .accumulate(deltas);
    }

    pub fn reset_period(&self, period: LimitPeriod) {
        for mut entry in self.changes.iter_mut() {
            *entry.for_period_mut(period) = TraitVector::zeros();
        }
    }

    pub fn remove(&self, agent_id: &str) {
        self.changes.remove(agent_id);
    }
}

#[async_trait]
impl RecentChangeStore for InMemoryRecentChangeStore {
    async fn recent_changes(&self, agent_id: &str) -> anyhow::Result<RecentChanges> {
        Ok(self
            .changes
            .get(agent_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}
