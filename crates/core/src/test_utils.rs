//! Shared fixtures for unit tests, integration tests and benches.

use anima_shared::{
    EngagementLevel, EventMetadata, EvolutionContext, EvolutionEvent, InteractionMode,
    InteractionType, RecentChangeStore, RecentChanges,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use crate::clock::FixedClock;
use crate::config::EvolutionConfig;
use crate::evolution::EvolutionEngine;

/// Sunday 2026-10-18 12:00 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(fixed_now()))
}

/// Context for an agent created `age_days` before [`fixed_now`].
pub fn context_aged(agent_id: &str, age_days: i64) -> EvolutionContext {
    EvolutionContext::for_agent(agent_id, fixed_now() - Duration::days(age_days))
}

/// Medium-engagement text chat: 300s, 5 messages, intensity 0.5, complexity 0.6.
pub fn casual_chat_event(id: &str, timestamp: DateTime<Utc>) -> EvolutionEvent {
    EventBuilder::new(id, timestamp).build()
}

pub struct EventBuilder {
    event: EvolutionEvent,
}

impl EventBuilder {
    pub fn new(id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            event: EvolutionEvent {
                id: id.to_string(),
                interaction_type: InteractionType::CasualChat,
                mode: InteractionMode::Text,
                engagement: EngagementLevel::Medium,
                duration_secs: 300.0,
                message_count: 5,
                topic_complexity: 0.6,
                emotional_intensity: 0.5,
                satisfaction: None,
                metadata: EventMetadata::default(),
                timestamp,
            },
        }
    }

    pub fn kind(mut self, kind: InteractionType) -> Self {
        self.event.interaction_type = kind;
        self
    }

    pub fn mode(mut self, mode: InteractionMode) -> Self {
        self.event.mode = mode;
        self
    }

    pub fn engagement(mut self, level: EngagementLevel) -> Self {
        self.event.engagement = level;
        self
    }

    pub fn duration_secs(mut self, secs: f64) -> Self {
        self.event.duration_secs = secs;
        self
    }

    pub fn messages(mut self, count: u32) -> Self {
        self.event.message_count = count;
        self
    }

    pub fn complexity(mut self, value: f64) -> Self {
        self.event.topic_complexity = value;
        self
    }

    pub fn intensity(mut self, value: f64) -> Self {
        self.event.emotional_intensity = value;
        self
    }

    pub fn satisfaction(mut self, value: f64) -> Self {
        self.event.satisfaction = Some(value);
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.event.metadata.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    pub fn response_time_ms(mut self, ms: f64) -> Self {
        self.event.metadata.response_time_ms = Some(ms);
        self
    }

    pub fn build(self) -> EvolutionEvent {
        self.event
    }
}

/// Engine on [`fixed_clock`] backed by `store`.
pub fn engine_with_store(config: EvolutionConfig, store: Arc<dyn RecentChangeStore>) -> EvolutionEngine {
    EvolutionEngine::with_clock(config, store, fixed_clock())
}

/// A store whose backend is always down.
pub struct UnavailableStore;

#[async_trait]
impl RecentChangeStore for UnavailableStore {
    async fn recent_changes(&self, _agent_id: &str) -> anyhow::Result<RecentChanges> {
        Err(anyhow::anyhow!("connection refused").context("recent-change backend unreachable"))
    }
}
