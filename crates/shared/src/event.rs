use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

named_enum! {
    /// Category assigned to an interaction by the upstream classifier.
    pub enum InteractionType {
        CasualChat => "casual_chat",
        DeepConversation => "deep_conversation",
        EmotionalSupport => "emotional_support",
        IntellectualDebate => "intellectual_debate",
        PlayfulBanter => "playful_banter",
        CreativeCollaboration => "creative_collaboration",
        ConflictResolution => "conflict_resolution",
        Learning => "learning",
        ProblemSolving => "problem_solving",
        Storytelling => "storytelling",
    }
}

named_enum! {
    pub enum InteractionMode {
        Text => "text",
        Voice => "voice",
        Video => "video",
        Mixed => "mixed",
    }
}

named_enum! {
    pub enum EngagementLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        Intense => "intense",
    }
}

impl EngagementLevel {
    /// Numeric engagement used for averages and trends.
    #[must_use]
    pub const fn score(self) -> f64 {
        match self {
            Self::Low => 0.25,
            Self::Medium => 0.5,
            Self::High => 0.75,
            Self::Intense => 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    /// Average response latency of the agent during the interaction.
    #[serde(default)]
    pub response_time_ms: Option<f64>,
    #[serde(default)]
    pub context_switches: u32,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// One classified interaction. Produced upstream, consumed once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEvent {
    pub id: String,
    pub interaction_type: InteractionType,
    pub mode: InteractionMode,
    pub engagement: EngagementLevel,
    pub duration_secs: f64,
    pub message_count: u32,
    /// 0.0 (trivial) to 1.0 (highly technical / abstract)
    pub topic_complexity: f64,
    pub emotional_intensity: f64,
    #[serde(default)]
    pub satisfaction: Option<f64>,
    #[serde(default)]
    pub metadata: EventMetadata,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Load hints from the host. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemLoad {
    pub cpu_utilization: f64,
    pub pending_requests: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionContext {
    #[serde(default)]
    pub agent: Option<AgentRecord>,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub environment: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub system_load: Option<SystemLoad>,
}

impl EvolutionContext {
    #[must_use]
    pub fn for_agent(agent_id: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            agent: Some(AgentRecord {
                id: agent_id.to_string(),
                created_at,
                name: None,
            }),
            ..Self::default()
        }
    }

    /// Agent age in fractional days at `now`. A creation time in the future counts as zero.
    #[must_use]
    pub fn agent_age_days(&self, now: DateTime<Utc>) -> Option<f64> {
        self.agent.as_ref().map(|agent| {
            let millis = (now - agent.created_at).num_milliseconds().max(0);
            millis as f64 / 86_400_000.0
        })
    }
}
