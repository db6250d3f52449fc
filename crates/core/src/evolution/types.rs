use anima_shared::{
    named_enum, EngagementLevel, InteractionMode, InteractionType, TraitKind, TraitVector,
};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Bumped whenever a formula in the pipeline changes observable output.
pub const ALGORITHM_VERSION: &str = "anima-evolution/1.0";

/// Deltas smaller than this are snapped to zero at the end of limiting.
pub const MINIMUM_TRAIT_CHANGE: f64 = 0.001;

/// A trait counts as "changing" above this magnitude.
pub const CHANGE_EPSILON: f64 = 1e-6;

// ══════════════════════════════════════════════════════════════
// Time buckets
// ══════════════════════════════════════════════════════════════

named_enum! {
    /// Aggregation window for pattern analysis.
    pub enum TimeWindow {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
        Quarterly => "quarterly",
    }
}

impl TimeWindow {
    #[must_use]
    pub const fn days(self) -> f64 {
        match self {
            Self::Daily => 1.0,
            Self::Weekly => 7.0,
            Self::Monthly => 30.0,
            Self::Quarterly => 90.0,
        }
    }
}

named_enum! {
    pub enum TimeOfDay {
        Night => "night",
        Morning => "morning",
        Afternoon => "afternoon",
        Evening => "evening",
    }
}

impl TimeOfDay {
    /// Bucket for a UTC timestamp.
    #[must_use]
    pub fn of(timestamp: DateTime<Utc>) -> Self {
        match timestamp.hour() {
            0..=5 => Self::Night,
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }
}

named_enum! {
    /// Meteorological seasons, northern hemisphere.
    pub enum Season {
        Spring => "spring",
        Summer => "summer",
        Autumn => "autumn",
        Winter => "winter",
    }
}

impl Season {
    #[must_use]
    pub fn of(timestamp: DateTime<Utc>) -> Self {
        match timestamp.month() {
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            9..=11 => Self::Autumn,
            _ => Self::Winter,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Pattern
// ══════════════════════════════════════════════════════════════

/// Aggregate statistics over one batch of events.
///
/// Every distribution and histogram is normalized by the event count, so a
/// non-empty pattern's distributions each sum to 1.0 and an empty one is all
/// zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionPattern {
    pub window: TimeWindow,
    pub total_interactions: usize,
    /// Events per day over the window.
    pub interaction_frequency: f64,
    pub type_distribution: BTreeMap<InteractionType, f64>,
    pub mode_distribution: BTreeMap<InteractionMode, f64>,
    pub engagement_distribution: BTreeMap<EngagementLevel, f64>,
    pub average_engagement: f64,
    pub average_duration_secs: f64,
    pub average_message_count: f64,
    pub average_complexity: f64,
    pub average_emotional_intensity: f64,
    pub average_satisfaction: Option<f64>,
    pub engagement_trend: f64,
    pub complexity_trend: f64,
    pub satisfaction_trend: f64,
    pub response_time_variance: f64,
    pub topic_diversity: f64,
    pub average_context_switches: f64,
    pub time_of_day_distribution: BTreeMap<TimeOfDay, f64>,
    /// Monday first.
    pub weekday_distribution: [f64; 7],
    pub seasonal_distribution: BTreeMap<Season, f64>,
}

impl InteractionPattern {
    #[must_use]
    pub fn empty(window: TimeWindow) -> Self {
        Self {
            window,
            total_interactions: 0,
            interaction_frequency: 0.0,
            type_distribution: BTreeMap::new(),
            mode_distribution: BTreeMap::new(),
            engagement_distribution: BTreeMap::new(),
            average_engagement: 0.0,
            average_duration_secs: 0.0,
            average_message_count: 0.0,
            average_complexity: 0.0,
            average_emotional_intensity: 0.0,
            average_satisfaction: None,
            engagement_trend: 0.0,
            complexity_trend: 0.0,
            satisfaction_trend: 0.0,
            response_time_variance: 0.0,
            topic_diversity: 0.0,
            average_context_switches: 0.0,
            time_of_day_distribution: BTreeMap::new(),
            weekday_distribution: [0.0; 7],
            seasonal_distribution: BTreeMap::new(),
        }
    }

    /// Most frequent interaction type. Ties go to the earlier declared type.
    #[must_use]
    pub fn dominant_interaction_type(&self) -> Option<InteractionType> {
        self.type_distribution
            .iter()
            .fold(None, |best: Option<(InteractionType, f64)>, (kind, share)| match best {
                Some((_, top)) if top >= *share => best,
                _ => Some((*kind, *share)),
            })
            .map(|(kind, _)| kind)
    }
}

// ══════════════════════════════════════════════════════════════
// Adjustment
// ══════════════════════════════════════════════════════════════

named_enum! {
    /// Which limiter step shrank a delta.
    pub enum LimitKind {
        SimultaneousChanges => "simultaneous_changes",
        MinMaxValue => "min_max_value",
        DailyLimit => "daily_limit",
        WeeklyLimit => "weekly_limit",
        MonthlyLimit => "monthly_limit",
        DailyCumulative => "daily_cumulative",
        WeeklyCumulative => "weekly_cumulative",
        MonthlyCumulative => "monthly_cumulative",
        EmergencyBrake => "emergency_brake",
    }
}

/// One limiter intervention. `trait_kind` is `None` for steps that act on the whole vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedLimit {
    pub kind: LimitKind,
    #[serde(rename = "trait", default, skip_serializing_if = "Option::is_none")]
    pub trait_kind: Option<TraitKind>,
}

impl AppliedLimit {
    #[must_use]
    pub const fn global(kind: LimitKind) -> Self {
        Self {
            kind,
            trait_kind: None,
        }
    }

    #[must_use]
    pub const fn for_trait(kind: LimitKind, trait_kind: TraitKind) -> Self {
        Self {
            kind,
            trait_kind: Some(trait_kind),
        }
    }
}

impl fmt::Display for AppliedLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.trait_kind {
            Some(kind) => write!(f, "{}({})", self.kind, kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityAdjustment {
    pub raw_delta: TraitVector,
    pub anchored_delta: TraitVector,
    pub limited_delta: TraitVector,
    pub applied_limits: Vec<AppliedLimit>,
    pub confidence: f64,
    pub stability_score: f64,
}

impl PersonalityAdjustment {
    /// Zero change, no confidence, full stability.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            raw_delta: TraitVector::zeros(),
            anchored_delta: TraitVector::zeros(),
            limited_delta: TraitVector::zeros(),
            applied_limits: Vec::new(),
            confidence: 0.0,
            stability_score: 1.0,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Result bundle
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub processing_time_ms: f64,
    pub events_received: usize,
    pub events_processed: usize,
    pub events_dropped: usize,
    pub cache_hit: bool,
    pub calculated_at: DateTime<Utc>,
}

/// Returned by every call. Same shape whether `success` is true or false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionResult {
    pub success: bool,
    pub result_id: Uuid,
    pub agent_id: String,
    pub actor_id: Option<String>,
    pub adjustment: PersonalityAdjustment,
    pub new_traits: TraitVector,
    pub pattern: InteractionPattern,
    pub metadata: ResultMetadata,
    pub algorithm_version: String,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Snapshot of the engine's rolling counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionStats {
    pub total_calculations: u64,
    pub successful_calculations: u64,
    pub error_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub average_processing_time_ms: f64,
    pub last_calculation_at: Option<DateTime<Utc>>,
}

impl EvolutionStats {
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

/// One unit of work for [`super::EvolutionEngine::process_batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRequest {
    pub agent_id: String,
    #[serde(default)]
    pub actor_id: Option<String>,
    pub events: Vec<anima_shared::EvolutionEvent>,
    pub current_traits: TraitVector,
    pub context: anima_shared::EvolutionContext,
}
