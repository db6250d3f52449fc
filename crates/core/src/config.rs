use anima_shared::{
    named_enum, AnimaError, EngagementLevel, InteractionMode, InteractionType, LimitPeriod,
    TraitKind, TraitMap, TraitVector, TRAIT_COUNT,
};
use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use validator::Validate;

use crate::evolution::TimeWindow;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

named_enum! {
    /// Shape of the anchoring influence curve over agent age.
    pub enum DecayFunction {
        Linear => "linear",
        Exponential => "exponential",
        Logarithmic => "logarithmic",
    }
}

// ══════════════════════════════════════════════════════════════
// Sections
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeMultipliers {
    pub text: f64,
    pub voice: f64,
    pub video: f64,
    pub mixed: f64,
}

impl ModeMultipliers {
    #[must_use]
    pub fn get(&self, mode: InteractionMode) -> f64 {
        match mode {
            InteractionMode::Text => self.text,
            InteractionMode::Voice => self.voice,
            InteractionMode::Video => self.video,
            InteractionMode::Mixed => self.mixed,
        }
    }
}

impl Default for ModeMultipliers {
    fn default() -> Self {
        Self {
            text: 1.0,
            voice: 1.2,
            video: 1.3,
            mixed: 1.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementMultipliers {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub intense: f64,
}

impl EngagementMultipliers {
    #[must_use]
    pub fn get(&self, level: EngagementLevel) -> f64 {
        match level {
            EngagementLevel::Low => self.low,
            EngagementLevel::Medium => self.medium,
            EngagementLevel::High => self.high,
            EngagementLevel::Intense => self.intense,
        }
    }
}

impl Default for EngagementMultipliers {
    fn default() -> Self {
        Self {
            low: 0.6,
            medium: 1.0,
            high: 1.3,
            intense: 1.5,
        }
    }
}

/// Caps for one accumulation period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodLimit {
    /// Largest cumulative |change| a single trait may accumulate in the period.
    pub max_change: f64,
    /// Largest cumulative |change| summed over all traits in the period.
    pub cumulative_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitElasticity {
    pub min_value: f64,
    pub max_value: f64,
    /// 0.0 = no resistance, 1.0 = trait never moves
    pub change_resistance: f64,
    pub volatility: f64,
}

impl Default for TraitElasticity {
    fn default() -> Self {
        Self {
            min_value: 0.05,
            max_value: 0.95,
            change_resistance: 0.3,
            volatility: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConstraints {
    pub max_simultaneous_changes: u32,
    /// Stability scores below this raise a warning on the result.
    pub stability_threshold: f64,
    /// Hard ceiling on any single trait delta per pass.
    pub emergency_brake: f64,
}

impl Default for GlobalConstraints {
    fn default() -> Self {
        Self {
            max_simultaneous_changes: 5,
            stability_threshold: 0.97,
            emergency_brake: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionLimits {
    pub daily: PeriodLimit,
    pub weekly: PeriodLimit,
    pub monthly: PeriodLimit,
    /// Per-trait and per-field overrides on top of the built-in table.
    #[serde(deserialize_with = "merge_elasticity")]
    pub trait_elasticity: TraitMap<TraitElasticity>,
    pub global: GlobalConstraints,
}

impl EvolutionLimits {
    #[must_use]
    pub fn period(&self, period: LimitPeriod) -> &PeriodLimit {
        match period {
            LimitPeriod::Daily => &self.daily,
            LimitPeriod::Weekly => &self.weekly,
            LimitPeriod::Monthly => &self.monthly,
        }
    }

    pub fn period_mut(&mut self, period: LimitPeriod) -> &mut PeriodLimit {
        match period {
            LimitPeriod::Daily => &mut self.daily,
            LimitPeriod::Weekly => &mut self.weekly,
            LimitPeriod::Monthly => &mut self.monthly,
        }
    }
}

/// Field-level override for one trait's elasticity.
#[derive(Deserialize)]
struct ElasticityOverride {
    min_value: Option<f64>,
    max_value: Option<f64>,
    change_resistance: Option<f64>,
    volatility: Option<f64>,
}

fn merge_elasticity<'de, D>(deserializer: D) -> Result<TraitMap<TraitElasticity>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<TraitKind, ElasticityOverride>::deserialize(deserializer)?;
    let mut table = EvolutionLimits::default().trait_elasticity;
    for (kind, patch) in overrides {
        let entry = &mut table[kind];
        if let Some(value) = patch.min_value {
            entry.min_value = value;
        }
        if let Some(value) = patch.max_value {
            entry.max_value = value;
        }
        if let Some(value) = patch.change_resistance {
            entry.change_resistance = value;
        }
        if let Some(value) = patch.volatility {
            entry.volatility = value;
        }
    }
    Ok(table)
}

impl Default for EvolutionLimits {
    fn default() -> Self {
        let mut trait_elasticity = TraitMap::splat(TraitElasticity::default());
        trait_elasticity[TraitKind::Conscientiousness].change_resistance = 0.4;
        trait_elasticity[TraitKind::Neuroticism] = TraitElasticity {
            change_resistance: 0.5,
            volatility: 0.8,
            ..TraitElasticity::default()
        };
        trait_elasticity[TraitKind::Humor].volatility = 0.9;

        Self {
            daily: PeriodLimit {
                max_change: 0.05,
                cumulative_max: 0.2,
            },
            weekly: PeriodLimit {
                max_change: 0.15,
                cumulative_max: 0.5,
            },
            monthly: PeriodLimit {
                max_change: 0.3,
                cumulative_max: 1.0,
            },
            trait_elasticity,
            global: GlobalConstraints::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveDriftConfig {
    pub learning_rate: f64,
    /// Minimum |current - baseline| before the baseline starts to follow the agent.
    pub adaptation_threshold: f64,
    pub max_baseline_shift: f64,
    pub stabilization_period_days: f64,
}

impl Default for AdaptiveDriftConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            adaptation_threshold: 0.1,
            max_baseline_shift: 0.05,
            stabilization_period_days: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineAnchoringConfig {
    pub baseline: TraitVector,
    pub anchoring_strength: f64,
    pub decay_function: DecayFunction,
    pub decay_scale_days: f64,
    pub minimum_influence: f64,
    pub adaptive: AdaptiveDriftConfig,
}

impl Default for BaselineAnchoringConfig {
    fn default() -> Self {
        Self {
            baseline: TraitMap::from_array([0.6, 0.5, 0.5, 0.6, 0.3, 0.5, 0.6, 0.6, 0.5, 0.5]),
            anchoring_strength: 0.1,
            decay_function: DecayFunction::Exponential,
            decay_scale_days: 180.0,
            minimum_influence: 0.3,
            adaptive: AdaptiveDriftConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TimeDecayConfig {
    #[validate(range(min = 0.001, message = "must be greater than zero"))]
    pub half_life_hours: f64,
    #[validate(range(min = 0.0, max = 1.0, message = "must be within [0, 1]"))]
    pub minimum_weight: f64,
    /// Events older than this are dropped before analysis.
    #[validate(range(min = 1, message = "must be at least one day"))]
    pub max_event_age_days: u32,
}

impl Default for TimeDecayConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 72.0,
            minimum_weight: 0.1,
            max_event_age_days: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PerformanceConfig {
    pub cache_enabled: bool,
    #[validate(range(min = 1, message = "must be at least 1 second"))]
    pub cache_ttl_secs: u32,
    #[validate(range(min = 1, message = "must allow at least one entry"))]
    pub cache_max_entries: u32,
    #[validate(range(min = 1, max = 10000, message = "must be between 1 and 10000"))]
    pub max_events_per_calculation: u32,
    /// Advisory only. The engine never enforces it; callers wrap calls in their own timeout.
    pub timeout_ms: u32,
    #[validate(range(min = 1, max = 256, message = "must be between 1 and 256"))]
    pub batch_size: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_secs: 300,
            cache_max_entries: 256,
            max_events_per_calculation: 100,
            timeout_ms: 5000,
            batch_size: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit the full per-trait adjustment at info level after every pass.
    pub log_adjustments: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_adjustments: false,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub analysis_window: TimeWindow,
    pub interaction_weights: BTreeMap<InteractionType, TraitVector>,
    pub mode_multipliers: ModeMultipliers,
    pub engagement_multipliers: EngagementMultipliers,
    pub limits: EvolutionLimits,
    pub baseline_anchoring: BaselineAnchoringConfig,
    pub time_decay: TimeDecayConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            analysis_window: TimeWindow::Weekly,
            interaction_weights: default_interaction_weights(),
            mode_multipliers: ModeMultipliers::default(),
            engagement_multipliers: EngagementMultipliers::default(),
            limits: EvolutionLimits::default(),
            baseline_anchoring: BaselineAnchoringConfig::default(),
            time_decay: TimeDecayConfig::default(),
            performance: PerformanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Column order: openness, conscientiousness, extraversion, agreeableness,
/// neuroticism, playfulness, empathy, curiosity, humor, assertiveness.
fn default_interaction_weights() -> BTreeMap<InteractionType, TraitVector> {
    use InteractionType::*;
    let rows: [(InteractionType, [f64; TRAIT_COUNT]); 10] = [
        (CasualChat, [0.10, 0.00, 0.15, 0.05, -0.05, 0.12, 0.02, 0.03, 0.06, 0.00]),
        (DeepConversation, [0.12, 0.03, -0.02, 0.04, 0.00, -0.02, 0.10, 0.12, 0.00, 0.03]),
        (EmotionalSupport, [0.02, 0.02, 0.00, 0.10, -0.06, -0.02, 0.15, 0.02, 0.00, -0.02]),
        (IntellectualDebate, [0.10, 0.06, 0.02, -0.04, 0.02, 0.00, -0.02, 0.12, 0.00, 0.12]),
        (PlayfulBanter, [0.05, -0.04, 0.10, 0.04, -0.04, 0.15, 0.02, 0.02, 0.15, 0.02]),
        (CreativeCollaboration, [0.15, 0.02, 0.04, 0.06, -0.02, 0.06, 0.03, 0.10, 0.04, 0.02]),
        (ConflictResolution, [0.02, 0.05, -0.02, 0.08, 0.05, -0.05, 0.08, 0.00, -0.03, 0.10]),
        (Learning, [0.10, 0.08, 0.00, 0.02, -0.02, 0.00, 0.02, 0.15, 0.00, 0.02]),
        (ProblemSolving, [0.06, 0.12, 0.00, 0.02, -0.02, -0.02, 0.00, 0.08, 0.00, 0.06]),
        (Storytelling, [0.12, 0.00, 0.06, 0.03, 0.00, 0.08, 0.06, 0.06, 0.06, 0.00]),
    ];
    rows.into_iter()
        .map(|(kind, row)| (kind, TraitMap::from_array(row)))
        .collect()
}

// ══════════════════════════════════════════════════════════════
// Validation
// ══════════════════════════════════════════════════════════════

/// Outcome of [`EvolutionConfig::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub is_valid: bool,
}

impl ValidationReport {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn finish(mut self) -> Self {
        self.is_valid = self.errors.is_empty();
        self
    }

    fn check_range(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !value.is_finite() || value < min || value > max {
            self.error(format!("{field}: must be within [{min}, {max}], got {value}"));
        }
    }

    fn check_positive(&mut self, field: &str, value: f64) {
        if !value.is_finite() || value <= 0.0 {
            self.error(format!("{field}: must be greater than zero, got {value}"));
        }
    }

    fn absorb(&mut self, section: &str, result: Result<(), validator::ValidationErrors>) {
        let Err(errors) = result else { return };
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        for (field, list) in fields {
            for err in list {
                let message = err
                    .message
                    .as_ref()
                    .map_or_else(|| err.code.to_string(), ToString::to_string);
                self.error(format!("{section}.{field}: {message}"));
            }
        }
    }
}

impl EvolutionConfig {
    /// Checks every numeric field and table row. Never fails; collects all findings.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        self.validate_weights(&mut report);
        self.validate_multipliers(&mut report);
        self.validate_limits(&mut report);
        self.validate_anchoring(&mut report);

        report.absorb("time_decay", self.time_decay.validate());
        if !self.time_decay.half_life_hours.is_finite() || !self.time_decay.minimum_weight.is_finite() {
            report.error("time_decay: half_life_hours and minimum_weight must be finite");
        }

        report.absorb("performance", self.performance.validate());
        if !self.performance.cache_enabled {
            report.warn("performance.cache_enabled is false; every call recomputes its pattern");
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            report.warn(format!(
                "logging.level '{}' is not one of {}; falling back to info",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        report.finish()
    }

    fn validate_weights(&self, report: &mut ValidationReport) {
        for kind in InteractionType::ALL {
            let Some(row) = self.interaction_weights.get(kind) else {
                report.error(format!("interaction_weights.{kind}: missing trait weight row"));
                continue;
            };
            for (trait_kind, weight) in row.iter() {
                report.check_range(&format!("interaction_weights.{kind}.{trait_kind}"), *weight, -1.0, 1.0);
            }
            if row.max_abs() == 0.0 {
                report.warn(format!("interaction_weights.{kind}: row has no influence on any trait"));
            }
        }
    }

    fn validate_multipliers(&self, report: &mut ValidationReport) {
        for mode in InteractionMode::ALL {
            let value = self.mode_multipliers.get(*mode);
            report.check_positive(&format!("mode_multipliers.{mode}"), value);
            if value > 3.0 {
                report.warn(format!("mode_multipliers.{mode} = {value} is unusually large"));
            }
        }
        for level in EngagementLevel::ALL {
            let value = self.engagement_multipliers.get(*level);
            report.check_positive(&format!("engagement_multipliers.{level}"), value);
            if value > 3.0 {
                report.warn(format!("engagement_multipliers.{level} = {value} is unusually large"));
            }
        }
    }

    fn validate_limits(&self, report: &mut ValidationReport) {
        let limits = &self.limits;
        for period in LimitPeriod::ALL {
            let cap = limits.period(*period);
            report.check_positive(&format!("limits.{period}.max_change"), cap.max_change);
            if cap.max_change > 1.0 {
                report.error(format!("limits.{period}.max_change: must not exceed 1.0, got {}", cap.max_change));
            }
            report.check_positive(&format!("limits.{period}.cumulative_max"), cap.cumulative_max);
            if cap.cumulative_max < cap.max_change {
                report.warn(format!(
                    "limits.{period}.cumulative_max ({}) is below max_change ({}); the total cap dominates",
                    cap.cumulative_max, cap.max_change
                ));
            }
        }
        if limits.daily.max_change > limits.weekly.max_change {
            report.warn("limits.daily.max_change exceeds limits.weekly.max_change");
        }
        if limits.weekly.max_change > limits.monthly.max_change {
            report.warn("limits.weekly.max_change exceeds limits.monthly.max_change");
        }

        for (kind, elasticity) in limits.trait_elasticity.iter() {
            let prefix = format!("limits.trait_elasticity.{kind}");
            report.check_range(&format!("{prefix}.min_value"), elasticity.min_value, 0.0, 1.0);
            report.check_range(&format!("{prefix}.max_value"), elasticity.max_value, 0.0, 1.0);
            if elasticity.min_value >= elasticity.max_value {
                report.error(format!("{prefix}: min_value must be below max_value"));
            }
            report.check_range(&format!("{prefix}.change_resistance"), elasticity.change_resistance, 0.0, 1.0);
            report.check_range(&format!("{prefix}.volatility"), elasticity.volatility, 0.0, 1.0);
            if elasticity.change_resistance >= 1.0 || elasticity.volatility == 0.0 {
                report.warn(format!("{prefix}: trait is frozen and will never change"));
            }
        }

        let global = &limits.global;
        if global.max_simultaneous_changes == 0 {
            report.error("limits.global.max_simultaneous_changes: must be at least 1");
        } else if global.max_simultaneous_changes as usize > TRAIT_COUNT {
            report.warn(format!(
                "limits.global.max_simultaneous_changes ({}) exceeds the number of traits ({TRAIT_COUNT})",
                global.max_simultaneous_changes
            ));
        }
        report.check_range("limits.global.stability_threshold", global.stability_threshold, 0.0, 1.0);
        report.check_positive("limits.global.emergency_brake", global.emergency_brake);
        if global.emergency_brake > 1.0 {
            report.error("limits.global.emergency_brake: must not exceed 1.0");
        }
    }

    fn validate_anchoring(&self, report: &mut ValidationReport) {
        let anchoring = &self.baseline_anchoring;
        for (kind, value) in anchoring.baseline.iter() {
            report.check_range(&format!("baseline_anchoring.baseline.{kind}"), *value, 0.0, 1.0);
            let bounds = &self.limits.trait_elasticity[kind];
            if *value < bounds.min_value || *value > bounds.max_value {
                report.warn(format!(
                    "baseline_anchoring.baseline.{kind} = {value} lies outside its elasticity bounds"
                ));
            }
        }
        report.check_range("baseline_anchoring.anchoring_strength", anchoring.anchoring_strength, 0.0, 1.0);
        report.check_positive("baseline_anchoring.decay_scale_days", anchoring.decay_scale_days);
        report.check_range("baseline_anchoring.minimum_influence", anchoring.minimum_influence, 0.0, 1.0);

        let adaptive = &anchoring.adaptive;
        report.check_range("baseline_anchoring.adaptive.learning_rate", adaptive.learning_rate, 0.0, 1.0);
        report.check_range(
            "baseline_anchoring.adaptive.adaptation_threshold",
            adaptive.adaptation_threshold,
            0.0,
            1.0,
        );
        report.check_range(
            "baseline_anchoring.adaptive.max_baseline_shift",
            adaptive.max_baseline_shift,
            0.0,
            1.0,
        );
        if !adaptive.stabilization_period_days.is_finite() || adaptive.stabilization_period_days < 0.0 {
            report.error(format!(
                "baseline_anchoring.adaptive.stabilization_period_days: must be >= 0, got {}",
                adaptive.stabilization_period_days
            ));
        }
    }

    /// Validates and returns the config, or a [`AnimaError::Config`] listing every error.
    pub fn validated(self) -> Result<Self, AnimaError> {
        let report = self.validate();
        for warning in &report.warnings {
            tracing::warn!(warning = %warning, "Evolution config warning");
        }
        if report.is_valid {
            Ok(self)
        } else {
            Err(AnimaError::Config(report.errors.join("; ")))
        }
    }

    // ── Loading ──

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("Failed to parse evolution config")
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize evolution config")
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Environment variables override file values.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(level) = env::var("ANIMA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(raw) = env::var("ANIMA_CACHE_ENABLED") {
            self.performance.cache_enabled = raw
                .parse::<bool>()
                .with_context(|| format!("Failed to parse ANIMA_CACHE_ENABLED '{raw}'"))?;
        }
        if let Ok(raw) = env::var("ANIMA_MAX_EVENTS") {
            self.performance.max_events_per_calculation = raw
                .parse::<u32>()
                .with_context(|| format!("Failed to parse ANIMA_MAX_EVENTS '{raw}'"))?;
        }
        Ok(())
    }
}
