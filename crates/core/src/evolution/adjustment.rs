use anima_shared::{EvolutionEvent, InteractionType, TraitVector};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::types::InteractionPattern;
use crate::config::{EvolutionConfig, TimeDecayConfig};

/// Interactions per day at which the frequency factor reaches 1.0.
pub const OPTIMAL_DAILY_FREQUENCY: f64 = 5.0;

/// Largest |delta| any trait may carry out of a single batch.
pub const MAX_BATCH_DELTA: f64 = 0.3;

/// Duration at which the duration factor saturates.
const REFERENCE_DURATION_SECS: f64 = 1800.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RawAdjustment {
    pub deltas: TraitVector,
    pub warnings: Vec<String>,
    /// Events that contributed nothing because their type had no weight row.
    pub skipped_events: usize,
}

// ══════════════════════════════════════════════════════════════
// Pure Functions
// ══════════════════════════════════════════════════════════════

/// Quality multiplier from message count, duration and satisfaction, clamped to [0.1, 2.0].
#[must_use]
pub fn event_quality_weight(message_count: u32, duration_secs: f64, satisfaction: Option<f64>) -> f64 {
    let message_factor = (1.0 + f64::from(message_count) / 20.0).min(1.5);
    let duration_factor = (0.8 + 0.4 * duration_secs / REFERENCE_DURATION_SECS).min(1.2);
    let satisfaction_factor = satisfaction.map_or(1.0, |s| 0.5 + s);
    (message_factor * duration_factor * satisfaction_factor).clamp(0.1, 2.0)
}

/// Exponential half-life decay with a floor. Events after `now` count as fresh.
#[must_use]
pub fn time_decay_weight(timestamp: DateTime<Utc>, now: DateTime<Utc>, decay: &TimeDecayConfig) -> f64 {
    let age_hours = (now - timestamp).num_milliseconds().max(0) as f64 / 3_600_000.0;
    0.5_f64
        .powf(age_hours / decay.half_life_hours)
        .max(decay.minimum_weight)
}

/// Scales the whole batch by how often the agent interacts relative to 5/day.
#[must_use]
pub fn frequency_factor(interactions_per_day: f64) -> f64 {
    let ratio = interactions_per_day / OPTIMAL_DAILY_FREQUENCY;
    if ratio <= 1.0 {
        0.5 + 0.5 * ratio
    } else {
        (1.0 + 0.2 * ratio.ln()).min(1.5)
    }
}

/// Per-event multiplier applied on top of the composite weight.
#[must_use]
pub fn intensity_multiplier(event: &EvolutionEvent) -> f64 {
    1.0 + 0.2 * event.emotional_intensity + 0.15 * event.topic_complexity
}

/// Product of quality, mode, engagement and time decay for one event.
#[must_use]
pub fn composite_weight(event: &EvolutionEvent, config: &EvolutionConfig, now: DateTime<Utc>) -> f64 {
    event_quality_weight(event.message_count, event.duration_secs, event.satisfaction)
        * config.mode_multipliers.get(event.mode)
        * config.engagement_multipliers.get(event.engagement)
        * time_decay_weight(event.timestamp, now, &config.time_decay)
}

/// Turn a batch of events into unclamped per-trait deltas.
///
/// Events whose type has no weight row are skipped with one warning per
/// missing type. The summed deltas are scaled by [`frequency_factor`] and then
/// normalized so no trait exceeds [`MAX_BATCH_DELTA`].
#[must_use]
pub fn calculate(
    events: &[EvolutionEvent],
    pattern: &InteractionPattern,
    config: &EvolutionConfig,
    now: DateTime<Utc>,
) -> RawAdjustment {
    let mut deltas = TraitVector::zeros();
    let mut warnings = Vec::new();
    let mut missing: BTreeSet<InteractionType> = BTreeSet::new();
    let mut skipped_events = 0;

    for event in events {
        let Some(weights) = config.interaction_weights.get(&event.interaction_type) else {
            skipped_events += 1;
            if missing.insert(event.interaction_type) {
                warn!(
                    interaction_type = %event.interaction_type,
                    "No trait weights configured for interaction type; its events contribute nothing"
                );
                warnings.push(format!(
                    "no trait weights configured for interaction type '{}'; matching events were ignored",
                    event.interaction_type
                ));
            }
            continue;
        };

        let scale = composite_weight(event, config, now) * intensity_multiplier(event);
        for (kind, delta) in deltas.iter_mut() {
            *delta += weights[kind] * scale;
        }
    }

    deltas.scale(frequency_factor(pattern.interaction_frequency));

    let peak = deltas.max_abs();
    if peak > MAX_BATCH_DELTA {
        debug!(peak, "Normalizing raw deltas to the batch ceiling");
        deltas.scale(MAX_BATCH_DELTA / peak);
    }

    RawAdjustment {
        deltas,
        warnings,
        skipped_events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::{pattern, TimeWindow};
    use crate::test_utils::{casual_chat_event, fixed_now, EventBuilder};
    use anima_shared::{EngagementLevel, InteractionType, TraitKind};
    use chrono::Duration;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_event_quality_weight_factors() {
        // 5 messages, 300s, no satisfaction: 1.25 * (0.8 + 0.4/6)
        assert!(approx(event_quality_weight(5, 300.0, None), 1.25 * (0.8 + 0.4 / 6.0)));
        // Message and duration factors saturate.
        assert!(approx(event_quality_weight(1000, 100_000.0, None), 1.5 * 1.2));
        // Satisfaction spans 0.5x to 1.5x, overall clamp at 2.0.
        assert!(approx(event_quality_weight(1000, 100_000.0, Some(1.0)), 2.0));
        assert!(approx(event_quality_weight(0, 0.0, Some(0.0)), 0.4));
    }

    #[test]
    fn test_time_decay_halves_per_half_life() {
        let decay = TimeDecayConfig::default();
        let now = fixed_now();
        assert!(approx(time_decay_weight(now, now, &decay), 1.0));
        let one_half_life = now - Duration::hours(72);
        assert!(approx(time_decay_weight(one_half_life, now, &decay), 0.5));
        // Floor kicks in for very old events.
        let ancient = now - Duration::days(80);
        assert!(approx(time_decay_weight(ancient, now, &decay), decay.minimum_weight));
        // Future events count as age 0.
        assert!(approx(time_decay_weight(now + Duration::minutes(3), now, &decay), 1.0));
    }

    #[test]
    fn test_frequency_factor_curve() {
        assert!(approx(frequency_factor(0.0), 0.5));
        assert!(approx(frequency_factor(5.0), 1.0));
        assert!(approx(frequency_factor(2.5), 0.75));
        assert!(approx(frequency_factor(5.0 * std::f64::consts::E), 1.2));
        assert!(approx(frequency_factor(1e9), 1.5));
    }

    #[test]
    fn test_casual_chat_signs_follow_weight_row() {
        let config = EvolutionConfig::default();
        let now = fixed_now();
        let events = vec![casual_chat_event("evt-1", now)];
        let pattern = pattern::analyze(&events, TimeWindow::Weekly);
        let raw = calculate(&events, &pattern, &config, now);

        let row = &config.interaction_weights[&InteractionType::CasualChat];
        // quality 1.0833 * intensity 1.19 * frequency factor (1/7 per day)
        let expected_scale = (1.25 * (0.8 + 0.4 / 6.0)) * 1.19 * frequency_factor(1.0 / 7.0);
        for (kind, delta) in raw.deltas.iter() {
            assert!(approx(*delta, row[kind] * expected_scale), "{kind}: {delta}");
        }
        assert!(raw.deltas[TraitKind::Openness] > 0.0);
        assert!(raw.deltas[TraitKind::Neuroticism] < 0.0);
        assert!(raw.warnings.is_empty());
    }

    #[test]
    fn test_missing_weight_row_skips_event_and_warns_once() {
        let mut config = EvolutionConfig::default();
        config.interaction_weights.remove(&InteractionType::Learning);
        let now = fixed_now();
        let events = vec![
            EventBuilder::new("a", now).kind(InteractionType::Learning).build(),
            EventBuilder::new("b", now).kind(InteractionType::Learning).build(),
        ];
        let pattern = pattern::analyze(&events, TimeWindow::Weekly);
        let raw = calculate(&events, &pattern, &config, now);

        assert_eq!(raw.deltas, TraitVector::zeros());
        assert_eq!(raw.skipped_events, 2);
        assert_eq!(raw.warnings.len(), 1);
        assert!(raw.warnings[0].contains("learning"));
    }

    #[test]
    fn test_batch_ceiling_scales_uniformly() {
        let config = EvolutionConfig::default();
        let now = fixed_now();
        let events: Vec<_> = (0..200)
            .map(|i| {
                EventBuilder::new(&format!("e{i}"), now)
                    .kind(InteractionType::PlayfulBanter)
                    .engagement(EngagementLevel::Intense)
                    .build()
            })
            .collect();
        let pattern = pattern::analyze(&events, TimeWindow::Daily);
        let raw = calculate(&events, &pattern, &config, now);

        assert!(approx(raw.deltas.max_abs(), MAX_BATCH_DELTA));
        // Ratios between traits survive normalization.
        let row = &config.interaction_weights[&InteractionType::PlayfulBanter];
        let ratio = raw.deltas[TraitKind::Extraversion] / raw.deltas[TraitKind::Humor];
        assert!(approx(ratio, row[TraitKind::Extraversion] / row[TraitKind::Humor]));
    }
}
