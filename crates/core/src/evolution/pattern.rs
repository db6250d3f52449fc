use anima_shared::EvolutionEvent;
use chrono::Datelike;
use std::collections::{BTreeMap, HashSet};

use super::types::{InteractionPattern, Season, TimeOfDay, TimeWindow};

/// Tag diversity saturates once this many events are in the batch.
const DIVERSITY_SAMPLE_CAP: usize = 20;

// ══════════════════════════════════════════════════════════════
// Pure Functions
// ══════════════════════════════════════════════════════════════

/// Reduce a batch of events into an [`InteractionPattern`].
///
/// Input order does not matter. An empty batch yields [`InteractionPattern::empty`].
#[must_use]
pub fn analyze(events: &[EvolutionEvent], window: TimeWindow) -> InteractionPattern {
    let mut pattern = InteractionPattern::empty(window);
    if events.is_empty() {
        return pattern;
    }

    let n = events.len();
    let total = n as f64;
    pattern.total_interactions = n;
    pattern.interaction_frequency = total / window.days();

    pattern.type_distribution = distribution(events.iter().map(|e| e.interaction_type), total);
    pattern.mode_distribution = distribution(events.iter().map(|e| e.mode), total);
    pattern.engagement_distribution = distribution(events.iter().map(|e| e.engagement), total);

    pattern.average_engagement = events.iter().map(|e| e.engagement.score()).sum::<f64>() / total;
    pattern.average_duration_secs = events.iter().map(|e| e.duration_secs).sum::<f64>() / total;
    pattern.average_message_count =
        events.iter().map(|e| f64::from(e.message_count)).sum::<f64>() / total;
    pattern.average_complexity = events.iter().map(|e| e.topic_complexity).sum::<f64>() / total;
    pattern.average_emotional_intensity =
        events.iter().map(|e| e.emotional_intensity).sum::<f64>() / total;
    pattern.average_context_switches =
        events.iter().map(|e| f64::from(e.metadata.context_switches)).sum::<f64>() / total;

    let satisfactions: Vec<f64> = events.iter().filter_map(|e| e.satisfaction).collect();
    if !satisfactions.is_empty() {
        pattern.average_satisfaction = Some(mean(&satisfactions));
    }

    // Trends need chronological order; the caller's order is usually newest first.
    let mut chronological: Vec<&EvolutionEvent> = events.iter().collect();
    chronological.sort_by_key(|e| e.timestamp);

    let engagement: Vec<f64> = chronological.iter().map(|e| e.engagement.score()).collect();
    let complexity: Vec<f64> = chronological.iter().map(|e| e.topic_complexity).collect();
    let satisfaction: Vec<f64> = chronological.iter().filter_map(|e| e.satisfaction).collect();
    pattern.engagement_trend = half_trend(&engagement);
    pattern.complexity_trend = half_trend(&complexity);
    pattern.satisfaction_trend = half_trend(&satisfaction);

    let response_times: Vec<f64> = events
        .iter()
        .filter_map(|e| e.metadata.response_time_ms)
        .collect();
    pattern.response_time_variance = population_variance(&response_times);

    let unique_tags: HashSet<&str> = events
        .iter()
        .flat_map(|e| e.metadata.tags.iter().map(String::as_str))
        .collect();
    pattern.topic_diversity = (unique_tags.len() as f64 / n.min(DIVERSITY_SAMPLE_CAP) as f64).min(1.0);

    pattern.time_of_day_distribution =
        distribution(events.iter().map(|e| TimeOfDay::of(e.timestamp)), total);
    pattern.seasonal_distribution = distribution(events.iter().map(|e| Season::of(e.timestamp)), total);
    for event in events {
        let day = event.timestamp.weekday().num_days_from_monday() as usize;
        pattern.weekday_distribution[day] += 1.0 / total;
    }

    pattern
}

/// Difference of means between the later and earlier half of `values`.
///
/// `values` must already be in chronological order. The earlier half takes
/// `len / 2` elements, so with an odd count the middle element belongs to
/// the later half. Fewer than two values yield 0.
#[must_use]
pub fn half_trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (first, second) = values.split_at(values.len() / 2);
    mean(second) - mean(first)
}

/// Population variance. Empty input yields 0.
#[must_use]
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn distribution<K: Ord>(keys: impl Iterator<Item = K>, total: f64) -> BTreeMap<K, f64> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0.0) += 1.0;
    }
    for share in counts.values_mut() {
        *share /= total;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{casual_chat_event, fixed_now, EventBuilder};
    use anima_shared::{EngagementLevel, InteractionMode, InteractionType};
    use chrono::{Duration, TimeZone, Utc};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_batch_is_all_zero() {
        let pattern = analyze(&[], TimeWindow::Monthly);
        assert_eq!(pattern, InteractionPattern::empty(TimeWindow::Monthly));
        assert_eq!(pattern.interaction_frequency, 0.0);
        assert!(pattern.type_distribution.is_empty());
    }

    #[test]
    fn test_frequency_uses_window_length() {
        let events = vec![casual_chat_event("a", fixed_now()), casual_chat_event("b", fixed_now())];
        assert!(approx(analyze(&events, TimeWindow::Daily).interaction_frequency, 2.0));
        assert!(approx(analyze(&events, TimeWindow::Weekly).interaction_frequency, 2.0 / 7.0));
        assert!(approx(analyze(&events, TimeWindow::Quarterly).interaction_frequency, 2.0 / 90.0));
    }

    #[test]
    fn test_distributions_sum_to_one() {
        let now = fixed_now();
        let events = vec![
            EventBuilder::new("a", now).kind(InteractionType::Learning).mode(InteractionMode::Voice).build(),
            EventBuilder::new("b", now).kind(InteractionType::Learning).build(),
            EventBuilder::new("c", now).kind(InteractionType::Storytelling).engagement(EngagementLevel::High).build(),
        ];
        let pattern = analyze(&events, TimeWindow::Weekly);

        for dist in [
            pattern.type_distribution.values().sum::<f64>(),
            pattern.mode_distribution.values().sum::<f64>(),
            pattern.engagement_distribution.values().sum::<f64>(),
            pattern.time_of_day_distribution.values().sum::<f64>(),
            pattern.seasonal_distribution.values().sum::<f64>(),
            pattern.weekday_distribution.iter().sum::<f64>(),
        ] {
            assert!(approx(dist, 1.0), "distribution sums to {dist}");
        }
        assert!(approx(pattern.type_distribution[&InteractionType::Learning], 2.0 / 3.0));
        assert_eq!(pattern.dominant_interaction_type(), Some(InteractionType::Learning));
    }

    #[test]
    fn test_trends_follow_chronology_not_input_order() {
        let now = fixed_now();
        // Newest first, engagement rising over time.
        let events = vec![
            EventBuilder::new("late", now).engagement(EngagementLevel::Intense).complexity(0.9).build(),
            EventBuilder::new("early", now - Duration::hours(5)).engagement(EngagementLevel::Low).complexity(0.1).build(),
        ];
        let pattern = analyze(&events, TimeWindow::Weekly);
        assert!(approx(pattern.engagement_trend, 0.75));
        assert!(approx(pattern.complexity_trend, 0.8));
    }

    #[test]
    fn test_satisfaction_trend_needs_two_reports() {
        let now = fixed_now();
        let one = vec![
            EventBuilder::new("a", now).satisfaction(0.9).build(),
            EventBuilder::new("b", now - Duration::hours(1)).build(),
        ];
        let pattern = analyze(&one, TimeWindow::Weekly);
        assert_eq!(pattern.satisfaction_trend, 0.0);
        assert_eq!(pattern.average_satisfaction, Some(0.9));

        let two = vec![
            EventBuilder::new("a", now).satisfaction(0.9).build(),
            EventBuilder::new("b", now - Duration::hours(1)).satisfaction(0.4).build(),
        ];
        assert!(approx(analyze(&two, TimeWindow::Weekly).satisfaction_trend, 0.5));
    }

    #[test]
    fn test_half_trend_odd_count_puts_middle_in_later_half() {
        assert!(approx(half_trend(&[0.0, 1.0, 1.0]), 1.0));
        assert_eq!(half_trend(&[0.7]), 0.0);
        assert_eq!(half_trend(&[]), 0.0);
    }

    #[test]
    fn test_topic_diversity_caps_at_one() {
        let now = fixed_now();
        let events = vec![
            EventBuilder::new("a", now).tags(&["music", "travel", "food"]).build(),
            EventBuilder::new("b", now).tags(&["music"]).build(),
        ];
        assert!(approx(analyze(&events, TimeWindow::Weekly).topic_diversity, 1.0));

        let sparse: Vec<_> = (0..4)
            .map(|i| EventBuilder::new(&format!("e{i}"), now).tags(&["music"]).build())
            .collect();
        assert!(approx(analyze(&sparse, TimeWindow::Weekly).topic_diversity, 0.25));
    }

    #[test]
    fn test_response_time_variance_is_population_variance() {
        let now = fixed_now();
        let events = vec![
            EventBuilder::new("a", now).response_time_ms(100.0).build(),
            EventBuilder::new("b", now).response_time_ms(300.0).build(),
            EventBuilder::new("c", now).build(),
        ];
        assert!(approx(analyze(&events, TimeWindow::Weekly).response_time_variance, 10_000.0));
        assert!(approx(population_variance(&[5.0]), 0.0));
    }

    #[test]
    fn test_time_histograms() {
        // 2026-10-18 is a Sunday.
        let sunday_night = Utc.with_ymd_and_hms(2026, 10, 18, 2, 0, 0).unwrap();
        let events = vec![casual_chat_event("a", sunday_night)];
        let pattern = analyze(&events, TimeWindow::Weekly);
        assert_eq!(pattern.weekday_distribution[6], 1.0);
        assert_eq!(pattern.time_of_day_distribution[&TimeOfDay::Night], 1.0);
        assert_eq!(pattern.seasonal_distribution[&Season::Autumn], 1.0);
    }
}
