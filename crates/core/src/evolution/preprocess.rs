use anima_shared::EvolutionEvent;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::EvolutionConfig;

/// Clock skew tolerated on event timestamps.
pub const MAX_FUTURE_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedEvents {
    /// Valid events, most recent first.
    pub events: Vec<EvolutionEvent>,
    /// Malformed events removed before analysis.
    pub dropped: usize,
    /// Valid events cut by `max_events_per_calculation`.
    pub truncated: usize,
    pub warnings: Vec<String>,
}

/// Why an event cannot be used, or `None` if it is fine.
#[must_use]
pub fn rejection_reason(
    event: &EvolutionEvent,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Option<&'static str> {
    if event.id.trim().is_empty() {
        return Some("empty event id");
    }
    if event.timestamp.timestamp_millis() <= 0 {
        return Some("timestamp at or before the Unix epoch");
    }
    if event.timestamp > now + Duration::seconds(MAX_FUTURE_SKEW_SECS) {
        return Some("timestamp too far in the future");
    }
    if now - event.timestamp > max_age {
        return Some("older than the maximum event age");
    }
    if !event.duration_secs.is_finite() || event.duration_secs < 0.0 {
        return Some("invalid duration");
    }
    if !is_unit(event.topic_complexity) {
        return Some("topic complexity outside [0, 1]");
    }
    if !is_unit(event.emotional_intensity) {
        return Some("emotional intensity outside [0, 1]");
    }
    if event.satisfaction.is_some_and(|s| !is_unit(s)) {
        return Some("satisfaction outside [0, 1]");
    }
    if event
        .metadata
        .response_time_ms
        .is_some_and(|ms| !ms.is_finite() || ms < 0.0)
    {
        return Some("invalid response time");
    }
    None
}

fn is_unit(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Filter, order and cap a raw event batch.
///
/// Ties on timestamp are broken by event id so the result, and any cache key
/// derived from it, does not depend on input order.
#[must_use]
pub fn prepare_events(events: &[EvolutionEvent], now: DateTime<Utc>, config: &EvolutionConfig) -> PreparedEvents {
    let max_age = Duration::days(i64::from(config.time_decay.max_event_age_days));
    let mut kept = Vec::with_capacity(events.len());
    let mut reasons: BTreeMap<&'static str, usize> = BTreeMap::new();

    for event in events {
        match rejection_reason(event, now, max_age) {
            Some(reason) => {
                debug!(event_id = %event.id, reason, "Dropping malformed event");
                *reasons.entry(reason).or_default() += 1;
            }
            None => kept.push(event.clone()),
        }
    }

    let dropped = reasons.values().sum();
    let mut warnings: Vec<String> = reasons
        .iter()
        .map(|(reason, count)| format!("dropped {count} event(s): {reason}"))
        .collect();

    kept.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

    let limit = config.performance.max_events_per_calculation as usize;
    let truncated = kept.len().saturating_sub(limit);
    if truncated > 0 {
        warnings.push(format!(
            "only the {limit} most recent of {} valid events were used",
            kept.len()
        ));
        kept.truncate(limit);
    }

    PreparedEvents {
        events: kept,
        dropped,
        truncated,
        warnings,
    }
}

/// Lenient ingestion: entries that do not deserialize are skipped and counted.
#[must_use]
pub fn events_from_json(values: Vec<serde_json::Value>) -> (Vec<EvolutionEvent>, usize) {
    let mut events = Vec::with_capacity(values.len());
    let mut rejected = 0;
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<EvolutionEvent>(value) {
            Ok(event) => events.push(event),
            Err(e) => {
                debug!(index, error = %e, "Skipping event that failed to deserialize");
                rejected += 1;
            }
        }
    }
    (events, rejected)
}
