use anima_shared::{
    AnimaError, EvolutionContext, EvolutionEvent, RecentChangeStore, TraitVector,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::preprocess::{prepare_events, PreparedEvents};
use super::types::{
    EvolutionRequest, EvolutionResult, EvolutionStats, InteractionPattern, PersonalityAdjustment,
    ResultMetadata, TimeWindow, ALGORITHM_VERSION,
};
use super::{adjustment, anchoring, limiter, pattern};
use crate::clock::{Clock, SystemClock};
use crate::config::EvolutionConfig;

// ══════════════════════════════════════════════════════════════
// Evolution Engine
// ══════════════════════════════════════════════════════════════

/// Window plus the ordered event ids. Ids are free-form, so they are kept whole rather than joined.
type PatternKey = (TimeWindow, Vec<String>);

struct CachedPattern {
    pattern: InteractionPattern,
    stored_at: DateTime<Utc>,
}

/// Outcome of one successful pipeline pass, before it is wrapped in a result.
struct PipelineRun {
    adjustment: PersonalityAdjustment,
    new_traits: TraitVector,
    pattern: InteractionPattern,
    events_processed: usize,
    events_dropped: usize,
    /// `None` when the cache was not consulted.
    cache_hit: Option<bool>,
    warnings: Vec<String>,
}

/// Orchestrates the pipeline and owns the only mutable state in it.
///
/// The pattern cache and statistics are per-process and best-effort. Calls
/// for different agents may run concurrently. Calls for the same agent are
/// not serialized here; each call works on the trait snapshot it was given,
/// so callers writing results back must hold their own per-agent lock.
pub struct EvolutionEngine {
    config: Arc<EvolutionConfig>,
    store: Arc<dyn RecentChangeStore>,
    clock: Arc<dyn Clock>,
    pattern_cache: DashMap<PatternKey, CachedPattern>,
    stats: RwLock<EvolutionStats>,
}

impl EvolutionEngine {
    /// The config is used as given; run [`EvolutionConfig::validated`] first to reject bad tables.
    pub fn new(config: EvolutionConfig, store: Arc<dyn RecentChangeStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EvolutionConfig, store: Arc<dyn RecentChangeStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            clock,
            pattern_cache: DashMap::new(),
            stats: RwLock::new(EvolutionStats::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    // ── Processing ──

    /// Run the full pipeline for one agent. Never fails; problems are reported in the result.
    pub async fn process_evolution(
        &self,
        agent_id: &str,
        actor_id: Option<&str>,
        events: &[EvolutionEvent],
        current_traits: &TraitVector,
        context: &EvolutionContext,
    ) -> EvolutionResult {
        let started = Instant::now();
        let now = self.clock.now();
        let actor_id = actor_id
            .map(str::to_string)
            .or_else(|| context.actor_id.clone());

        debug!(agent_id = %agent_id, events = events.len(), "Processing personality evolution");

        let outcome = self.run_pipeline(agent_id, events, current_traits, context, now).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let (result, cache_hit) = match outcome {
            Ok(run) => {
                info!(
                    agent_id = %agent_id,
                    events_processed = run.events_processed,
                    changed_traits = run.adjustment.limited_delta.count_changed(0.0),
                    confidence = run.adjustment.confidence,
                    "Personality evolution computed"
                );
                let cache_hit = run.cache_hit;
                let result = EvolutionResult {
                    success: true,
                    result_id: Uuid::new_v4(),
                    agent_id: agent_id.to_string(),
                    actor_id,
                    adjustment: run.adjustment,
                    new_traits: run.new_traits,
                    pattern: run.pattern,
                    metadata: ResultMetadata {
                        processing_time_ms: elapsed_ms,
                        events_received: events.len(),
                        events_processed: run.events_processed,
                        events_dropped: run.events_dropped,
                        cache_hit: cache_hit.unwrap_or(false),
                        calculated_at: now,
                    },
                    algorithm_version: ALGORITHM_VERSION.to_string(),
                    warnings: run.warnings,
                    errors: Vec::new(),
                };
                (result, cache_hit)
            }
            Err(errors) => {
                for err in &errors {
                    match err {
                        AnimaError::Validation(_) => warn!(agent_id = %agent_id, error = %err, "Evolution request rejected"),
                        _ => error!(agent_id = %agent_id, error = %err, "Evolution pipeline failed"),
                    }
                }
                let result = EvolutionResult {
                    success: false,
                    result_id: Uuid::new_v4(),
                    agent_id: agent_id.to_string(),
                    actor_id,
                    adjustment: PersonalityAdjustment::neutral(),
                    new_traits: *current_traits,
                    pattern: InteractionPattern::empty(self.config.analysis_window),
                    metadata: ResultMetadata {
                        processing_time_ms: elapsed_ms,
                        events_received: events.len(),
                        events_processed: 0,
                        events_dropped: 0,
                        cache_hit: false,
                        calculated_at: now,
                    },
                    algorithm_version: ALGORITHM_VERSION.to_string(),
                    warnings: Vec::new(),
                    errors: errors.iter().map(ToString::to_string).collect(),
                };
                (result, None)
            }
        };

        self.record_stats(result.success, cache_hit, elapsed_ms, now).await;
        result
    }

    async fn run_pipeline(
        &self,
        agent_id: &str,
        events: &[EvolutionEvent],
        current: &TraitVector,
        context: &EvolutionContext,
        now: DateTime<Utc>,
    ) -> Result<PipelineRun, Vec<AnimaError>> {
        let mut warnings = validate_request(agent_id, events, current, context)?;

        let PreparedEvents {
            events: usable,
            dropped,
            warnings: prep_warnings,
            ..
        } = prepare_events(events, now, &self.config);
        warnings.extend(prep_warnings);

        if usable.is_empty() {
            warnings.push("no usable events after preprocessing; traits left unchanged".to_string());
            return Ok(PipelineRun {
                adjustment: PersonalityAdjustment::neutral(),
                new_traits: *current,
                pattern: InteractionPattern::empty(self.config.analysis_window),
                events_processed: 0,
                events_dropped: dropped,
                cache_hit: None,
                warnings,
            });
        }

        let (pattern, cache_hit) = self.pattern_for(&usable, now);

        let raw = adjustment::calculate(&usable, &pattern, &self.config, now);
        warnings.extend(raw.warnings);

        let age_days = context.agent_age_days(now).unwrap_or(0.0);
        let anchored = anchoring::anchor(&raw.deltas, current, age_days, &self.config.baseline_anchoring);
        if !anchored.all_finite() {
            return Err(vec![AnimaError::Computation(
                "anchored deltas are not finite".to_string(),
            )]);
        }

        let recent = self
            .store
            .recent_changes(agent_id)
            .await
            .map_err(|e| vec![AnimaError::Store(format!("{e:#}"))])?;
        if let Some((period, kind, value)) = recent.first_invalid() {
            return Err(vec![AnimaError::Store(format!(
                "{period} accumulator for {kind} is invalid: {value}"
            ))]);
        }

        let limited = limiter::apply_limits(&anchored, current, &recent, &self.config.limits);
        let new_traits = current.map(|kind, value| (value + limited.deltas[kind]).clamp(0.0, 1.0));

        let confidence = confidence_score(usable.len(), &pattern, limited.applied.len());
        let stability = stability_score(&limited.deltas);
        if stability < self.config.limits.global.stability_threshold {
            warnings.push(format!(
                "stability score {stability:.3} is below threshold {:.3}",
                self.config.limits.global.stability_threshold
            ));
        }

        if self.config.logging.log_adjustments {
            info!(
                agent_id = %agent_id,
                raw = ?raw.deltas,
                limited = ?limited.deltas,
                applied_limits = limited.applied.len(),
                "Adjustment detail"
            );
        }

        Ok(PipelineRun {
            adjustment: PersonalityAdjustment {
                raw_delta: raw.deltas,
                anchored_delta: anchored,
                limited_delta: limited.deltas,
                applied_limits: limited.applied,
                confidence,
                stability_score: stability,
            },
            new_traits,
            pattern,
            events_processed: usable.len(),
            events_dropped: dropped,
            cache_hit,
            warnings,
        })
    }

    /// Process independent requests with at most `performance.batch_size` in flight.
    ///
    /// Results come back in request order.
    pub async fn process_batch(&self, requests: &[EvolutionRequest]) -> Vec<EvolutionResult> {
        let mut seen = HashSet::new();
        for request in requests {
            if !seen.insert(request.agent_id.as_str()) {
                warn!(
                    agent_id = %request.agent_id,
                    "Batch holds several requests for one agent; each sees the same trait snapshot"
                );
            }
        }

        let limit = self.config.performance.batch_size.max(1) as usize;
        stream::iter(requests.iter().map(|request| {
            self.process_evolution(
                &request.agent_id,
                request.actor_id.as_deref(),
                &request.events,
                &request.current_traits,
                &request.context,
            )
        }))
        .buffered(limit)
        .collect()
        .await
    }

    /// Pattern for a batch without touching traits, cache or statistics.
    #[must_use]
    pub fn analyze_pattern(&self, events: &[EvolutionEvent], window: Option<TimeWindow>) -> InteractionPattern {
        let prepared = prepare_events(events, self.clock.now(), &self.config);
        pattern::analyze(&prepared.events, window.unwrap_or(self.config.analysis_window))
    }

    // ── Pattern Cache ──

    fn cache_key(events: &[EvolutionEvent], window: TimeWindow) -> PatternKey {
        (window, events.iter().map(|event| event.id.clone()).collect())
    }

    fn pattern_for(&self, events: &[EvolutionEvent], now: DateTime<Utc>) -> (InteractionPattern, Option<bool>) {
        let window = self.config.analysis_window;
        if !self.config.performance.cache_enabled {
            return (pattern::analyze(events, window), None);
        }

        let key = Self::cache_key(events, window);
        let ttl = Duration::seconds(i64::from(self.config.performance.cache_ttl_secs));
        if let Some(entry) = self.pattern_cache.get(&key) {
            if now - entry.stored_at < ttl {
                debug!(events = events.len(), "Pattern cache hit");
                return (entry.pattern.clone(), Some(true));
            }
        }

        let computed = pattern::analyze(events, window);
        self.make_room(now, ttl);
        self.pattern_cache.insert(
            key,
            CachedPattern {
                pattern: computed.clone(),
                stored_at: now,
            },
        );
        (computed, Some(false))
    }

    /// Drop expired entries, then the oldest ones until an insert fits.
    fn make_room(&self, now: DateTime<Utc>, ttl: Duration) {
        self.pattern_cache.retain(|_, entry| now - entry.stored_at < ttl);
        let capacity = self.config.performance.cache_max_entries.max(1) as usize;
        while self.pattern_cache.len() >= capacity {
            let oldest = self
                .pattern_cache
                .iter()
                .min_by_key(|entry| entry.value().stored_at)
                .map(|entry| entry.key().clone());
            let Some(key) = oldest else { break };
            self.pattern_cache.remove(&key);
        }
    }

    pub fn clear_cache(&self) {
        self.pattern_cache.clear();
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.pattern_cache.len()
    }

    // ── Statistics ──

    async fn record_stats(&self, success: bool, cache_hit: Option<bool>, elapsed_ms: f64, now: DateTime<Utc>) {
        let mut stats = self.stats.write().await;
        stats.total_calculations += 1;
        if success {
            stats.successful_calculations += 1;
        } else {
            stats.error_count += 1;
        }
        match cache_hit {
            Some(true) => stats.cache_hits += 1,
            Some(false) => stats.cache_misses += 1,
            None => {}
        }
        let n = stats.total_calculations as f64;
        stats.average_processing_time_ms += (elapsed_ms - stats.average_processing_time_ms) / n;
        stats.last_calculation_at = Some(now);
    }

    pub async fn stats(&self) -> EvolutionStats {
        self.stats.read().await.clone()
    }
}

/// All request problems at once, or the non-fatal warnings.
fn validate_request(
    agent_id: &str,
    events: &[EvolutionEvent],
    current: &TraitVector,
    context: &EvolutionContext,
) -> Result<Vec<String>, Vec<AnimaError>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if agent_id.trim().is_empty() {
        errors.push(AnimaError::Validation("agent id must not be empty".to_string()));
    }
    if events.is_empty() {
        errors.push(AnimaError::Validation("no events supplied".to_string()));
    }
    if let Some((kind, value)) = current.first_outside(0.0, 1.0) {
        errors.push(AnimaError::Validation(format!(
            "current trait {kind} = {value} is outside [0, 1]"
        )));
    }
    match &context.agent {
        None => errors.push(AnimaError::Validation(
            "context is missing the agent record".to_string(),
        )),
        Some(agent) if agent.id != agent_id => warnings.push(format!(
            "context agent '{}' does not match requested agent '{agent_id}'",
            agent.id
        )),
        Some(_) => {}
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(errors)
    }
}

// ══════════════════════════════════════════════════════════════
// Scores
// ══════════════════════════════════════════════════════════════

/// Heuristic trust in an adjustment: more evidence raises it, each limiter intervention lowers it.
#[must_use]
pub fn confidence_score(event_count: usize, pattern: &InteractionPattern, applied_limits: usize) -> f64 {
    let volume = (event_count as f64 / 10.0).min(1.0);
    (0.5 + volume * 0.2 + pattern.average_engagement * 0.2 + pattern.topic_diversity * 0.1
        - applied_limits as f64 * 0.05)
        .clamp(0.0, 1.0)
}

/// 1.0 means nothing moved.
#[must_use]
pub fn stability_score(limited: &TraitVector) -> f64 {
    (1.0 - limited.mean_abs()).clamp(0.0, 1.0)
}
