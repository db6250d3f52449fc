use anima_shared::{LimitPeriod, RecentChanges, TraitKind, TraitMap, TraitVector};

use super::types::{AppliedLimit, LimitKind, CHANGE_EPSILON, MINIMUM_TRAIT_CHANGE};
use crate::config::{EvolutionLimits, PeriodLimit, TraitElasticity};

#[derive(Debug, Clone, PartialEq)]
pub struct LimitOutcome {
    pub deltas: TraitVector,
    /// In the order the cascade applied them.
    pub applied: Vec<AppliedLimit>,
}

// ══════════════════════════════════════════════════════════════
// Cascade
// ══════════════════════════════════════════════════════════════

/// Run the fixed limiting cascade over anchored deltas.
///
/// Every step can only shrink a delta's magnitude, and no step flips its sign.
/// The result depends on nothing but the arguments.
#[must_use]
pub fn apply_limits(
    anchored: &TraitVector,
    current: &TraitVector,
    recent: &RecentChanges,
    limits: &EvolutionLimits,
) -> LimitOutcome {
    let mut deltas = *anchored;
    let mut applied = Vec::new();

    cap_simultaneous_changes(&mut deltas, limits.global.max_simultaneous_changes as usize, &mut applied);
    apply_elasticity(&mut deltas, &limits.trait_elasticity);
    clip_to_bounds(&mut deltas, current, &limits.trait_elasticity, &mut applied);
    for period in LimitPeriod::ALL {
        cap_period(&mut deltas, recent.for_period(*period), limits.period(*period), *period, &mut applied);
    }
    apply_emergency_brake(&mut deltas, limits.global.emergency_brake, &mut applied);
    snap_dead_zone(&mut deltas);

    LimitOutcome { deltas, applied }
}

/// Keep only the `max_changes` largest deltas. Ties go to the earlier trait.
pub fn cap_simultaneous_changes(deltas: &mut TraitVector, max_changes: usize, applied: &mut Vec<AppliedLimit>) {
    let mut changing: Vec<TraitKind> = deltas
        .iter()
        .filter(|(_, d)| d.abs() > CHANGE_EPSILON)
        .map(|(kind, _)| kind)
        .collect();
    if changing.len() <= max_changes {
        return;
    }

    changing.sort_by(|a, b| {
        deltas[*b]
            .abs()
            .total_cmp(&deltas[*a].abs())
            .then_with(|| a.cmp(b))
    });
    for kind in &changing[max_changes..] {
        deltas[*kind] = 0.0;
    }
    applied.push(AppliedLimit::global(LimitKind::SimultaneousChanges));
}

pub fn apply_elasticity(deltas: &mut TraitVector, elasticity: &TraitMap<TraitElasticity>) {
    for (kind, delta) in deltas.iter_mut() {
        let e = &elasticity[kind];
        *delta *= (1.0 - e.change_resistance.clamp(0.0, 1.0)) * e.volatility.clamp(0.0, 1.0);
    }
}

/// Clip so `current + delta` stays in `[min_value, max_value]`.
///
/// A trait already outside its bounds may only move back toward them.
pub fn clip_to_bounds(
    deltas: &mut TraitVector,
    current: &TraitVector,
    elasticity: &TraitMap<TraitElasticity>,
    applied: &mut Vec<AppliedLimit>,
) {
    for (kind, delta) in deltas.iter_mut() {
        let bounds = &elasticity[kind];
        let target = current[kind] + *delta;
        let clipped = if *delta > 0.0 && target > bounds.max_value {
            (bounds.max_value - current[kind]).max(0.0)
        } else if *delta < 0.0 && target < bounds.min_value {
            (bounds.min_value - current[kind]).min(0.0)
        } else {
            continue;
        };
        *delta = clipped;
        applied.push(AppliedLimit::for_trait(LimitKind::MinMaxValue, kind));
    }
}

const fn period_limit_kinds(period: LimitPeriod) -> (LimitKind, LimitKind) {
    match period {
        LimitPeriod::Daily => (LimitKind::DailyLimit, LimitKind::DailyCumulative),
        LimitPeriod::Weekly => (LimitKind::WeeklyLimit, LimitKind::WeeklyCumulative),
        LimitPeriod::Monthly => (LimitKind::MonthlyLimit, LimitKind::MonthlyCumulative),
    }
}

/// Per-trait headroom first, then the cross-trait cumulative ceiling.
pub fn cap_period(
    deltas: &mut TraitVector,
    recent: &TraitVector,
    cap: &PeriodLimit,
    period: LimitPeriod,
    applied: &mut Vec<AppliedLimit>,
) {
    let (per_trait, cumulative) = period_limit_kinds(period);

    for (kind, delta) in deltas.iter_mut() {
        let headroom = (cap.max_change - recent[kind].abs()).max(0.0);
        if delta.abs() > headroom {
            *delta = headroom.copysign(*delta);
            applied.push(AppliedLimit::for_trait(per_trait, kind));
        }
    }

    let used = recent.sum_abs();
    let proposed = deltas.sum_abs();
    if proposed > 0.0 && used + proposed > cap.cumulative_max {
        let remaining = (cap.cumulative_max - used).max(0.0);
        deltas.scale(remaining / proposed);
        applied.push(AppliedLimit::global(cumulative));
    }
}

pub fn apply_emergency_brake(deltas: &mut TraitVector, ceiling: f64, applied: &mut Vec<AppliedLimit>) {
    for (kind, delta) in deltas.iter_mut() {
        if delta.abs() > ceiling {
            *delta = ceiling.copysign(*delta);
            applied.push(AppliedLimit::for_trait(LimitKind::EmergencyBrake, kind));
        }
    }
}

pub fn snap_dead_zone(deltas: &mut TraitVector) {
    for (_, delta) in deltas.iter_mut() {
        if delta.abs() < MINIMUM_TRAIT_CHANGE {
            *delta = 0.0;
        }
    }
}
