use anima_shared::TraitVector;

use crate::config::{AdaptiveDriftConfig, BaselineAnchoringConfig, DecayFunction};

/// Agents younger than this get the weakest pull.
const IMPRINT_PERIOD_DAYS: f64 = 7.0;

/// Age at which the pull reaches its mature strength.
const MATURITY_DAYS: f64 = 30.0;

// ══════════════════════════════════════════════════════════════
// Pure Functions
// ══════════════════════════════════════════════════════════════

/// Anchoring strength scaled by agent age.
///
/// Young agents are pulled less so early interactions can shape them; the
/// multiplier ramps from 0.6 to 1.0 between day 7 and day 30, then steps to 1.2.
#[must_use]
pub fn age_adjusted_strength(base_strength: f64, age_days: f64) -> f64 {
    let multiplier = if age_days < IMPRINT_PERIOD_DAYS {
        0.6
    } else if age_days < MATURITY_DAYS {
        let progress = (age_days - IMPRINT_PERIOD_DAYS) / (MATURITY_DAYS - IMPRINT_PERIOD_DAYS);
        0.6 + 0.4 * progress
    } else {
        1.2
    };
    base_strength * multiplier
}

/// How much of the pull survives at `age_days`, never below `minimum_influence`.
#[must_use]
pub fn time_decay_influence(age_days: f64, config: &BaselineAnchoringConfig) -> f64 {
    let x = age_days.max(0.0) / config.decay_scale_days;
    let influence = match config.decay_function {
        DecayFunction::Linear => 1.0 - x,
        DecayFunction::Exponential => (-x).exp(),
        DecayFunction::Logarithmic => 1.0 / (1.0 + x.ln_1p()),
    };
    influence.max(config.minimum_influence)
}

/// Drift term letting a settled agent keep a stable deviation from baseline.
#[must_use]
pub fn adaptive_shift(current: f64, baseline: f64, age_days: f64, adaptive: &AdaptiveDriftConfig) -> f64 {
    if age_days < adaptive.stabilization_period_days {
        return 0.0;
    }
    let offset = current - baseline;
    let distance = offset.abs();
    if distance <= adaptive.adaptation_threshold {
        return 0.0;
    }
    offset.signum() * (adaptive.learning_rate * distance).min(adaptive.max_baseline_shift)
}

/// anchored = raw + pull toward baseline + adaptive drift, per trait.
#[must_use]
pub fn anchor(
    raw: &TraitVector,
    current: &TraitVector,
    age_days: f64,
    config: &BaselineAnchoringConfig,
) -> TraitVector {
    let strength = age_adjusted_strength(config.anchoring_strength, age_days)
        * time_decay_influence(age_days, config);

    raw.map(|kind, delta| {
        let baseline = config.baseline[kind];
        let pull = -(current[kind] - baseline) * strength;
        delta + pull + adaptive_shift(current[kind], baseline, age_days, &config.adaptive)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_shared::TraitKind;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_age_adjusted_strength_ramps() {
        assert!(approx(age_adjusted_strength(0.1, 0.0), 0.06));
        assert!(approx(age_adjusted_strength(0.1, 6.9), 0.06));
        assert!(approx(age_adjusted_strength(0.1, 7.0), 0.06));
        assert!(approx(age_adjusted_strength(0.1, 18.5), 0.08));
        assert!(approx(age_adjusted_strength(0.1, 30.0), 0.12));
        assert!(approx(age_adjusted_strength(0.1, 400.0), 0.12));
    }

    #[test]
    fn test_decay_functions_respect_floor() {
        let mut config = BaselineAnchoringConfig {
            decay_scale_days: 100.0,
            minimum_influence: 0.3,
            ..BaselineAnchoringConfig::default()
        };

        config.decay_function = DecayFunction::Linear;
        assert!(approx(time_decay_influence(0.0, &config), 1.0));
        assert!(approx(time_decay_influence(50.0, &config), 0.5));
        assert!(approx(time_decay_influence(90.0, &config), 0.3));

        config.decay_function = DecayFunction::Exponential;
        assert!(approx(time_decay_influence(100.0, &config), (-1.0_f64).exp()));
        assert!(approx(time_decay_influence(1000.0, &config), 0.3));

        config.decay_function = DecayFunction::Logarithmic;
        let expected = 1.0 / (1.0 + 2.0_f64.ln());
        assert!(approx(time_decay_influence(100.0, &config), expected));
    }

    #[test]
    fn test_adaptive_shift_waits_for_stabilization() {
        let adaptive = AdaptiveDriftConfig::default();
        // Young agent: no drift even when far from baseline.
        assert_eq!(adaptive_shift(0.9, 0.5, 10.0, &adaptive), 0.0);
        // Inside the threshold: no drift.
        assert_eq!(adaptive_shift(0.55, 0.5, 60.0, &adaptive), 0.0);
        // Beyond the threshold: follows the agent, capped.
        assert!(approx(adaptive_shift(0.9, 0.5, 60.0, &adaptive), 0.004));
        assert!(approx(adaptive_shift(0.1, 0.5, 60.0, &adaptive), -0.004));

        let eager = AdaptiveDriftConfig {
            learning_rate: 1.0,
            ..AdaptiveDriftConfig::default()
        };
        assert!(approx(adaptive_shift(0.9, 0.5, 60.0, &eager), eager.max_baseline_shift));
    }

    #[test]
    fn test_anchor_pulls_toward_baseline() {
        let config = BaselineAnchoringConfig::default();
        let current = TraitVector::splat(0.5);
        let anchored = anchor(&TraitVector::zeros(), &current, 3.0, &config);

        // Openness baseline 0.6: pulled up. Neuroticism baseline 0.3: pulled down.
        assert!(anchored[TraitKind::Openness] > 0.0);
        assert!(anchored[TraitKind::Neuroticism] < 0.0);
        assert_eq!(anchored[TraitKind::Extraversion], 0.0);

        let strength = 0.06 * time_decay_influence(3.0, &config);
        assert!(approx(anchored[TraitKind::Openness], 0.1 * strength));
    }

    #[test]
    fn test_at_baseline_only_raw_remains() {
        let config = BaselineAnchoringConfig::default();
        let mut raw = TraitVector::zeros();
        raw[TraitKind::Curiosity] = 0.02;
        let anchored = anchor(&raw, &config.baseline, 120.0, &config);
        assert!(approx(anchored[TraitKind::Curiosity], 0.02));
        assert!(approx(anchored.sum_abs(), 0.02));
    }
}
