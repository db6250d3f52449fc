use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[doc(hidden)]
pub use serde as __serde;

/// Declares a closed, fieldless enum with a stable snake_case name per variant.
///
/// The generated type gets `ALL`, `as_str`, `Display`, `FromStr` and string-based
/// serde impls, so it can be used both as a value and as a map key in JSON and TOML.
#[macro_export]
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} `{}` (expected one of: {})",
                        stringify!($name),
                        other,
                        [$($label),+].join(", ")
                    )),
                }
            }
        }

        impl $crate::__serde::Serialize for $name {
            fn serialize<S: $crate::__serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> $crate::__serde::Deserialize<'de> for $name {
            fn deserialize<D: $crate::__serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::std::result::Result<Self, D::Error> {
                let raw = <String as $crate::__serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(<D::Error as $crate::__serde::de::Error>::custom)
            }
        }
    };
}

// Declared after the macro so both modules see it in textual scope.
mod event;
mod traits;

pub use event::{
    AgentRecord, EngagementLevel, EventMetadata, EvolutionContext, EvolutionEvent,
    InteractionMode, InteractionType, SystemLoad,
};
pub use traits::{TraitKind, TraitMap, TraitVector, TRAIT_COUNT};

named_enum! {
    /// Accumulation period for the rolling change caps.
    pub enum LimitPeriod {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
    }
}

impl LimitPeriod {
    /// Length of the rolling window in days.
    #[must_use]
    pub const fn days(self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }
}

/// Cumulative absolute trait change already applied to an agent, per period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentChanges {
    pub daily: TraitVector,
    pub weekly: TraitVector,
    pub monthly: TraitVector,
}

impl RecentChanges {
    #[must_use]
    pub fn for_period(&self, period: LimitPeriod) -> &TraitVector {
        match period {
            LimitPeriod::Daily => &self.daily,
            LimitPeriod::Weekly => &self.weekly,
            LimitPeriod::Monthly => &self.monthly,
        }
    }

    pub fn for_period_mut(&mut self, period: LimitPeriod) -> &mut TraitVector {
        match period {
            LimitPeriod::Daily => &mut self.daily,
            LimitPeriod::Weekly => &mut self.weekly,
            LimitPeriod::Monthly => &mut self.monthly,
        }
    }

    /// Adds the absolute value of `deltas` to every period.
    pub fn accumulate(&mut self, deltas: &TraitVector) {
        for period in LimitPeriod::ALL {
            let totals = self.for_period_mut(*period);
            for (kind, delta) in deltas.iter() {
                totals[kind] += delta.abs();
            }
        }
    }

    /// Returns the first non-finite or negative accumulator, if any.
    #[must_use]
    pub fn first_invalid(&self) -> Option<(LimitPeriod, TraitKind, f64)> {
        LimitPeriod::ALL.iter().find_map(|period| {
            self.for_period(*period)
                .iter()
                .find(|(_, v)| !v.is_finite() || **v < 0.0)
                .map(|(kind, v)| (*period, kind, *v))
        })
    }
}

#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum AnimaError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Recent-change store error: {0}")]
    Store(String),
    #[error("Computation error: {0}")]
    Computation(String),
}

pub type AnimaResult<T> = std::result::Result<T, AnimaError>;

/// Read side of the rolling change accumulators kept by the host application.
///
/// The evolution engine only reads through this trait. Writing the accumulated
/// change back after a successful pass is the caller's job.
#[async_trait]
pub trait RecentChangeStore: Send + Sync {
    async fn recent_changes(&self, agent_id: &str) -> anyhow::Result<RecentChanges>;
}
