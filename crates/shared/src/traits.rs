use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Number of personality dimensions tracked per agent.
pub const TRAIT_COUNT: usize = 10;

named_enum! {
    /// The fixed set of personality dimensions. Values live in [0.0, 1.0].
    pub enum TraitKind {
        Openness => "openness",
        Conscientiousness => "conscientiousness",
        Extraversion => "extraversion",
        Agreeableness => "agreeableness",
        Neuroticism => "neuroticism",
        Playfulness => "playfulness",
        Empathy => "empathy",
        Curiosity => "curiosity",
        Humor => "humor",
        Assertiveness => "assertiveness",
    }
}

const _: () = assert!(TraitKind::ALL.len() == TRAIT_COUNT);

impl TraitKind {
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One value per [`TraitKind`].
///
/// Backed by a fixed array so a table can never silently omit a trait.
/// Serialized as a map keyed by trait name; deserialization rejects
/// missing, duplicate, or unknown traits.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TraitMap<T> {
    values: [T; TRAIT_COUNT],
}

/// A full personality vector.
pub type TraitVector = TraitMap<f64>;

impl<T> TraitMap<T> {
    #[must_use]
    pub const fn from_array(values: [T; TRAIT_COUNT]) -> Self {
        Self { values }
    }

    pub fn from_fn(mut f: impl FnMut(TraitKind) -> T) -> Self {
        Self {
            values: std::array::from_fn(|i| f(TraitKind::ALL[i])),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TraitKind, &T)> {
        TraitKind::ALL.iter().copied().zip(self.values.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TraitKind, &mut T)> {
        TraitKind::ALL.iter().copied().zip(self.values.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(TraitKind, &T) -> U) -> TraitMap<U> {
        TraitMap::from_fn(|kind| f(kind, &self.values[kind.index()]))
    }
}

impl<T: Copy> TraitMap<T> {
    #[must_use]
    pub fn splat(value: T) -> Self {
        Self {
            values: [value; TRAIT_COUNT],
        }
    }
}

impl TraitMap<f64> {
    #[must_use]
    pub fn zeros() -> Self {
        Self::splat(0.0)
    }

    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    #[must_use]
    pub fn sum_abs(&self) -> f64 {
        self.values.iter().map(|v| v.abs()).sum()
    }

    #[must_use]
    pub fn mean_abs(&self) -> f64 {
        self.sum_abs() / TRAIT_COUNT as f64
    }

    /// Number of traits whose magnitude exceeds `epsilon`.
    #[must_use]
    pub fn count_changed(&self, epsilon: f64) -> usize {
        self.values.iter().filter(|v| v.abs() > epsilon).count()
    }

    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.values {
            *v *= factor;
        }
    }

    #[must_use]
    pub fn clamped(&self, min: f64, max: f64) -> Self {
        self.map(|_, v| v.clamp(min, max))
    }

    /// First trait that is non-finite or outside `[min, max]`.
    #[must_use]
    pub fn first_outside(&self, min: f64, max: f64) -> Option<(TraitKind, f64)> {
        self.iter()
            .find(|(_, v)| !v.is_finite() || **v < min || **v > max)
            .map(|(kind, v)| (kind, *v))
    }

    #[must_use]
    pub fn all_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl<T> Index<TraitKind> for TraitMap<T> {
    type Output = T;

    fn index(&self, kind: TraitKind) -> &T {
        &self.values[kind.index()]
    }
}

impl<T> IndexMut<TraitKind> for TraitMap<T> {
    fn index_mut(&mut self, kind: TraitKind) -> &mut T {
        &mut self.values[kind.index()]
    }
}

impl<T: Serialize> Serialize for TraitMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(TRAIT_COUNT))?;
        for (kind, value) in self.iter() {
            map.serialize_entry(kind.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for TraitMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TraitMapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for TraitMapVisitor<T> {
            type Value = TraitMap<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map with exactly one entry per personality trait")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut slots: [Option<T>; TRAIT_COUNT] = std::array::from_fn(|_| None);
                while let Some(key) = access.next_key::<String>()? {
                    let kind: TraitKind = key.parse().map_err(<A::Error as de::Error>::custom)?;
                    if slots[kind.index()].is_some() {
                        return Err(de::Error::custom(format_args!("duplicate trait `{kind}`")));
                    }
                    slots[kind.index()] = Some(access.next_value()?);
                }

                let mut values = Vec::with_capacity(TRAIT_COUNT);
                for (kind, slot) in TraitKind::ALL.iter().zip(slots) {
                    match slot {
                        Some(value) => values.push(value),
                        None => {
                            return Err(de::Error::custom(format_args!("missing trait `{kind}`")))
                        }
                    }
                }
                let values: [T; TRAIT_COUNT] = values
                    .try_into()
                    .map_err(|_| <A::Error as de::Error>::custom("trait table size mismatch"))?;
                Ok(TraitMap { values })
            }
        }

        deserializer.deserialize_map(TraitMapVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_follows_declaration_order() {
        for (i, kind) in TraitKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        let map = TraitMap::from_fn(|kind| kind.index());
        assert_eq!(map[TraitKind::Humor], TraitKind::Humor.index());
    }

    #[test]
    fn test_serialize_as_named_map() {
        let mut vector = TraitVector::splat(0.5);
        vector[TraitKind::Neuroticism] = 0.25;
        let json = serde_json::to_value(vector).unwrap();
        assert_eq!(json["neuroticism"], 0.25);
        assert_eq!(json["openness"], 0.5);
        assert_eq!(json.as_object().unwrap().len(), TRAIT_COUNT);
    }

    #[test]
    fn test_deserialize_rejects_missing_trait() {
        let mut json = serde_json::to_value(TraitVector::splat(0.5)).unwrap();
        json.as_object_mut().unwrap().remove("curiosity");
        let err = serde_json::from_value::<TraitVector>(json).unwrap_err();
        assert!(err.to_string().contains("missing trait `curiosity`"));
    }

    #[test]
    fn test_deserialize_rejects_unknown_trait() {
        let mut json = serde_json::to_value(TraitVector::splat(0.5)).unwrap();
        json.as_object_mut()
            .unwrap()
            .insert("charisma".to_string(), serde_json::json!(0.4));
        assert!(serde_json::from_value::<TraitVector>(json).is_err());
    }

    #[test]
    fn test_magnitude_helpers() {
        let mut deltas = TraitVector::zeros();
        deltas[TraitKind::Openness] = 0.2;
        deltas[TraitKind::Empathy] = -0.3;
        assert!((deltas.max_abs() - 0.3).abs() < 1e-12);
        assert!((deltas.sum_abs() - 0.5).abs() < 1e-12);
        assert!((deltas.mean_abs() - 0.05).abs() < 1e-12);
        assert_eq!(deltas.count_changed(1e-6), 2);

        deltas.scale(0.5);
        assert!((deltas[TraitKind::Empathy] + 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_first_outside_detects_nan_and_range() {
        let mut vector = TraitVector::splat(0.5);
        assert!(vector.first_outside(0.0, 1.0).is_none());
        vector[TraitKind::Humor] = 1.2;
        assert_eq!(vector.first_outside(0.0, 1.0).unwrap().0, TraitKind::Humor);
        vector[TraitKind::Humor] = 0.5;
        vector[TraitKind::Openness] = f64::NAN;
        assert_eq!(vector.first_outside(0.0, 1.0).unwrap().0, TraitKind::Openness);
    }
}
