//! Membership checks and random sampling for space descriptors.

use crate::types::{BoxData, DataContainer, Dtype, SpaceDescriptor};
use rand::Rng;
use rand_distr::{Exp1, StandardNormal};

impl SpaceDescriptor {
    /// Returns true if `value` conforms to this space.
    ///
    /// Discrete values must be `< n`. Box values must carry the declared dtype,
    /// hold exactly `product(shape)` elements and stay within `[low, high]`.
    /// Tuple elements are matched by position, dict elements by name.
    pub fn contains(&self, value: &DataContainer) -> bool {
        match (self, value) {
            (SpaceDescriptor::Discrete { n }, DataContainer::Discrete { value }) => value < n,
            (
                SpaceDescriptor::Box {
                    low,
                    high,
                    shape,
                    dtype,
                },
                DataContainer::Box { data, .. },
            ) => {
                let expected: usize = shape.iter().map(|d| *d as usize).product();
                data.dtype() == *dtype
                    && data.len() == expected
                    && data.to_f64_vec().iter().all(|v| *v >= *low && *v <= *high)
            }
            (SpaceDescriptor::Tuple { elements: spaces }, DataContainer::Tuple { elements }) => {
                spaces.len() == elements.len()
                    && spaces.iter().zip(elements).all(|(s, v)| s.contains(v))
            }
            (SpaceDescriptor::Dict { elements: spaces }, DataContainer::Dict { elements }) => {
                spaces.len() == elements.len()
                    && spaces.iter().all(|s| {
                        elements
                            .iter()
                            .find(|e| e.name == s.name)
                            .map(|e| s.space.contains(&e.value))
                            .unwrap_or(false)
                    })
            }
            _ => false,
        }
    }

    /// Returns true if any box bound (at any depth) is NaN.
    ///
    /// Infinite bounds are fine; they mark an unbounded side.
    pub fn has_nan_bound(&self) -> bool {
        match self {
            SpaceDescriptor::Discrete { .. } => false,
            SpaceDescriptor::Box { low, high, .. } => low.is_nan() || high.is_nan(),
            SpaceDescriptor::Tuple { elements } => elements.iter().any(SpaceDescriptor::has_nan_bound),
            SpaceDescriptor::Dict { elements } => elements.iter().any(|e| e.space.has_nan_bound()),
        }
    }

    /// Draws a random value conforming to this space.
    ///
    /// Takes `&mut impl Rng` so callers control determinism. Box sides that
    /// are unbounded are sampled like gym does: standard normal when both
    /// sides are open, a shifted exponential when one side is.
    pub fn sample(&self, rng: &mut impl Rng) -> DataContainer {
        match self {
            SpaceDescriptor::Discrete { n } => DataContainer::Discrete {
                value: if *n == 0 { 0 } else { rng.gen_range(0..*n) },
            },
            SpaceDescriptor::Box {
                low,
                high,
                shape,
                dtype,
            } => {
                let count: usize = shape.iter().map(|d| *d as usize).product();
                let data = sample_box(rng, *low, *high, count, *dtype);
                DataContainer::Box {
                    shape: shape.clone(),
                    data,
                }
            }
            SpaceDescriptor::Tuple { elements } => DataContainer::Tuple {
                elements: elements.iter().map(|s| s.sample(rng)).collect(),
            },
            SpaceDescriptor::Dict { elements } => {
                DataContainer::dict(elements.iter().map(|e| (e.name.clone(), e.space.sample(rng))))
            }
        }
    }
}

fn sample_box(rng: &mut impl Rng, low: f64, high: f64, count: usize, dtype: Dtype) -> BoxData {
    let low = if low.is_nan() { f64::NEG_INFINITY } else { low };
    let high = if high.is_nan() { f64::INFINITY } else { high };
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    match dtype {
        // Float-to-int casts saturate, so infinite bounds become the type's range
        Dtype::Int => {
            let (lo, hi) = (low.ceil() as i64, high.floor() as i64);
            BoxData::Int((0..count).map(|_| if lo > hi { lo } else { rng.gen_range(lo..=hi) }).collect())
        }
        Dtype::Uint => {
            let (lo, hi) = (low.max(0.0).ceil() as u64, high.max(0.0).floor() as u64);
            BoxData::Uint((0..count).map(|_| if lo > hi { lo } else { rng.gen_range(lo..=hi) }).collect())
        }
        Dtype::Float => BoxData::Float(
            (0..count)
                .map(|_| sample_real(rng, low, high, f32::MAX as f64) as f32)
                .collect(),
        ),
        Dtype::Double => BoxData::Double(
            (0..count)
                .map(|_| sample_real(rng, low, high, f64::MAX))
                .collect(),
        ),
    }
}

/// Samples one element from `[low, high]`, kept within `[-limit, limit]`.
///
/// Bounded intervals are interpolated rather than spanned, so `high - low`
/// may exceed `limit` without overflowing.
fn sample_real(rng: &mut impl Rng, low: f64, high: f64, limit: f64) -> f64 {
    let lo = low.max(-limit).min(limit);
    let hi = high.max(-limit).min(limit);
    let value = match (low.is_finite(), high.is_finite()) {
        (true, true) => {
            let t: f64 = rng.gen();
            lo * (1.0 - t) + hi * t
        }
        (true, false) => lo + rng.sample::<f64, _>(Exp1),
        (false, true) => hi - rng.sample::<f64, _>(Exp1),
        (false, false) => rng.sample::<f64, _>(StandardNormal),
    };
    value.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn probe_space() -> SpaceDescriptor {
        SpaceDescriptor::dict([
            ("queue", SpaceDescriptor::bounded_box(0.0, 10.0, vec![2, 2], Dtype::Uint)),
            ("route", SpaceDescriptor::discrete(5)),
            (
                "pair",
                SpaceDescriptor::tuple(vec![
                    SpaceDescriptor::bounded_box(-1.0, 1.0, vec![3], Dtype::Float),
                    SpaceDescriptor::discrete(2),
                ]),
            ),
        ])
    }

    #[test]
    fn test_sample_is_contained() {
        let space = probe_space();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..50 {
            let value = space.sample(&mut rng);
            assert!(space.contains(&value), "sampled {:?}", value);
        }
    }

    #[test]
    fn test_sample_is_deterministic() {
        let space = probe_space();
        let a = space.sample(&mut ChaCha8Rng::seed_from_u64(7));
        let b = space.sample(&mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_extreme_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let spaces = [
            SpaceDescriptor::bounded_box(-1e39, 1e39, vec![4], Dtype::Float),
            SpaceDescriptor::bounded_box(-f64::MAX, f64::MAX, vec![4], Dtype::Double),
            SpaceDescriptor::bounded_box(f64::NEG_INFINITY, f64::INFINITY, vec![4], Dtype::Float),
            SpaceDescriptor::bounded_box(f64::NEG_INFINITY, f64::INFINITY, vec![4], Dtype::Double),
            SpaceDescriptor::bounded_box(2.0, f64::INFINITY, vec![4], Dtype::Double),
            SpaceDescriptor::bounded_box(f64::NEG_INFINITY, -2.0, vec![4], Dtype::Float),
            SpaceDescriptor::bounded_box(f64::NEG_INFINITY, f64::INFINITY, vec![4], Dtype::Int),
            SpaceDescriptor::bounded_box(f64::NEG_INFINITY, f64::INFINITY, vec![4], Dtype::Uint),
        ];
        for space in &spaces {
            for _ in 0..20 {
                let value = space.sample(&mut rng);
                assert!(value.is_finite(), "{:?} sampled {:?}", space, value);
                assert!(space.contains(&value), "{:?} sampled {:?}", space, value);
            }
        }
    }

    #[test]
    fn test_sample_half_bounded_sides() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let above = SpaceDescriptor::bounded_box(5.0, f64::INFINITY, vec![16], Dtype::Double);
        let below = SpaceDescriptor::bounded_box(f64::NEG_INFINITY, -5.0, vec![16], Dtype::Double);
        for value in above.sample(&mut rng).as_box().unwrap().to_f64_vec() {
            assert!(value >= 5.0);
        }
        for value in below.sample(&mut rng).as_box().unwrap().to_f64_vec() {
            assert!(value <= -5.0);
        }
    }

    #[test]
    fn test_has_nan_bound() {
        let nested = SpaceDescriptor::tuple(vec![
            SpaceDescriptor::discrete(2),
            SpaceDescriptor::dict([("x", SpaceDescriptor::bounded_box(0.0, f64::NAN, vec![1], Dtype::Float))]),
        ]);
        assert!(nested.has_nan_bound());
        assert!(!SpaceDescriptor::bounded_box(f64::NEG_INFINITY, 0.0, vec![1], Dtype::Float).has_nan_bound());
    }

    #[test]
    fn test_discrete_bounds() {
        let space = SpaceDescriptor::discrete(5);
        assert!(space.contains(&DataContainer::discrete(4)));
        assert!(!space.contains(&DataContainer::discrete(5)));
    }

    #[test]
    fn test_box_rejects_wrong_dtype_and_length() {
        let space = SpaceDescriptor::bounded_box(0.0, 10.0, vec![2], Dtype::Uint);
        assert!(space.contains(&DataContainer::boxed(None, BoxData::Uint(vec![1, 10]))));
        assert!(!space.contains(&DataContainer::boxed(None, BoxData::Int(vec![1, 2]))));
        assert!(!space.contains(&DataContainer::boxed(None, BoxData::Uint(vec![1]))));
        assert!(!space.contains(&DataContainer::boxed(None, BoxData::Uint(vec![1, 11]))));
    }

    #[test]
    fn test_kind_mismatch() {
        let space = SpaceDescriptor::discrete(3);
        assert!(!space.contains(&DataContainer::tuple(vec![])));
    }

    #[test]
    fn test_dict_requires_every_name() {
        let space = SpaceDescriptor::dict([
            ("a", SpaceDescriptor::discrete(2)),
            ("b", SpaceDescriptor::discrete(2)),
        ]);
        let swapped = DataContainer::dict([
            ("b", DataContainer::discrete(1)),
            ("a", DataContainer::discrete(0)),
        ]);
        assert!(space.contains(&swapped));

        let renamed = DataContainer::dict([
            ("a", DataContainer::discrete(1)),
            ("c", DataContainer::discrete(0)),
        ]);
        assert!(!space.contains(&renamed));
    }
}
