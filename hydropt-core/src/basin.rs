use crate::error::ConfigError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Index of a tracked basin within a [`crate::topology::Plant`].
///
/// Tracked basins contribute a coordinate to the product state space;
/// outflows (see [`crate::basin::Outflow`]) do not and are indexed
/// separately.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct BasinIndex(pub(crate) usize);

impl BasinIndex {
    /// Construct a basin index directly, mirroring [`crate::turbine::TurbineIndex::new`].
    pub fn new(index: usize) -> Self {
        Self(index)
    }
}

impl From<usize> for BasinIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl Deref for BasinIndex {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for BasinIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Index of an [`Outflow`] within a [`crate::topology::Plant`].
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct OutflowIndex(pub(crate) usize);

impl Deref for OutflowIndex {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for OutflowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Maps discrete basin volume to water-surface height.
///
/// Either a flat basin (`Constant`), the default parametric `Wedge` shape,
/// or an explicit monotone-nondecreasing lookup table (`Lut`) sampled at
/// the basin's discrete volume states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LevelCurve {
    /// A single height, independent of volume.
    Constant(f64),
    /// `height(v) = empty + sqrt(v / L)`, `L = capacity / (full - empty)^2`.
    Wedge { empty: f64, full: f64 },
    /// Explicit `(volume, height)` samples, monotone non-decreasing in height.
    Lut(Vec<(f64, f64)>),
}

impl LevelCurve {
    /// Sample this curve at `num_states` equally spaced volumes in `[0, capacity]`.
    pub fn sample(&self, capacity: f64, num_states: usize) -> Array1<f64> {
        match self {
            LevelCurve::Constant(h) => Array1::from_elem(num_states, *h),
            LevelCurve::Wedge { empty, full } => {
                if (full - empty).abs() < f64::EPSILON {
                    return Array1::from_elem(num_states, *empty);
                }
                let height = full - empty;
                let length = capacity / (height * height);
                (0..num_states)
                    .map(|i| {
                        let v = capacity * i as f64 / (num_states - 1) as f64;
                        empty + (v / length).sqrt()
                    })
                    .collect()
            }
            LevelCurve::Lut(points) => {
                let mut pts = points.clone();
                pts.sort_by(|a, b| a.0.total_cmp(&b.0));
                (0..num_states)
                    .map(|i| {
                        let v = capacity * i as f64 / (num_states - 1) as f64;
                        interp(&pts, v)
                    })
                    .collect()
            }
        }
    }

    /// Whether this curve, sampled over `capacity`/`num_states`, is monotone non-decreasing.
    pub fn is_monotone(&self, capacity: f64, num_states: usize) -> bool {
        let values = self.sample(capacity, num_states);
        values.windows(2).into_iter().all(|w| w[1] + 1e-9 >= w[0])
    }
}

fn interp(sorted_points: &[(f64, f64)], x: f64) -> f64 {
    if sorted_points.is_empty() {
        return 0.0;
    }
    if x <= sorted_points[0].0 {
        return sorted_points[0].1;
    }
    if x >= sorted_points[sorted_points.len() - 1].0 {
        return sorted_points[sorted_points.len() - 1].1;
    }
    let pos = sorted_points.partition_point(|p| p.0 < x);
    let (x0, y0) = sorted_points[pos - 1];
    let (x1, y1) = sorted_points[pos];
    let t = (x - x0) / (x1 - x0);
    y0 + t * (y1 - y0)
}

/// A reservoir with a discretized volume state space.
///
/// Invariants (checked by [`crate::topology::Plant::build`]):
/// `0 <= start_volume <= capacity`, `num_states >= 2`, `capacity > 0`, and
/// the level curve must be monotone non-decreasing over the discretization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Basin {
    name: String,
    capacity: f64,
    num_states: usize,
    start_volume: f64,
    /// Optional end-of-horizon target volume. Carried for API completeness
    /// (the original model records it) but not consumed by the solver:
    /// only the scenario-level `water_value_end` participates in the
    /// terminal reward (see `spec.md` Design Notes, Open Question 2).
    end_volume: Option<f64>,
    levels: LevelCurve,
}

impl Basin {
    pub fn new(
        name: impl Into<String>,
        capacity: f64,
        num_states: usize,
        start_volume: f64,
        levels: LevelCurve,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if capacity <= 0.0 {
            return Err(ConfigError::NonPositiveVolume { name, capacity });
        }
        if num_states < 2 {
            return Err(ConfigError::TooFewStates { name, num_states });
        }
        if !(0.0..=capacity).contains(&start_volume) {
            return Err(ConfigError::StartVolumeExceedsCapacity {
                name,
                start: start_volume,
                capacity,
            });
        }
        if !levels.is_monotone(capacity, num_states) {
            return Err(ConfigError::NonMonotoneLevels { name });
        }
        Ok(Self {
            name,
            capacity,
            num_states,
            start_volume,
            end_volume: None,
            levels,
        })
    }

    /// A basin with a constant (flat) level curve, built from just two numbers.
    pub fn flat(
        name: impl Into<String>,
        capacity: f64,
        num_states: usize,
        start_volume: f64,
        level: f64,
    ) -> Result<Self, ConfigError> {
        Self::new(name, capacity, num_states, start_volume, LevelCurve::Constant(level))
    }

    pub fn with_end_volume(mut self, end_volume: f64) -> Self {
        self.end_volume = Some(end_volume);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn start_volume(&self) -> f64 {
        self.start_volume
    }

    pub fn end_volume(&self) -> Option<f64> {
        self.end_volume
    }

    pub fn levels(&self) -> &LevelCurve {
        &self.levels
    }

    /// Height at each of this basin's `num_states` discrete volume indices.
    pub fn values(&self) -> Array1<f64> {
        self.levels.sample(self.capacity, self.num_states)
    }

    /// Per-index volume quantum, `dV = capacity / (num_states - 1)`.
    pub fn quantum(&self) -> f64 {
        self.capacity / (self.num_states - 1) as f64
    }
}

/// A degenerate, untracked basin: a fixed water level that receives or
/// supplies flow without contributing a coordinate to the product state
/// space. Modelled after the source's `Outflow`, which is `V=1, N=2,
/// start=0` with a fixed level — here it is simply the fixed level,
/// since the synthetic volume/state count play no role once untracked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outflow {
    level: f64,
}

impl Outflow {
    pub fn new(level: f64) -> Self {
        Self { level }
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wedge_hits_full_at_capacity() {
        let curve = LevelCurve::Wedge {
            empty: 1700.0,
            full: 1792.0,
        };
        let values = curve.sample(75e6, 101);
        assert!(float_cmp::approx_eq!(f64, values[0], 1700.0, epsilon = 1e-9));
        assert!(float_cmp::approx_eq!(f64, values[100], 1792.0, epsilon = 1e-6));
        // monotone non-decreasing
        assert!(values.windows(2).into_iter().all(|w| w[1] >= w[0]));
    }

    #[test]
    fn flat_basin_is_constant() {
        let curve = LevelCurve::Constant(600.0);
        let values = curve.sample(1.0, 2);
        assert_eq!(values[0], 600.0);
        assert_eq!(values[1], 600.0);
    }

    #[test]
    fn start_volume_must_not_exceed_capacity() {
        let err = Basin::flat("b", 100.0, 2, 150.0, 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::StartVolumeExceedsCapacity { .. }));
    }

    #[test]
    fn requires_at_least_two_states() {
        let err = Basin::flat("b", 100.0, 1, 0.0, 1.0).unwrap_err();
        assert!(matches!(err, ConfigError::TooFewStates { .. }));
    }

    #[test]
    fn basin_round_trips_through_json() {
        let basin = Basin::new(
            "basin",
            75e6,
            101,
            60e6,
            LevelCurve::Wedge { empty: 1700.0, full: 1792.0 },
        )
        .unwrap()
        .with_end_volume(50e6);
        let json = serde_json::to_string(&basin).unwrap();
        let back: Basin = serde_json::from_str(&json).unwrap();
        assert_eq!(basin, back);
    }
}
