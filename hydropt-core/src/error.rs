use thiserror::Error;

/// Invalid topology or configuration, detected at build time.
///
/// Mirrors the taxonomy's `ConfigError`: non-monotone levels, negative head
/// at some product state, too few discrete states, non-positive capacity,
/// or a constraint whose effective bounds are inverted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("basin `{name}`: start volume {start} exceeds capacity {capacity}")]
    StartVolumeExceedsCapacity { name: String, start: f64, capacity: f64 },

    #[error("basin `{name}`: must have at least 2 discrete states, found {num_states}")]
    TooFewStates { name: String, num_states: usize },

    #[error("basin `{name}`: capacity must be positive, found {capacity}")]
    NonPositiveVolume { name: String, capacity: f64 },

    #[error("basin `{name}`: level curve is not monotone non-decreasing")]
    NonMonotoneLevels { name: String },

    #[error("turbine `{turbine}`: negative head ({head:.6}) at product state {state}")]
    NegativeHead { turbine: String, head: f64, state: usize },

    #[error("turbine `{turbine}`: efficiency must be in (0, 1], found {efficiency}")]
    InvalidEfficiency { turbine: String, efficiency: f64 },

    #[error("turbine constraint on `{turbine}`: upper bound {upper} is below lower bound {lower}")]
    ConstraintBoundsInverted { turbine: String, upper: f64, lower: f64 },

    #[error("cannot intersect constraints on different turbines: `{a}` and `{b}`")]
    MismatchedConstraintTurbines { a: String, b: String },
}
