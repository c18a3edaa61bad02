//! Topology and configuration types for a cascaded hydropower plant:
//! basins, turbines, the discrete action catalogue, and time-bounded
//! power constraints. The optimizer that consumes these types lives in
//! the `hydropt-solver` crate.

pub mod action;
pub mod basin;
pub mod constraint;
pub mod error;
pub mod index;
pub mod topology;
pub mod turbine;

pub use action::{ActionCatalogue, JointAction};
pub use basin::{Basin, BasinIndex, LevelCurve, Outflow, OutflowIndex};
pub use constraint::{ConstraintsSeries, StepConstraints, TurbineConstraint};
pub use error::ConfigError;
pub use topology::{BasinVec, OutflowVec, Plant, TurbineVec};
pub use turbine::{BasinEndpoint, Turbine, TurbineAction, TurbineIndex, G, RHO};
