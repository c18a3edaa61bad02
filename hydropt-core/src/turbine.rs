use crate::basin::{BasinIndex, OutflowIndex};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Water density (kg/m^3) used throughout the power/flow conversion.
pub const RHO: f64 = 1000.0;
/// Gravitational acceleration (m/s^2).
pub const G: f64 = 9.81;

/// Index of a turbine within a [`crate::topology::Plant`].
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct TurbineIndex(pub(crate) usize);

impl TurbineIndex {
    /// Construct a turbine index directly. Host code building
    /// [`crate::constraint::TurbineConstraint`]s against a known plant
    /// layout uses this rather than obtaining the index from
    /// [`crate::topology::TurbineVec::push`].
    pub fn new(index: usize) -> Self {
        Self(index)
    }
}

impl From<usize> for TurbineIndex {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl Deref for TurbineIndex {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for TurbineIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Either end of a turbine: a tracked basin, or an untracked outflow.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasinEndpoint {
    Basin(BasinIndex),
    Outflow(OutflowIndex),
}

/// One discrete operating mode for a single turbine.
///
/// `FixedPower`/`FixedFlow` carry the operator's chosen setpoint; the
/// catalogue of joint actions is the Cartesian product of each turbine's
/// list of these variants (see `spec.md` section 4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TurbineAction {
    /// Not running: power = 0, flow = 0.
    Standing,
    /// Held at a fixed power setpoint (W); flow is derived from head.
    FixedPower(f64),
    /// Held at a fixed flow setpoint (m^3/s); power is derived from head.
    FixedFlow(f64),
    /// Running at `base_load`.
    MinPower,
    /// Running at `max_power`.
    MaxPower,
}

impl TurbineAction {
    /// Whether this variant is constrained as a power setpoint (and has its
    /// flow re-derived after clamping) rather than as a flow setpoint.
    pub fn is_power_mode(&self) -> bool {
        !matches!(self, TurbineAction::FixedFlow(_))
    }
}

/// A single hydro unit converting flow between an upper and lower basin
/// (either of which may be an untracked [`crate::basin::Outflow`]) into power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turbine {
    name: String,
    upper: BasinEndpoint,
    lower: BasinEndpoint,
    efficiency: f64,
    base_load: f64,
    max_power: f64,
    actions: Vec<TurbineAction>,
}

impl Turbine {
    pub fn new(
        name: impl Into<String>,
        upper: BasinEndpoint,
        lower: BasinEndpoint,
        efficiency: f64,
        base_load: f64,
        max_power: f64,
        actions: Vec<TurbineAction>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if !(efficiency > 0.0 && efficiency <= 1.0) {
            return Err(ConfigError::InvalidEfficiency { turbine: name, efficiency });
        }
        Ok(Self {
            name,
            upper,
            lower,
            efficiency,
            base_load,
            max_power,
            actions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upper(&self) -> BasinEndpoint {
        self.upper
    }

    pub fn lower(&self) -> BasinEndpoint {
        self.lower
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn base_load(&self) -> f64 {
        self.base_load
    }

    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    pub fn actions(&self) -> &[TurbineAction] {
        &self.actions
    }

    /// Power generated for a given flow and head: `p = eta * rho * g * h * q`.
    pub fn power_for_flow(&self, flow: f64, head: f64) -> f64 {
        self.efficiency * RHO * G * head.max(0.0) * flow
    }

    /// Flow required to produce a given power at a given head:
    /// `q = p / (eta * rho * g * h)`.
    ///
    /// Returns `0.0` when head is non-positive (no flow can produce power
    /// against zero or negative head; the topology builder rejects negative
    /// head at any reachable product state, but head can be exactly zero at
    /// the boundary of the discretization).
    pub fn flow_for_power(&self, power: f64, head: f64) -> f64 {
        if head <= 0.0 {
            return 0.0;
        }
        power / (self.efficiency * RHO * G * head)
    }
}
