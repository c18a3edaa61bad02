use crate::basin::{Basin, BasinIndex, Outflow, OutflowIndex};
use crate::error::ConfigError;
use crate::index;
use crate::turbine::{BasinEndpoint, Turbine, TurbineIndex};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Basins are owned by the [`Plant`] in a flat array; everything else
/// refers to them by [`BasinIndex`] rather than by reference (see
/// `spec.md` Design Notes: "Back-pointers").
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct BasinVec {
    basins: Vec<Basin>,
}

impl Deref for BasinVec {
    type Target = Vec<Basin>;
    fn deref(&self) -> &Self::Target {
        &self.basins
    }
}

impl DerefMut for BasinVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.basins
    }
}

impl BasinVec {
    pub fn get(&self, index: BasinIndex) -> Option<&Basin> {
        self.basins.get(index.0)
    }

    pub fn push(&mut self, basin: Basin) -> BasinIndex {
        let idx = BasinIndex(self.basins.len());
        self.basins.push(basin);
        idx
    }
}

/// Untracked outflows, owned the same way as [`BasinVec`].
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct OutflowVec {
    outflows: Vec<Outflow>,
}

impl Deref for OutflowVec {
    type Target = Vec<Outflow>;
    fn deref(&self) -> &Self::Target {
        &self.outflows
    }
}

impl OutflowVec {
    pub fn get(&self, index: OutflowIndex) -> Option<&Outflow> {
        self.outflows.get(index.0)
    }

    pub fn push(&mut self, outflow: Outflow) -> OutflowIndex {
        let idx = OutflowIndex(self.outflows.len());
        self.outflows.push(outflow);
        idx
    }
}

/// Turbines, owned the same way as [`BasinVec`].
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct TurbineVec {
    turbines: Vec<Turbine>,
}

impl Deref for TurbineVec {
    type Target = Vec<Turbine>;
    fn deref(&self) -> &Self::Target {
        &self.turbines
    }
}

impl TurbineVec {
    pub fn get(&self, index: TurbineIndex) -> Option<&Turbine> {
        self.turbines.get(index.0)
    }

    pub fn push(&mut self, turbine: Turbine) -> TurbineIndex {
        let idx = TurbineIndex(self.turbines.len());
        self.turbines.push(turbine);
        idx
    }
}

/// The immutable topology of a cascaded hydropower plant: basins,
/// turbines, and their hydraulic wiring.
///
/// Built once via [`Plant::build`], which validates every invariant in
/// `spec.md` section 4.1 (non-negative head at every product state,
/// `num_states >= 2`, monotone level curves) and fails with
/// [`ConfigError`] otherwise. Everything downstream (the action
/// catalogue, the transition-operator builder, backward induction) reads
/// this structure but never mutates it.
/// `Deserialize` is deliberately not derived here: a `Plant` is only ever
/// valid once it has passed [`Plant::build`]'s invariant checks, and a
/// derived `Deserialize` would let a host application construct one
/// directly from untrusted JSON without running them. Serialize the
/// constituent parts (`BasinVec`, `OutflowVec`, `TurbineVec`) instead and
/// rebuild through `Plant::build`.
#[derive(Debug, Clone, Serialize)]
pub struct Plant {
    name: String,
    basins: BasinVec,
    outflows: OutflowVec,
    turbines: TurbineVec,
}

impl Plant {
    pub fn build(
        name: impl Into<String>,
        basins: BasinVec,
        outflows: OutflowVec,
        turbines: TurbineVec,
    ) -> Result<Self, ConfigError> {
        let plant = Self {
            name: name.into(),
            basins,
            outflows,
            turbines,
        };
        plant.validate()?;
        Ok(plant)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, turbine) in self.turbines.iter().enumerate() {
            let head = self.turbine_head(TurbineIndex(i));
            if let Some((state, h)) = head.iter().enumerate().find(|(_, &h)| h < -1e-9) {
                return Err(ConfigError::NegativeHead {
                    turbine: turbine.name().to_string(),
                    head: *h,
                    state,
                });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn basins(&self) -> &BasinVec {
        &self.basins
    }

    pub fn outflows(&self) -> &OutflowVec {
        &self.outflows
    }

    pub fn turbines(&self) -> &TurbineVec {
        &self.turbines
    }

    /// The discretization `N_b` of every tracked basin, in basin order.
    pub fn num_states(&self) -> Vec<usize> {
        self.basins.iter().map(Basin::num_states).collect()
    }

    /// The capacity `V_b` of every tracked basin, in basin order.
    pub fn volumes(&self) -> Vec<f64> {
        self.basins.iter().map(Basin::capacity).collect()
    }

    /// Total size `S` of the product state space.
    pub fn total_states(&self) -> usize {
        index::product_state_count(&self.num_states())
    }

    /// Broadcast a basin's `N_b`-length sampled levels to the full
    /// `S`-length product state space.
    pub fn kron_levels(&self, basin: BasinIndex) -> Array1<f64> {
        let num_states = self.num_states();
        let values = self.basins[*basin].values();
        index::kron_index(&num_states, *basin)
            .into_iter()
            .map(|k| values[k])
            .collect()
    }

    /// The level at every product state for either a tracked basin or an
    /// untracked outflow (which contributes a constant level).
    pub fn endpoint_levels(&self, endpoint: BasinEndpoint) -> Array1<f64> {
        match endpoint {
            BasinEndpoint::Basin(b) => self.kron_levels(b),
            BasinEndpoint::Outflow(o) => {
                let level = self.outflows[*o].level();
                Array1::from_elem(self.total_states(), level)
            }
        }
    }

    /// Turbine head (upper level minus lower level) at every product state.
    pub fn turbine_head(&self, turbine: TurbineIndex) -> Array1<f64> {
        let t = &self.turbines[*turbine];
        let upper = self.endpoint_levels(t.upper());
        let lower = self.endpoint_levels(t.lower());
        upper - lower
    }

    /// The level of an endpoint at a single product state, given its
    /// per-basin coordinates (see [`crate::index::decode_index`]).
    ///
    /// Avoids broadcasting a basin's levels across the full `S`-length
    /// product state space when only one state is needed, which is the
    /// access pattern forward propagation uses (one state per time step).
    pub fn endpoint_level_at(&self, endpoint: BasinEndpoint, coords: &[usize]) -> f64 {
        match endpoint {
            BasinEndpoint::Basin(b) => self.basins[*b].values()[coords[*b]],
            BasinEndpoint::Outflow(o) => self.outflows[*o].level(),
        }
    }

    /// Turbine head at a single product state, given its per-basin coordinates.
    pub fn turbine_head_at(&self, turbine: TurbineIndex, coords: &[usize]) -> f64 {
        let t = &self.turbines[*turbine];
        self.endpoint_level_at(t.upper(), coords) - self.endpoint_level_at(t.lower(), coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basin::LevelCurve;
    use crate::turbine::TurbineAction;

    fn single_basin_plant() -> Plant {
        let mut basins = BasinVec::default();
        let b0 = basins.push(
            Basin::new(
                "basin",
                75e6,
                101,
                60e6,
                LevelCurve::Wedge { empty: 1700.0, full: 1792.0 },
            )
            .unwrap(),
        );
        let mut outflows = OutflowVec::default();
        let o0 = outflows.push(Outflow::new(1090.0));
        let mut turbines = TurbineVec::default();
        turbines.push(
            Turbine::new(
                "turbine",
                BasinEndpoint::Basin(b0),
                BasinEndpoint::Outflow(o0),
                0.8,
                1e6,
                45e6,
                vec![TurbineAction::Standing, TurbineAction::MaxPower],
            )
            .unwrap(),
        );
        Plant::build("s1", basins, outflows, turbines).unwrap()
    }

    #[test]
    fn head_is_nonnegative_everywhere() {
        let plant = single_basin_plant();
        let head = plant.turbine_head(TurbineIndex(0));
        assert!(head.iter().all(|&h| h >= 0.0));
    }

    #[test]
    fn total_states_matches_product() {
        let plant = single_basin_plant();
        assert_eq!(plant.total_states(), 101);
    }

    #[test]
    fn negative_head_is_rejected() {
        let mut basins = BasinVec::default();
        let b0 = basins.push(Basin::flat("low", 10.0, 2, 0.0, 5.0).unwrap());
        let mut outflows = OutflowVec::default();
        let o0 = outflows.push(Outflow::new(100.0));
        let mut turbines = TurbineVec::default();
        turbines.push(
            Turbine::new(
                "t",
                BasinEndpoint::Basin(b0),
                BasinEndpoint::Outflow(o0),
                0.8,
                0.0,
                1.0,
                vec![],
            )
            .unwrap(),
        );
        let err = Plant::build("bad", basins, outflows, turbines).unwrap_err();
        assert!(matches!(err, ConfigError::NegativeHead { .. }));
    }
}
