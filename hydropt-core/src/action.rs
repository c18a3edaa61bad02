use crate::constraint::StepConstraints;
use crate::index;
use crate::topology::Plant;
use crate::turbine::{BasinEndpoint, TurbineAction, TurbineIndex};
use ndarray::Array1;

/// One joint action: a single operating mode chosen for every turbine in
/// the plant, identified by its position in the lexicographic mixed-radix
/// ordering over each turbine's action list (see `spec.md` section 4.2).
///
/// The ordering is the same convention [`crate::index`] uses for basin
/// volume states: turbine 0 varies fastest.
#[derive(Debug, Clone)]
pub struct JointAction {
    index: usize,
    modes: Vec<TurbineAction>,
}

impl JointAction {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn modes(&self) -> &[TurbineAction] {
        &self.modes
    }

    pub fn mode(&self, turbine: TurbineIndex) -> TurbineAction {
        self.modes[*turbine]
    }

    /// Power generated by every turbine at every product state, with
    /// power-mode setpoints clamped to the active constraint (if any) and
    /// flow-mode setpoints left unconstrained (see
    /// [`TurbineAction::is_power_mode`]).
    pub fn turbine_power(&self, plant: &Plant, constraints: Option<&StepConstraints>) -> Vec<Array1<f64>> {
        plant
            .turbines()
            .iter()
            .enumerate()
            .map(|(i, turbine)| {
                let idx = TurbineIndex(i);
                let head = plant.turbine_head(idx);
                let mode = self.modes[i];
                match mode {
                    TurbineAction::Standing => Array1::zeros(head.len()),
                    TurbineAction::FixedFlow(q) => head.mapv(|h| turbine.power_for_flow(q, h)),
                    TurbineAction::FixedPower(_) | TurbineAction::MinPower | TurbineAction::MaxPower => {
                        let setpoint = match mode {
                            TurbineAction::FixedPower(p) => p,
                            TurbineAction::MinPower => turbine.base_load(),
                            TurbineAction::MaxPower => turbine.max_power(),
                            _ => unreachable!(),
                        };
                        let clamped = match constraints.and_then(|c| c.get(&idx)) {
                            Some(c) => c.transform(setpoint, plant),
                            None => setpoint,
                        };
                        Array1::from_elem(head.len(), clamped)
                    }
                }
            })
            .collect()
    }

    /// Flow through every turbine at every product state, derived from
    /// [`Self::turbine_power`] for power-mode actions and carried directly
    /// for [`TurbineAction::FixedFlow`].
    pub fn turbine_flow(&self, plant: &Plant, constraints: Option<&StepConstraints>) -> Vec<Array1<f64>> {
        let power = self.turbine_power(plant, constraints);
        plant
            .turbines()
            .iter()
            .enumerate()
            .map(|(i, turbine)| {
                let idx = TurbineIndex(i);
                let head = plant.turbine_head(idx);
                match self.modes[i] {
                    TurbineAction::FixedFlow(q) => Array1::from_elem(head.len(), q),
                    _ => {
                        let p = &power[i];
                        Array1::from_shape_fn(head.len(), |s| turbine.flow_for_power(p[s], head[s]))
                    }
                }
            })
            .collect()
    }

    /// Power generated by every turbine at a single product state, given
    /// its per-basin coordinates. Used by forward propagation, which only
    /// ever needs one state per time step (see [`Plant::turbine_head_at`]).
    pub fn turbine_power_at(&self, plant: &Plant, coords: &[usize], constraints: Option<&StepConstraints>) -> Vec<f64> {
        plant
            .turbines()
            .iter()
            .enumerate()
            .map(|(i, turbine)| {
                let idx = TurbineIndex(i);
                let head = plant.turbine_head_at(idx, coords);
                match self.modes[i] {
                    TurbineAction::Standing => 0.0,
                    TurbineAction::FixedFlow(q) => turbine.power_for_flow(q, head),
                    TurbineAction::FixedPower(_) | TurbineAction::MinPower | TurbineAction::MaxPower => {
                        let setpoint = match self.modes[i] {
                            TurbineAction::FixedPower(p) => p,
                            TurbineAction::MinPower => turbine.base_load(),
                            TurbineAction::MaxPower => turbine.max_power(),
                            _ => unreachable!(),
                        };
                        match constraints.and_then(|c| c.get(&idx)) {
                            Some(c) => c.transform(setpoint, plant),
                            None => setpoint,
                        }
                    }
                }
            })
            .collect()
    }

    /// Net outflow rate from each tracked basin at a single product state
    /// (see [`Self::turbine_power_at`] and [`Self::basin_flow_rates`]).
    pub fn basin_flow_rates_at(&self, plant: &Plant, coords: &[usize], constraints: Option<&StepConstraints>) -> Vec<f64> {
        let power = self.turbine_power_at(plant, coords, constraints);
        let mut net = vec![0.0f64; plant.basins().len()];
        for (i, turbine) in plant.turbines().iter().enumerate() {
            let idx = TurbineIndex(i);
            let head = plant.turbine_head_at(idx, coords);
            let flow = match self.modes[i] {
                TurbineAction::FixedFlow(q) => q,
                _ => turbine.flow_for_power(power[i], head),
            };
            if let BasinEndpoint::Basin(b) = turbine.upper() {
                net[*b] += flow;
            }
            if let BasinEndpoint::Basin(b) = turbine.lower() {
                net[*b] -= flow;
            }
        }
        net
    }

    /// Net outflow rate from each tracked basin (m^3/s, positive = volume
    /// decreasing) at every product state: `Σ` turbines for which this
    /// basin is upstream `−` `Σ` turbines for which it is downstream. This
    /// is the sign convention the solver's transition operator expects
    /// directly (outflow decreases volume).
    pub fn basin_flow_rates(&self, plant: &Plant, constraints: Option<&StepConstraints>) -> Vec<Array1<f64>> {
        let flow = self.turbine_flow(plant, constraints);
        let total_states = plant.total_states();
        let mut net: Vec<Array1<f64>> = (0..plant.basins().len())
            .map(|_| Array1::zeros(total_states))
            .collect();

        for (i, turbine) in plant.turbines().iter().enumerate() {
            if let BasinEndpoint::Basin(b) = turbine.upper() {
                net[*b] += &flow[i];
            }
            if let BasinEndpoint::Basin(b) = turbine.lower() {
                net[*b] -= &flow[i];
            }
        }
        net
    }
}

/// The full Cartesian-product catalogue of joint actions for a plant: one
/// [`JointAction`] per combination of each turbine's discrete operating
/// modes, built once and reused across every time step and product state.
#[derive(Debug, Clone)]
pub struct ActionCatalogue {
    actions: Vec<JointAction>,
}

impl ActionCatalogue {
    pub fn build(plant: &Plant) -> Self {
        let action_counts: Vec<usize> = plant.turbines().iter().map(|t| t.actions().len().max(1)).collect();
        let total = index::product_state_count(&action_counts);
        let actions = (0..total)
            .map(|idx| {
                let coords = index::decode_index(idx, &action_counts);
                let modes = plant
                    .turbines()
                    .iter()
                    .zip(coords.iter())
                    .map(|(t, &c)| t.actions().get(c).copied().unwrap_or(TurbineAction::Standing))
                    .collect();
                JointAction { index: idx, modes }
            })
            .collect();
        Self { actions }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointAction> {
        self.actions.iter()
    }

    pub fn get(&self, index: usize) -> Option<&JointAction> {
        self.actions.get(index)
    }
}

impl std::ops::Index<usize> for ActionCatalogue {
    type Output = JointAction;
    fn index(&self, index: usize) -> &Self::Output {
        &self.actions[index]
    }
}
