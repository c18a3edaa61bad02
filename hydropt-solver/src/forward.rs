//! Forward propagation engine (`spec.md` section 4.6).
//!
//! Starting from the initial basin volumes, reads the policy grid to pick
//! the action at the current (real-valued, rounded-to-nearest-state)
//! volume, records the chosen turbine powers and basin flows, and
//! advances volume with deterministic flow accounting. No interpolation
//! is used here (unlike the transition operator): the realized state is
//! real-valued, not a probability distribution over the discrete grid.

use hydropt_core::constraint::StepConstraints;
use hydropt_core::{index, ActionCatalogue, ConstraintsSeries, Plant};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// The realized schedule produced by forward propagation: turbine power
/// (`T x turbines`, W), basin flow (`T x B`, m^3/s), and the volume
/// trajectory (`(T+1) x B`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardResult {
    pub turbine_actions: Array2<f64>,
    pub basin_flows: Array2<f64>,
    pub volume_trajectory: Array2<f64>,
}

/// Round a real-valued volume to its nearest discrete state index,
/// clamped to `[0, num_states - 1]` (`spec.md` section 4.6, step 1).
fn nearest_state_index(volume: f64, capacity: f64, num_states: usize) -> usize {
    let k = ((num_states - 1) as f64 * volume / capacity).round();
    (k.max(0.0) as usize).min(num_states - 1)
}

#[allow(clippy::too_many_arguments)]
pub fn forward_propagation(
    plant: &Plant,
    catalogue: &ActionCatalogue,
    constraints: Option<&ConstraintsSeries>,
    policy_grid: &Array2<usize>,
    inflow_rate: &Array2<f64>,
    dt_seconds: f64,
    initial_volumes: &[f64],
) -> ForwardResult {
    let t_steps = policy_grid.nrows();
    let num_turbines = plant.turbines().len();
    let num_basins = plant.basins().len();
    let num_states = plant.num_states();
    let volumes = plant.volumes();

    let mut turbine_actions = Array2::<f64>::zeros((t_steps, num_turbines));
    let mut basin_flows = Array2::<f64>::zeros((t_steps, num_basins));
    let mut volume_trajectory = Array2::<f64>::zeros((t_steps + 1, num_basins));

    let mut v: Vec<f64> = initial_volumes.to_vec();
    for (b, &v0) in v.iter().enumerate() {
        volume_trajectory[[0, b]] = v0;
    }

    for t in 0..t_steps {
        let coords: Vec<usize> = (0..num_basins).map(|b| nearest_state_index(v[b], volumes[b], num_states[b])).collect();
        let state_index = index::linear_index(&coords, &num_states);

        let action_index = policy_grid[[t, state_index]];
        let action = &catalogue[action_index];
        let step_constraints: Option<&StepConstraints> = constraints.map(|cs| cs[t].as_ref());

        let power = action.turbine_power_at(plant, &coords, step_constraints);
        let flow = action.basin_flow_rates_at(plant, &coords, step_constraints);

        for i in 0..num_turbines {
            turbine_actions[[t, i]] = power[i];
        }
        for b in 0..num_basins {
            basin_flows[[t, b]] = flow[b];
            volume_trajectory[[t + 1, b]] = v[b] - flow[b] * dt_seconds + inflow_rate[[t, b]] * dt_seconds;
        }
        for b in 0..num_basins {
            v[b] = volume_trajectory[[t + 1, b]];
        }
    }

    ForwardResult {
        turbine_actions,
        basin_flows,
        volume_trajectory,
    }
}
