//! Backward induction engine (`spec.md` section 4.5).
//!
//! Walks time in reverse; at each step, evaluates every joint action's
//! expected future reward plus immediate revenue at every product state,
//! then writes the argmax into a policy grid and the max into a value
//! grid. The per-action reward computation is embarrassingly parallel
//! (`spec.md` section 5) and is spread across `rayon`'s global pool,
//! collected into an index-ordered `Vec` so the lowest-index tie-break is
//! preserved regardless of completion order.

use crate::cancel::CancelToken;
use crate::error::{Result, SolverError};
use crate::sparse::{column_sums, spmatmul, transpose_matvec};
use crate::transition::transition_operator;
use hydropt_core::constraint::StepConstraints;
use hydropt_core::{ActionCatalogue, ConstraintsSeries, Plant};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Per-action turbine power and basin net-flow arrays for a single time
/// step, shared across every step whose constraint map is identical (see
/// `hydropt_core::ConstraintsSeries`, which already gives identical maps
/// the same `Rc` allocation).
struct StepActions {
    turbine_power: Vec<Vec<Array1<f64>>>,
    basin_flow_net: Vec<Vec<Array1<f64>>>,
}

impl StepActions {
    fn build(plant: &Plant, catalogue: &ActionCatalogue, constraints: Option<&StepConstraints>) -> Self {
        let mut turbine_power = Vec::with_capacity(catalogue.len());
        let mut basin_flow_net = Vec::with_capacity(catalogue.len());
        for action in catalogue.iter() {
            turbine_power.push(action.turbine_power(plant, constraints));
            basin_flow_net.push(action.basin_flow_rates(plant, constraints));
        }
        Self {
            turbine_power,
            basin_flow_net,
        }
    }
}

/// The terminal condition: `value(s) = water_value_end * sum_b capacity_b * fill_fraction_b(s)`.
fn terminal_value(plant: &Plant, water_value_end: f64) -> Array1<f64> {
    let s = plant.total_states();
    let mut value = Array1::<f64>::zeros(s);
    if water_value_end == 0.0 {
        return value;
    }
    let num_states = plant.num_states();
    for (b, basin) in plant.basins().iter().enumerate() {
        let n = num_states[b];
        let capacity = basin.capacity();
        let fraction: Array1<f64> = hydropt_core::index::kron_index(&num_states, b)
            .into_iter()
            .map(|k| k as f64 / (n - 1) as f64)
            .collect();
        value += &fraction.mapv(|f| water_value_end * capacity * f);
    }
    value
}

/// Run backward induction over the full horizon, returning `(policy_grid,
/// value_grid)`, both shaped `T x S`.
#[allow(clippy::too_many_arguments)]
pub fn backward_induction(
    plant: &Plant,
    catalogue: &ActionCatalogue,
    constraints: Option<&ConstraintsSeries>,
    price_curve: &[f64],
    inflow_rate: &Array2<f64>,
    dt_seconds: f64,
    water_value_end: f64,
    basin_limit_penalty: f64,
    cancel: &CancelToken,
) -> Result<(Array2<usize>, Array2<f64>)> {
    let t_steps = price_curve.len();
    let s = plant.total_states();
    let num_states = plant.num_states();
    let volumes = plant.volumes();

    let mut policy_grid = Array2::<usize>::zeros((t_steps, s));
    let mut value_grid = Array2::<f64>::zeros((t_steps, s));
    let mut value = terminal_value(plant, water_value_end);

    let mut cache: HashMap<usize, Rc<StepActions>> = HashMap::new();

    for t in (0..t_steps).rev() {
        if cancel.is_cancelled() {
            return Err(SolverError::Cancelled);
        }
        debug!(step = t, "backward induction step");

        let step_constraints = constraints.map(|cs| cs[t].as_ref());
        let key = match constraints {
            Some(cs) => Rc::as_ptr(&cs[t]) as usize,
            None => 0,
        };
        let step_actions = match cache.get(&key) {
            Some(a) => Rc::clone(a),
            None => {
                let built = Rc::new(StepActions::build(plant, catalogue, step_constraints));
                cache.insert(key, Rc::clone(&built));
                built
            }
        };

        let inflow_row = inflow_rate.row(t);
        let inflow_q: Vec<Array1<f64>> = (0..num_states.len())
            .map(|b| Array1::from_elem(s, -inflow_row[b] * dt_seconds))
            .collect();
        let l_in = transition_operator(&volumes, &num_states, &inflow_q);

        let price = price_curve[t];

        // Per-action reward is independent across actions; `collect()` on
        // an indexed parallel iterator preserves action order regardless
        // of which thread finishes first, so the argmax below is a pure
        // function of the (deterministic) reward values, not of scheduling.
        let rewards: Vec<Array1<f64>> = (0..catalogue.len())
            .into_par_iter()
            .map(|a| {
                let basin_flow: Vec<Array1<f64>> =
                    step_actions.basin_flow_net[a].iter().map(|q| q.mapv(|v| v * dt_seconds)).collect();
                let l_a = transition_operator(&volumes, &num_states, &basin_flow);
                let l = spmatmul(&l_in, &l_a);

                let mut immediate = Array1::<f64>::zeros(s);
                for power in &step_actions.turbine_power[a] {
                    immediate += &(power * price);
                }

                let future = transpose_matvec(&l, &value);
                let col_sums = column_sums(&l);
                let penalty = col_sums.mapv(|c| basin_limit_penalty * (1.0 - c));

                immediate + future - penalty
            })
            .collect();

        let mut next_value = Array1::<f64>::zeros(s);
        let mut next_policy = vec![0usize; s];
        for state in 0..s {
            let mut best_idx = 0usize;
            let mut best_val = rewards[0][state];
            for (a, reward) in rewards.iter().enumerate().skip(1) {
                if reward[state] > best_val {
                    best_val = reward[state];
                    best_idx = a;
                }
            }
            next_value[state] = best_val;
            next_policy[state] = best_idx;
        }

        for state in 0..s {
            policy_grid[[t, state]] = next_policy[state];
            value_grid[[t, state]] = next_value[state];
        }
        value = next_value;
    }

    Ok((policy_grid, value_grid))
}
