//! Sparse state-transition operator construction (`spec.md` section 4.4).

use crate::sparse::{identity, spmatmul};
use hydropt_core::index;
use ndarray::Array1;
use sprs::{CsMat, TriMatI};

/// Build the column-stochastic transition operator `L` for a net basin
/// outflow `q` (one length-`S` array per tracked basin, in the same units
/// as volume — callers convert flow rate to per-step volume change before
/// calling this).
///
/// Constructed one basin at a time (`single_basin_operator`), then combined
/// by sparse matrix product; since each single-basin operator only acts on
/// its own coordinate, the combination order does not affect the result up
/// to floating-point rounding.
pub fn transition_operator(volumes: &[f64], num_states: &[usize], q: &[Array1<f64>]) -> CsMat<f64> {
    let total = index::product_state_count(num_states);
    let mut combined: Option<CsMat<f64>> = None;
    for b in 0..num_states.len() {
        let op = single_basin_operator(b, volumes[b], num_states, total, &q[b]);
        combined = Some(match combined {
            Some(acc) => spmatmul(&acc, &op),
            None => op,
        });
    }
    combined.unwrap_or_else(|| identity(total))
}

/// The single-basin operator for basin `b`: for product state `j` with
/// basin-`b` coordinate `k`, the outflow `q[j]` moves probability mass to
/// the two discrete indices bracketing `k - q[j]/dv_b`, weighted by linear
/// interpolation. `dk_floor` truncates toward zero (matching the
/// reference model's integer cast, not a mathematical floor) so that for
/// negative `q` (inflow) the bracket is `(trunc(q/dv), trunc(q/dv) - 1)`
/// rather than the conventional floor/ceil pair.
fn single_basin_operator(b: usize, volume: f64, num_states: &[usize], total: usize, q: &Array1<f64>) -> CsMat<f64> {
    let n_b = num_states[b] as isize;
    let dv = volume / (num_states[b] - 1) as f64;
    let stride_b = index::strides(num_states)[b] as isize;
    let coords = index::kron_index(num_states, b);

    let mut tri = TriMatI::<f64, usize>::new((total, total));
    for j in 0..total {
        let qb = q[j];
        let k = coords[j] as isize;

        if qb == 0.0 {
            tri.add_triplet(j, j, 1.0);
            continue;
        }

        let dk_floor = (qb / dv).trunc() as isize;
        let dk_ceil = dk_floor + qb.signum() as isize;
        let p_ceil = (qb.abs() % dv) / dv;
        let p_floor = 1.0 - p_ceil;

        let k_floor = k - dk_floor;
        if k_floor >= 0 && k_floor < n_b && p_floor > 0.0 {
            let i = (j as isize - dk_floor * stride_b) as usize;
            tri.add_triplet(i, j, p_floor);
        }

        let k_ceil = k - dk_ceil;
        if k_ceil >= 0 && k_ceil < n_b && p_ceil > 0.0 {
            let i = (j as isize - dk_ceil * stride_b) as usize;
            tri.add_triplet(i, j, p_ceil);
        }
    }
    tri.to_csr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::column_sums;

    #[test]
    fn zero_action_is_identity() {
        let num_states = [5usize];
        let volumes = [100.0];
        let q = vec![Array1::zeros(5)];
        let l = transition_operator(&volumes, &num_states, &q);
        let id = identity(5);
        let a: Vec<_> = l.iter().map(|(v, idx)| (*v, idx)).collect();
        let b: Vec<_> = id.iter().map(|(v, idx)| (*v, idx)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn columns_are_substochastic() {
        let num_states = [11usize];
        let volumes = [100.0];
        // dv = 10; outflow of 35 per step at every state: moves ~3.5 steps down
        let q = vec![Array1::from_elem(11, 35.0)];
        let l = transition_operator(&volumes, &num_states, &q);
        let sums = column_sums(&l);
        assert!(sums.iter().all(|&s| s <= 1.0 + 1e-9 && s >= 0.0));
    }

    #[test]
    fn in_bounds_columns_conserve_mass() {
        let num_states = [11usize];
        let volumes = [100.0];
        // small outflow, every state except the lowest few stays in bounds
        let q = vec![Array1::from_elem(11, 5.0)];
        let l = transition_operator(&volumes, &num_states, &q);
        let sums = column_sums(&l);
        // states 1..10 move down by 0.5 steps and stay within range
        for j in 1..11 {
            assert!(float_cmp::approx_eq!(f64, sums[j], 1.0, epsilon = 1e-9), "column {j} sum {}", sums[j]);
        }
    }

    #[test]
    fn fractional_split_matches_linear_interpolation() {
        let num_states = [11usize];
        let volumes = [100.0];
        let q = vec![Array1::from_elem(11, 3.0)]; // dv=10, ratio=0.3
        let l = transition_operator(&volumes, &num_states, &q);
        // state 5: floor target 5, ceil target 4, weights 0.7/0.3
        let mut found_floor = None;
        let mut found_ceil = None;
        for (val, (i, j)) in l.iter() {
            if j == 5 {
                if i == 5 {
                    found_floor = Some(*val);
                } else if i == 4 {
                    found_ceil = Some(*val);
                }
            }
        }
        assert!(float_cmp::approx_eq!(f64, found_floor.unwrap(), 0.7, epsilon = 1e-9));
        assert!(float_cmp::approx_eq!(f64, found_ceil.unwrap(), 0.3, epsilon = 1e-9));
    }
}
