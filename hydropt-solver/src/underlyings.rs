//! Exogenous scenario inputs: a uniform time grid, a price curve, and an
//! inflow-rate matrix (`spec.md` section 3, "Underlyings" / section 6).

use crate::error::{Result, SolverError};
use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A strictly increasing, uniform-step time grid.
///
/// Mirrors the teacher's `PywrDuration`/`Timestepper` pattern of wrapping
/// `chrono` types in a small newtype rather than threading raw
/// `NaiveDateTime`/`TimeDelta` values through the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeGrid {
    steps: Vec<NaiveDateTime>,
    dt_seconds: f64,
}

impl TimeGrid {
    pub fn new(steps: Vec<NaiveDateTime>) -> Result<Self> {
        if steps.len() < 2 {
            return Err(SolverError::InvalidTimeGrid(format!(
                "time_index must have at least 2 entries, found {}",
                steps.len()
            )));
        }
        let dt_seconds = (steps[1] - steps[0]).num_milliseconds() as f64 / 1000.0;
        if dt_seconds <= 0.0 {
            return Err(SolverError::InvalidTimeGrid("time_index must be strictly increasing".into()));
        }
        for w in steps.windows(2) {
            let d = (w[1] - w[0]).num_milliseconds() as f64 / 1000.0;
            if (d - dt_seconds).abs() > 1e-6 {
                return Err(SolverError::InvalidTimeGrid(format!(
                    "time_index must have a uniform step: expected {dt_seconds}s, found {d}s"
                )));
            }
        }
        Ok(Self { steps, dt_seconds })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The uniform step `Δt`, in seconds.
    pub fn dt_seconds(&self) -> f64 {
        self.dt_seconds
    }

    pub fn steps(&self) -> &[NaiveDateTime] {
        &self.steps
    }

    /// The half-open `[start, start + Δt)` window of each step, used by
    /// [`hydropt_core::ConstraintsSeries::build`] to decide which
    /// constraints apply at that step.
    pub fn windows(&self) -> Vec<(NaiveDateTime, NaiveDateTime)> {
        let step = chrono::TimeDelta::milliseconds((self.dt_seconds * 1000.0).round() as i64);
        self.steps.iter().map(|&t| (t, t + step)).collect()
    }
}

/// Exogenous series parameterizing a scenario: the time grid, the forward
/// price curve, and the per-basin inflow-rate matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Underlyings {
    time: TimeGrid,
    price_curve: Vec<f64>,
    inflow_rate: Array2<f64>,
}

impl Underlyings {
    /// Build and validate against a plant with `num_basins` tracked basins.
    ///
    /// `inflow_rate` is `T x num_basins`, nonnegative, m^3/s.
    pub fn new(time: TimeGrid, price_curve: Vec<f64>, inflow_rate: Array2<f64>, num_basins: usize) -> Result<Self> {
        let t = time.len();
        if price_curve.len() != t {
            return Err(SolverError::Shape {
                what: "price_curve".into(),
                expected: t,
                found: price_curve.len(),
            });
        }
        if inflow_rate.nrows() != t {
            return Err(SolverError::Shape {
                what: "inflow_rate rows".into(),
                expected: t,
                found: inflow_rate.nrows(),
            });
        }
        if inflow_rate.ncols() != num_basins {
            return Err(SolverError::Shape {
                what: "inflow_rate columns".into(),
                expected: num_basins,
                found: inflow_rate.ncols(),
            });
        }
        for (i, &p) in price_curve.iter().enumerate() {
            if !p.is_finite() {
                return Err(SolverError::Arithmetic {
                    where_: format!("price_curve[{i}]"),
                    value: p,
                });
            }
        }
        for ((i, j), &q) in inflow_rate.indexed_iter() {
            if !q.is_finite() {
                return Err(SolverError::Arithmetic {
                    where_: format!("inflow_rate[{i},{j}]"),
                    value: q,
                });
            }
            if q < 0.0 {
                return Err(SolverError::InvalidTimeGrid(format!(
                    "inflow_rate[{i},{j}] must be nonnegative, found {q}"
                )));
            }
        }
        Ok(Self {
            time,
            price_curve,
            inflow_rate,
        })
    }

    pub fn time(&self) -> &TimeGrid {
        &self.time
    }

    pub fn price_curve(&self) -> &[f64] {
        &self.price_curve
    }

    pub fn inflow_rate(&self) -> &Array2<f64> {
        &self.inflow_rate
    }

    pub fn n_steps(&self) -> usize {
        self.time.len()
    }
}
