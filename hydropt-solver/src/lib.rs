//! Sparse-transition backward induction DP engine for cascaded hydropower
//! dispatch.
//!
//! Consumes the topology, action catalogue, and constraint model from
//! `hydropt-core`; builds sparse state-transition operators per action
//! per time step (`transition`); drives backward induction (`induction`)
//! and forward propagation (`forward`) from a [`scenario::Scenario`]; and
//! returns the realized dispatch schedule plus its valuation.

pub mod cancel;
pub mod error;
pub mod forward;
pub mod induction;
pub mod scenario;
pub mod sparse;
pub mod transition;
pub mod underlyings;

pub use cancel::CancelToken;
pub use error::{Result, SolverError};
pub use forward::{forward_propagation, ForwardResult};
pub use induction::backward_induction;
pub use scenario::{Scenario, ScenarioOptions, ScenarioResults};
pub use transition::transition_operator;
pub use underlyings::{TimeGrid, Underlyings};
