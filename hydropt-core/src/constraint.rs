use crate::error::ConfigError;
use crate::topology::Plant;
use crate::turbine::TurbineIndex;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::rc::Rc;

/// A time-bounded power restriction on a single turbine.
///
/// Effective bounds (see `spec.md` section 4.3):
/// `upper = min(power_max, turbine.max_power) + margin_max`;
/// `lower = max(power_min, turbine.base_load) + margin_min` when
/// `power_min + margin_min > 0`, else `lower = power_min + margin_min`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurbineConstraint {
    turbine: TurbineIndex,
    time_start: NaiveDateTime,
    time_end: NaiveDateTime,
    power_max: f64,
    power_min: f64,
    margin_max: f64,
    margin_min: f64,
}

impl TurbineConstraint {
    pub fn new(turbine: TurbineIndex, time_start: NaiveDateTime, time_end: NaiveDateTime) -> Self {
        Self {
            turbine,
            time_start,
            time_end,
            power_max: f64::INFINITY,
            power_min: f64::NEG_INFINITY,
            margin_max: 0.0,
            margin_min: 0.0,
        }
    }

    pub fn with_power_max(mut self, power_max: f64) -> Self {
        self.power_max = power_max;
        self
    }

    pub fn with_power_min(mut self, power_min: f64) -> Self {
        self.power_min = power_min;
        self
    }

    pub fn with_margin_max(mut self, margin_max: f64) -> Self {
        self.margin_max = margin_max;
        self
    }

    pub fn with_margin_min(mut self, margin_min: f64) -> Self {
        self.margin_min = margin_min;
        self
    }

    pub fn turbine(&self) -> TurbineIndex {
        self.turbine
    }

    pub fn time_start(&self) -> NaiveDateTime {
        self.time_start
    }

    pub fn time_end(&self) -> NaiveDateTime {
        self.time_end
    }

    pub fn upper_bound(&self, plant: &Plant) -> f64 {
        let max_power = plant.turbines()[*self.turbine].max_power();
        self.power_max.min(max_power) + self.margin_max
    }

    pub fn lower_bound(&self, plant: &Plant) -> f64 {
        let base_load = plant.turbines()[*self.turbine].base_load();
        let tentative = self.power_min.max(0.0) + self.margin_min;
        if tentative > 0.0 {
            self.power_min.max(base_load) + self.margin_min
        } else {
            self.power_min + self.margin_min
        }
    }

    /// Clamp a power setpoint to `[lower_bound, upper_bound]`.
    pub fn transform(&self, power: f64, plant: &Plant) -> f64 {
        power.max(self.lower_bound(plant)).min(self.upper_bound(plant))
    }

    pub fn validate(&self, plant: &Plant) -> Result<(), ConfigError> {
        let upper = self.upper_bound(plant);
        let lower = self.lower_bound(plant);
        if upper < lower {
            return Err(ConfigError::ConstraintBoundsInverted {
                turbine: plant.turbines()[*self.turbine].name().to_string(),
                upper,
                lower,
            });
        }
        Ok(())
    }

    /// Conjunction of two constraints on the same turbine: intersect the
    /// time window, tighten the bounds (`min` on the maxima, `max` on the
    /// minima).
    pub fn intersect(&self, other: &Self, plant: &Plant) -> Result<Self, ConfigError> {
        if self.turbine != other.turbine {
            return Err(ConfigError::MismatchedConstraintTurbines {
                a: plant.turbines()[*self.turbine].name().to_string(),
                b: plant.turbines()[*other.turbine].name().to_string(),
            });
        }
        let combined = Self {
            turbine: self.turbine,
            time_start: self.time_start.max(other.time_start),
            time_end: self.time_end.min(other.time_end),
            power_max: self.power_max.min(other.power_max),
            power_min: self.power_min.max(other.power_min),
            margin_max: self.margin_max.min(other.margin_max),
            margin_min: self.margin_min.max(other.margin_min),
        };
        combined.validate(plant)?;
        Ok(combined)
    }
}

/// The per-step constraint map for a single time step: which turbines are
/// restricted, and by how much.
pub type StepConstraints = BTreeMap<TurbineIndex, TurbineConstraint>;

/// A length-T sequence of per-step constraint maps over `[time_start,
/// time_end)`. Any two steps with an identical map share the same [`Rc`]
/// allocation, regardless of adjacency, so downstream memoization (the
/// action catalogue's per-step precomputed arrays) can key off pointer
/// identity instead of a deep map comparison — mirroring the source's
/// `ConstraintsSeries`.
#[derive(Debug, Clone)]
pub struct ConstraintsSeries {
    steps: Vec<Rc<StepConstraints>>,
}

impl Deref for ConstraintsSeries {
    type Target = [Rc<StepConstraints>];
    fn deref(&self) -> &Self::Target {
        &self.steps
    }
}

impl ConstraintsSeries {
    /// Build the per-step maps from a list of constraints and a list of
    /// `[start, end)` windows, one per time step.
    ///
    /// A constraint applies to step `i` when `window[i].0` falls in
    /// `[constraint.time_start, constraint.time_end)` — matching the
    /// source's "does this step's instant fall inside the constraint"
    /// semantics rather than requiring full window containment.
    pub fn build(
        steps: &[(NaiveDateTime, NaiveDateTime)],
        constraints: &[TurbineConstraint],
        plant: &Plant,
    ) -> Result<Self, ConfigError> {
        let mut maps: Vec<StepConstraints> = vec![StepConstraints::new(); steps.len()];

        for constraint in constraints {
            for (i, window) in steps.iter().enumerate() {
                if window.0 >= constraint.time_start() && window.0 < constraint.time_end() {
                    let map = &mut maps[i];
                    match map.remove(&constraint.turbine()) {
                        Some(existing) => {
                            map.insert(constraint.turbine(), existing.intersect(constraint, plant)?);
                        }
                        None => {
                            map.insert(constraint.turbine(), constraint.clone());
                        }
                    }
                }
            }
        }

        // `TurbineConstraint` carries `f64` fields, so `StepConstraints` has
        // no `Hash` impl and can't key a `HashMap`; dedup against every
        // distinct map seen so far with a linear scan instead.
        let mut shared: Vec<Rc<StepConstraints>> = Vec::with_capacity(maps.len());
        let mut unique: Vec<Rc<StepConstraints>> = Vec::new();
        for map in maps {
            let rc = match unique.iter().find(|u| ***u == map) {
                Some(existing) => Rc::clone(existing),
                None => {
                    let rc = Rc::new(map);
                    unique.push(Rc::clone(&rc));
                    rc
                }
            };
            shared.push(rc);
        }

        Ok(Self { steps: shared })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basin::{Basin, LevelCurve, Outflow};
    use crate::topology::{BasinVec, OutflowVec, TurbineVec};
    use crate::turbine::{BasinEndpoint, Turbine, TurbineAction};
    use chrono::NaiveDate;

    fn test_plant() -> Plant {
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

    fn dt(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn no_op_constraint_does_not_restrict() {
        let plant = test_plant();
        let c = TurbineConstraint::new(TurbineIndex(0), dt(0), dt(1));
        assert_eq!(c.upper_bound(&plant), 45e6);
        assert_eq!(c.lower_bound(&plant), f64::NEG_INFINITY);
    }

    #[test]
    fn force_off_sets_zero_bounds() {
        let plant = test_plant();
        let c = TurbineConstraint::new(TurbineIndex(0), dt(0), dt(1)).with_power_max(0.0);
        assert_eq!(c.transform(45e6, &plant), 0.0);
    }

    #[test]
    fn inverted_bounds_rejected() {
        let plant = test_plant();
        let c = TurbineConstraint::new(TurbineIndex(0), dt(0), dt(1))
            .with_power_max(0.0)
            .with_power_min(10e6);
        assert!(c.validate(&plant).is_err());
    }

    #[test]
    fn intersection_tightens() {
        let plant = test_plant();
        let a = TurbineConstraint::new(TurbineIndex(0), dt(0), dt(5)).with_margin_max(-2.0);
        let b = TurbineConstraint::new(TurbineIndex(0), dt(1), dt(6)).with_margin_max(-4.0);
        let combined = a.intersect(&b, &plant).unwrap();
        assert_eq!(combined.time_start(), dt(1));
        assert_eq!(combined.time_end(), dt(5));
        assert_eq!(combined.margin_max, -4.0);
    }

    #[test]
    fn consecutive_identical_steps_share_allocation() {
        let plant = test_plant();
        let windows: Vec<_> = (0..4).map(|h| (dt(h), dt(h + 1))).collect();
        let constraints = vec![TurbineConstraint::new(TurbineIndex(0), dt(1), dt(3)).with_power_max(10e6)];
        let series = ConstraintsSeries::build(&windows, &constraints, &plant).unwrap();
        assert_eq!(series.len(), 4);
        assert!(Rc::ptr_eq(&series[1], &series[2]));
        assert!(!Rc::ptr_eq(&series[0], &series[1]));
    }

    #[test]
    fn non_adjacent_identical_steps_share_allocation() {
        let plant = test_plant();
        let windows: Vec<_> = (0..3).map(|h| (dt(h), dt(h + 1))).collect();
        // Applies to steps 0 and 2 but not step 1: maps [A, B, A].
        let constraints = vec![
            TurbineConstraint::new(TurbineIndex(0), dt(0), dt(1)).with_power_max(10e6),
            TurbineConstraint::new(TurbineIndex(0), dt(2), dt(3)).with_power_max(10e6),
        ];
        let series = ConstraintsSeries::build(&windows, &constraints, &plant).unwrap();
        assert_eq!(series.len(), 3);
        assert!(Rc::ptr_eq(&series[0], &series[2]));
        assert!(!Rc::ptr_eq(&series[0], &series[1]));
    }
}
