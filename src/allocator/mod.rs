//! Per-sector resource allocation over a country's city network.
//!
//! Each iteration, one [`ResourceAllocator`] per sector per country builds
//! a capacitated network-flow LP from committed state, solves it, clamps
//! the solution to its bounds, audits the clamped point against its own
//! balance rows, and writes production and throughput levels back onto the
//! facilities. Any failure leaves every
//! level exactly as it was and surfaces as a non-fatal
//! [`AllocationOutcome`]; the simulation continues degraded instead of
//! halting.

mod problem;

use std::collections::HashMap;

use minilp::Variable;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{LevelError, NodeId, Sector};
use crate::society::World;

use problem::{first_balance_violation, FlowPlan, FlowProblem};

/// Numeric policy for the solve and the post-solve audit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Absolute tolerance for the flow-conservation audit.
    pub tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self { tolerance: 1e-3 }
    }
}

/// Result of one allocation attempt. Failures are diagnostics, not errors:
/// the driver records them and moves on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllocationOutcome {
    Solved { objective: f64, variables: usize },
    Infeasible,
    Unbounded,
    /// The solution, clamped to its bounds, does not balance the rows.
    OutOfBalance { city: String, gap: f64 },
    /// A level write was rejected. Unreachable when clamping holds; kept as
    /// the defensive half of the facility setter contract.
    LevelRejected { reason: String },
}

impl AllocationOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved { .. })
    }
}

/// The allocator for one sector of one top-level country.
#[derive(Debug, Clone)]
pub struct ResourceAllocator {
    country: NodeId,
    sector: Sector,
    options: SolverOptions,
}

impl ResourceAllocator {
    pub fn new(country: NodeId, sector: Sector, options: SolverOptions) -> Self {
        Self {
            country,
            sector,
            options,
        }
    }

    pub fn country(&self) -> NodeId {
        self.country
    }

    pub fn sector(&self) -> Sector {
        self.sector
    }

    /// Build, solve and apply one allocation. On any failure the world is
    /// left untouched.
    pub fn run(&self, world: &mut World) -> AllocationOutcome {
        let country_name = world.node(self.country).name().to_string();
        let built = FlowProblem::build(world, self.country, self.sector);

        // A city with demand and nothing connected to it can never balance;
        // such rows are kept out of the solver, so reject them here.
        if let Some(row) = built
            .plan()
            .rows
            .iter()
            .find(|row| row.terms.is_empty() && row.rhs > self.options.tolerance)
        {
            warn!(
                "{} allocation for '{}': city '{}' demands {} with no connected capacity",
                self.sector,
                country_name,
                world.node(row.city).name(),
                row.rhs
            );
            return AllocationOutcome::Infeasible;
        }
        if built.plan().variable_count() == 0 {
            // Nothing left to decide; every row is trivially balanced.
            return AllocationOutcome::Solved {
                objective: 0.0,
                variables: 0,
            };
        }

        let (plan, result) = built.solve();
        let solution = match result {
            Ok(solution) => solution,
            Err(minilp::Error::Infeasible) => {
                warn!(
                    "{} allocation for '{}' is infeasible; keeping prior levels",
                    self.sector, country_name
                );
                return AllocationOutcome::Infeasible;
            }
            Err(minilp::Error::Unbounded) => {
                warn!(
                    "{} allocation for '{}' is unbounded; keeping prior levels",
                    self.sector, country_name
                );
                return AllocationOutcome::Unbounded;
            }
        };

        // The committed levels are the clamped values, so the audit runs
        // at the clamped point, not the raw solver one.
        let values = plan.clamped_values(|var| solution[var]);
        if let Some((city, gap)) =
            first_balance_violation(&plan.rows, |var| values[&var], self.options.tolerance)
        {
            let city_name = world.node(city).name().to_string();
            warn!(
                "{} allocation for '{}': balance off by {} at '{}'; keeping prior levels",
                self.sector, country_name, gap, city_name
            );
            return AllocationOutcome::OutOfBalance {
                city: city_name,
                gap,
            };
        }

        match self.apply(world, &plan, &values) {
            Ok(()) => {
                debug!(
                    "{} allocation for '{}' solved: objective {}, {} variables",
                    self.sector,
                    country_name,
                    solution.objective(),
                    plan.variable_count()
                );
                AllocationOutcome::Solved {
                    objective: solution.objective(),
                    variables: plan.variable_count(),
                }
            }
            Err(err) => {
                warn!(
                    "{} allocation for '{}': level write rejected ({}); levels restored",
                    self.sector, country_name, err
                );
                AllocationOutcome::LevelRejected {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Write the audited clamped values back onto facilities and slacks.
    /// All writes land or none do: a rejected write restores the snapshot
    /// taken before the first one.
    fn apply(
        &self,
        world: &mut World,
        plan: &FlowPlan,
        values: &HashMap<Variable, f64>,
    ) -> Result<(), LevelError> {
        let mut by_city: HashMap<NodeId, Vec<(usize, f64)>> = HashMap::new();
        for planned in &plan.facilities {
            by_city
                .entry(planned.city)
                .or_default()
                .push((planned.slot, values[&planned.var]));
        }

        let mut snapshot: Vec<(NodeId, usize, f64)> = Vec::new();
        for (&city, writes) in &by_city {
            if let Some(system) = world.node(city).system(self.sector).as_computing() {
                let handle = system.facilities();
                let guard = handle.read();
                for &(slot, _) in writes {
                    snapshot.push((city, slot, guard[slot].stored_level()));
                }
            }
        }

        let mut failure = None;
        'apply: for (&city, writes) in &by_city {
            let Some(system) = world.node_mut(city).system_mut(self.sector).as_computing_mut()
            else {
                continue;
            };
            let handle = system.facilities();
            let mut guard = handle.write();
            for &(slot, value) in writes {
                if let Err(err) = guard[slot].set_level(value) {
                    failure = Some(err);
                    break 'apply;
                }
            }
            drop(guard);
            system.bump_revision();
        }
        if let Some(err) = failure {
            for &(city, slot, level) in &snapshot {
                if let Some(system) = world.node(city).system(self.sector).as_computing() {
                    let handle = system.facilities();
                    let _ = handle.write()[slot].set_level(level);
                }
            }
            return Err(err);
        }

        for city_plan in &plan.cities {
            let Some(system) = world
                .node_mut(city_plan.city)
                .system_mut(self.sector)
                .as_computing_mut()
            else {
                continue;
            };
            if let Some(slack) = city_plan.import {
                system.set_import_level(values[&slack.var]);
            }
            if let Some(slack) = city_plan.export {
                system.set_export_level(values[&slack.var]);
            }
        }
        Ok(())
    }
}
