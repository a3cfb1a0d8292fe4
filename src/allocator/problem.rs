//! Construction of the per-sector network-flow problem.
//!
//! The problem is transient: rebuilt from committed world state on every
//! iteration, solved once, and dropped. Only the solution is written back.

use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};
use std::collections::HashMap;

use crate::domain::{Commodity, Facility, NodeId, Sector};
use crate::society::World;

/// One decision variable bound to a facility slot of one city's system.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlannedFacility {
    pub city: NodeId,
    /// Index into the owning system's facility collection.
    pub slot: usize,
    pub var: Variable,
    pub max: f64,
}

/// A bounded slack variable attached to one city.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlackVar {
    pub var: Variable,
    pub bound: f64,
}

/// Per-city slack variables; absent when the capacity is zero.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CityPlan {
    pub city: NodeId,
    pub import: Option<SlackVar>,
    pub export: Option<SlackVar>,
}

/// One city's flow-conservation equality, kept for the post-solve audit.
#[derive(Debug, Clone)]
pub(crate) struct BalanceRow {
    pub city: NodeId,
    pub terms: Vec<(Variable, f64)>,
    pub rhs: f64,
}

/// Everything the write-back and audit need to interpret a solution.
#[derive(Debug, Clone)]
pub(crate) struct FlowPlan {
    pub facilities: Vec<PlannedFacility>,
    pub cities: Vec<CityPlan>,
    pub rows: Vec<BalanceRow>,
}

impl FlowPlan {
    pub(crate) fn variable_count(&self) -> usize {
        self.facilities.len()
            + self
                .cities
                .iter()
                .map(|p| usize::from(p.import.is_some()) + usize::from(p.export.is_some()))
                .sum::<usize>()
    }

    /// Solver output clamped to each variable's declared bound. The audit
    /// and the write-back both read from this map, so the values checked
    /// are exactly the values committed.
    pub(crate) fn clamped_values(
        &self,
        value: impl Fn(Variable) -> f64,
    ) -> HashMap<Variable, f64> {
        let mut clamped = HashMap::new();
        for planned in &self.facilities {
            clamped.insert(planned.var, value(planned.var).clamp(0.0, planned.max));
        }
        for city in &self.cities {
            for slack in [city.import, city.export].into_iter().flatten() {
                clamped.insert(slack.var, value(slack.var).clamp(0.0, slack.bound));
            }
        }
        clamped
    }
}

/// A fully assembled allocation problem for one sector of one country.
pub(crate) struct FlowProblem {
    problem: Problem,
    plan: FlowPlan,
}

impl FlowProblem {
    /// Build the problem from committed state.
    ///
    /// Cities whose system for this sector is externally fed are out of the
    /// network: no balance row, no slacks. Facilities outside their
    /// operational window get no variable at all, leaving their stored
    /// level untouched by any later write-back.
    pub(crate) fn build(world: &World, country: NodeId, sector: Sector) -> Self {
        let commodity = sector.commodity();
        let mut problem = Problem::new(OptimizationDirection::Minimize);

        let cities: Vec<NodeId> = world
            .covered_cities(country)
            .into_iter()
            .filter(|&city| !world.node(city).system(sector).is_externally_fed())
            .collect();
        let row_of: HashMap<NodeId, usize> =
            cities.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let mut terms: Vec<Vec<(Variable, f64)>> = vec![Vec::new(); cities.len()];

        // The effective unit value of each input commodity, charged against
        // production variables as an opportunity cost.
        let input_price = |c: Commodity| -> f64 {
            world.node(country).system(c.sector()).price() + world.price_delta(c)
        };

        let mut facilities = Vec::new();
        for &city in &cities {
            let Some(system) = world.node(city).system(sector).as_computing() else {
                continue;
            };
            let handle = system.facilities();
            let guard = handle.read();
            for (slot, facility) in guard.iter().enumerate() {
                if !facility.is_operational() {
                    continue;
                }
                match facility {
                    Facility::Production(plant) => {
                        let cost = plant.variable_cost()
                            + Commodity::ALL
                                .iter()
                                .map(|&c| plant.input_intensity(c) * input_price(c))
                                .sum::<f64>();
                        let var = problem.add_var(cost, (0.0, plant.max_production()));
                        terms[row_of[&city]].push((var, 1.0));
                        facilities.push(PlannedFacility {
                            city,
                            slot,
                            var,
                            max: plant.max_production(),
                        });
                    }
                    Facility::Distribution(link) => {
                        let var =
                            problem.add_var(link.variable_cost(), (0.0, link.max_throughput()));
                        // Origin side first; a link never contributes twice
                        // to one row since equal endpoints are rejected at
                        // construction. Destinations without a row (other
                        // countries, externally fed cities) are plain sinks.
                        terms[row_of[&city]].push((var, -1.0));
                        if link.destination() != link.origin() {
                            if let Some(&row) = row_of.get(&link.destination()) {
                                terms[row].push((var, link.efficiency()));
                            }
                        }
                        facilities.push(PlannedFacility {
                            city,
                            slot,
                            var,
                            max: link.max_throughput(),
                        });
                    }
                }
            }
        }

        let mut plans = Vec::with_capacity(cities.len());
        for &city in &cities {
            let node = world.node(city);
            let import_bound = node.import_capacity()[commodity];
            let import = (import_bound > 0.0).then(|| {
                let var = problem.add_var(world.import_price(commodity), (0.0, import_bound));
                terms[row_of[&city]].push((var, 1.0));
                SlackVar {
                    var,
                    bound: import_bound,
                }
            });
            let export_bound = node.export_capacity()[commodity];
            let export = (export_bound > 0.0).then(|| {
                let var = problem.add_var(-world.export_price(commodity), (0.0, export_bound));
                terms[row_of[&city]].push((var, -1.0));
                SlackVar {
                    var,
                    bound: export_bound,
                }
            });
            plans.push(CityPlan {
                city,
                import,
                export,
            });
        }

        let mut rows = Vec::with_capacity(cities.len());
        for (&city, terms) in cities.iter().zip(terms) {
            let rhs = world.net_city_demand(city, commodity);
            // A termless row constrains nothing the solver can decide; it
            // stays in the plan so the caller can reject unmeetable demand
            // up front.
            if !terms.is_empty() {
                let mut expr = LinearExpr::empty();
                for &(var, coeff) in &terms {
                    expr.add(var, coeff);
                }
                problem.add_constraint(expr, ComparisonOp::Eq, rhs);
            }
            rows.push(BalanceRow { city, terms, rhs });
        }

        Self {
            problem,
            plan: FlowPlan {
                facilities,
                cities: plans,
                rows,
            },
        }
    }

    pub(crate) fn plan(&self) -> &FlowPlan {
        &self.plan
    }

    pub(crate) fn solve(self) -> (FlowPlan, Result<minilp::Solution, minilp::Error>) {
        let Self { problem, plan } = self;
        let result = problem.solve();
        (plan, result)
    }
}

/// First city whose balance is off by more than `tolerance`, with its gap.
/// Non-finite solver output fails the check as well.
pub(crate) fn first_balance_violation(
    rows: &[BalanceRow],
    value: impl Fn(Variable) -> f64,
    tolerance: f64,
) -> Option<(NodeId, f64)> {
    for row in rows {
        let lhs: f64 = row.terms.iter().map(|&(var, coeff)| coeff * value(var)).sum();
        let gap = (lhs - row.rhs).abs();
        if !(gap <= tolerance) {
            return Some((row.city, gap));
        }
    }
    None
}
