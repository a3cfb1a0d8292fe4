//! Per-iteration reporting snapshots.
//!
//! After each tock the driver assembles one [`IterationReport`]: the
//! allocation outcomes of the round plus a read-only financial snapshot of
//! every node and sector. Reports are plain serde structs so a presentation
//! layer can stream them as JSON without touching the world.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::allocator::AllocationOutcome;
use crate::domain::{Commodity, CommodityMap, Period, Sector, SectorMap};
use crate::society::{NodeKind, World};

/// Outcome of one allocator invocation within an iteration.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationRecord {
    pub country: String,
    pub sector: Sector,
    pub outcome: AllocationOutcome,
}

/// One sector of one node, as of the latest commit.
#[derive(Debug, Clone, Serialize)]
pub struct SectorReport {
    pub sector: Sector,
    pub externally_fed: bool,
    pub price: f64,
    pub cash_flow: f64,
    pub cumulative_capital_expense: f64,
    pub cumulative_cash_flow: f64,
    pub domestic_production: f64,
    pub consumption: CommodityMap<f64>,
    /// Change counter for pollers; bumped on every observable mutation.
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: String,
    pub kind: NodeKind,
    pub funds: f64,
    /// Committed cash flow summed over the node's subtree.
    pub subtree_cash_flow: f64,
    /// Committed production per commodity over the subtree.
    pub subtree_production: CommodityMap<f64>,
    /// Committed consumption per commodity over the subtree.
    pub subtree_consumption: CommodityMap<f64>,
    pub sectors: Vec<SectorReport>,
}

/// Snapshot of one full allocate/tick/tock round.
#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    /// The period this iteration evaluated.
    pub period: Period,
    pub generated_at: DateTime<Utc>,
    pub allocations: Vec<AllocationRecord>,
    pub nodes: Vec<NodeReport>,
}

impl IterationReport {
    /// Snapshot the committed state of every node.
    pub fn capture(world: &World, period: Period, allocations: Vec<AllocationRecord>) -> Self {
        let nodes = world
            .nodes()
            .map(|(id, node)| NodeReport {
                name: node.name().to_string(),
                kind: node.kind(),
                funds: node.funds(),
                subtree_cash_flow: world.cash_flow_total(id),
                subtree_production: CommodityMap::from_fn(|c| {
                    world.production_total(id, c.sector())
                }),
                subtree_consumption: CommodityMap::from_fn(|c| world.consumption_total(id, c)),
                sectors: Sector::ALL
                    .iter()
                    .map(|&sector| {
                        let system = node.system(sector);
                        SectorReport {
                            sector,
                            externally_fed: system.is_externally_fed(),
                            price: system.price(),
                            cash_flow: system.cash_flow(),
                            cumulative_capital_expense: system.cumulative_capital_expense(),
                            cumulative_cash_flow: system.cumulative_cash_flow(),
                            domestic_production: system.domestic_production(),
                            consumption: CommodityMap::from_fn(|c| system.consumption(c)),
                            revision: system.revision(),
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            period,
            generated_at: Utc::now(),
            allocations,
            nodes,
        }
    }

    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

impl NodeReport {
    pub fn sector(&self, sector: Sector) -> &SectorReport {
        &self.sectors[sector as usize]
    }

    /// Committed consumption of one commodity summed over all four systems.
    pub fn consumption(&self, commodity: Commodity) -> f64 {
        self.sectors.iter().map(|s| s.consumption[commodity]).sum()
    }
}

/// Solver outcome tallies for one sector across a run.
#[derive(Debug, Clone, Serialize)]
pub struct SectorOutcomes {
    pub sector: Sector,
    pub solved: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountryFunds {
    pub country: String,
    pub funds: f64,
}

/// Trailer for a completed run: outcome tallies and closing balances.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub periods: u32,
    pub solved: usize,
    pub failed: usize,
    pub sectors: Vec<SectorOutcomes>,
    pub final_funds: Vec<CountryFunds>,
}

/// Full output document for one run: every iteration plus the trailer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub iterations: Vec<IterationReport>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(world: &World, iterations: Vec<IterationReport>) -> Self {
        let summary = RunSummary::from_reports(world, &iterations);
        Self {
            iterations,
            summary,
        }
    }
}

impl RunSummary {
    pub fn from_reports(world: &World, reports: &[IterationReport]) -> Self {
        let mut tallies: SectorMap<(usize, usize)> = SectorMap::default();
        for report in reports {
            for record in &report.allocations {
                let tally = &mut tallies[record.sector];
                if record.outcome.is_solved() {
                    tally.0 += 1;
                } else {
                    tally.1 += 1;
                }
            }
        }

        let sectors: Vec<SectorOutcomes> = Sector::ALL
            .iter()
            .map(|&sector| SectorOutcomes {
                sector,
                solved: tallies[sector].0,
                failed: tallies[sector].1,
            })
            .collect();
        let final_funds = world
            .roots()
            .iter()
            .map(|&id| CountryFunds {
                country: world.node(id).name().to_string(),
                funds: world.node(id).funds(),
            })
            .collect();

        Self {
            periods: reports.len() as u32,
            solved: sectors.iter().map(|s| s.solved).sum(),
            failed: sectors.iter().map(|s| s.failed).sum(),
            sectors,
            final_funds,
        }
    }
}
