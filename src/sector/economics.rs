//! Per-system economic aggregates and the tick/tock ledger.
//!
//! An [`Economics`] value is one period's worth of expenses, revenues and
//! physical totals for a single sector system. During tick the driver
//! computes a fresh snapshot from committed state and stages it; tock moves
//! the staged snapshot into `current` and folds it into the cumulative
//! counters. Readers (roll-ups, reports, the allocator) only ever see
//! `current`.

use serde::{Deserialize, Serialize};

use crate::domain::CommodityMap;

/// One period of expenses, revenues and physical totals for one system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Economics {
    /// Capital cost recognized this period (lump or levelized slice).
    pub capital_expense: f64,
    /// Fixed plus variable operating cost of owned facilities.
    pub operating_expense: f64,
    /// Decommission cost recognized this period.
    pub decommission_expense: f64,
    /// Price × commodity delivered into this node by facilities it does
    /// not own.
    pub distribution_expense: f64,
    /// Import price × fallback quantity drawn from outside the network.
    pub import_expense: f64,
    /// Price × local demand satisfied from the network (net of fallback).
    pub sales_revenue: f64,
    /// Price × commodity delivered out of this node, net of losses.
    pub distribution_revenue: f64,
    /// Export price × quantity pushed to the export sink.
    pub export_revenue: f64,
    /// Commodity produced by owned production facilities.
    pub domestic_production: f64,
    /// Input commodities consumed by owned production facilities.
    pub consumption: CommodityMap<f64>,
}

impl Economics {
    pub fn expenses(&self) -> f64 {
        self.capital_expense
            + self.operating_expense
            + self.decommission_expense
            + self.distribution_expense
            + self.import_expense
    }

    pub fn revenues(&self) -> f64 {
        self.sales_revenue + self.distribution_revenue + self.export_revenue
    }

    pub fn cash_flow(&self) -> f64 {
        self.revenues() - self.expenses()
    }
}

/// Double-buffered economics for one system.
///
/// `current` is the committed snapshot everyone reads; `staged` is written
/// during tick and becomes visible only at [`Ledger::commit`]. The split is
/// what makes a tick/tock round independent of traversal order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    current: Economics,
    staged: Economics,
    cumulative_capital_expense: f64,
    cumulative_cash_flow: f64,
}

impl Ledger {
    pub fn current(&self) -> &Economics {
        &self.current
    }

    pub fn cumulative_capital_expense(&self) -> f64 {
        self.cumulative_capital_expense
    }

    pub fn cumulative_cash_flow(&self) -> f64 {
        self.cumulative_cash_flow
    }

    pub(crate) fn stage(&mut self, economics: Economics) {
        self.staged = economics;
    }

    pub(crate) fn commit(&mut self) {
        self.current = std::mem::take(&mut self.staged);
        self.cumulative_capital_expense += self.current.capital_expense;
        self.cumulative_cash_flow += self.current.cash_flow();
    }
}
