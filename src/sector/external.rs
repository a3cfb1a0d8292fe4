//! The externally-fed sector system: a placeholder whose values are written
//! by an outside actor (a federation bridge, a replay harness) instead of
//! being computed from owned facilities. It echoes whatever was last
//! written.

use crate::domain::{Commodity, CommodityMap};

/// Write-through sector system for nodes fed from outside this engine.
#[derive(Debug, Clone)]
pub struct ExternalSystem {
    price: f64,
    cash_flow: f64,
    domestic_production: f64,
    consumption: CommodityMap<f64>,
    cumulative_cash_flow: f64,
    revision: u64,
}

impl ExternalSystem {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            cash_flow: 0.0,
            domestic_production: 0.0,
            consumption: CommodityMap::default(),
            cumulative_cash_flow: 0.0,
            revision: 0,
        }
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn cash_flow(&self) -> f64 {
        self.cash_flow
    }

    pub fn domestic_production(&self) -> f64 {
        self.domestic_production
    }

    pub fn consumption(&self) -> &CommodityMap<f64> {
        &self.consumption
    }

    pub fn cumulative_cash_flow(&self) -> f64 {
        self.cumulative_cash_flow
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_price(&mut self, value: f64) {
        self.price = value;
        self.revision += 1;
    }

    pub fn set_cash_flow(&mut self, value: f64) {
        self.cash_flow = value;
        self.revision += 1;
    }

    pub fn set_domestic_production(&mut self, value: f64) {
        self.domestic_production = value;
        self.revision += 1;
    }

    pub fn set_consumption(&mut self, commodity: Commodity, value: f64) {
        self.consumption[commodity] = value;
        self.revision += 1;
    }

    /// Fold the externally written cash flow into the running total. The
    /// stored values themselves persist until the actor writes again.
    pub(crate) fn commit(&mut self) {
        self.cumulative_cash_flow += self.cash_flow;
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_echo_and_bump_revision() {
        let mut system = ExternalSystem::new(8.0);
        let r0 = system.revision();

        system.set_cash_flow(-120.0);
        system.set_domestic_production(55.0);
        system.set_consumption(Commodity::Power, 14.0);
        system.set_price(9.5);

        assert_eq!(system.cash_flow(), -120.0);
        assert_eq!(system.domestic_production(), 55.0);
        assert_eq!(system.consumption()[Commodity::Power], 14.0);
        assert_eq!(system.price(), 9.5);
        assert_eq!(system.revision(), r0 + 4);
    }

    #[test]
    fn test_commit_accumulates_but_keeps_values() {
        let mut system = ExternalSystem::new(8.0);
        system.set_cash_flow(-120.0);

        system.commit();
        system.commit();

        assert_eq!(system.cash_flow(), -120.0);
        assert_eq!(system.cumulative_cash_flow(), -240.0);
    }
}
