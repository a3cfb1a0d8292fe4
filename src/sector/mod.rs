//! Sector systems: the per-node, per-sector aggregation layer.
//!
//! Every society node carries one system per sector. A system is either
//! *computing* (owns facilities, derives its economics from them) or
//! *externally fed* (a placeholder written by an outside actor). Both share
//! the read contract below; only the external variant accepts writes from
//! outside the engine.

pub mod computing;
pub mod economics;
pub mod external;

pub use computing::{ComputingSystem, FacilitySet};
pub use economics::{Economics, Ledger};
pub use external::ExternalSystem;

use crate::domain::{Commodity, CommodityMap};

/// One sector's system at one node.
#[derive(Debug, Clone)]
pub enum SectorSystem {
    Computing(ComputingSystem),
    External(ExternalSystem),
}

impl SectorSystem {
    pub fn is_externally_fed(&self) -> bool {
        matches!(self, Self::External(_))
    }

    /// Unit price of the sector's commodity at this node.
    pub fn price(&self) -> f64 {
        match self {
            Self::Computing(s) => s.price(),
            Self::External(s) => s.price(),
        }
    }

    /// Committed cash flow for the last completed period.
    pub fn cash_flow(&self) -> f64 {
        match self {
            Self::Computing(s) => s.cash_flow(),
            Self::External(s) => s.cash_flow(),
        }
    }

    /// Committed production of the sector's commodity.
    pub fn domestic_production(&self) -> f64 {
        match self {
            Self::Computing(s) => s.domestic_production(),
            Self::External(s) => s.domestic_production(),
        }
    }

    /// Committed consumption of one input commodity.
    pub fn consumption(&self, commodity: Commodity) -> f64 {
        self.consumption_map()[commodity]
    }

    pub fn consumption_map(&self) -> &CommodityMap<f64> {
        match self {
            Self::Computing(s) => s.consumption(),
            Self::External(s) => s.consumption(),
        }
    }

    pub fn cumulative_capital_expense(&self) -> f64 {
        match self {
            Self::Computing(s) => s.ledger().cumulative_capital_expense(),
            Self::External(_) => 0.0,
        }
    }

    pub fn cumulative_cash_flow(&self) -> f64 {
        match self {
            Self::Computing(s) => s.ledger().cumulative_cash_flow(),
            Self::External(s) => s.cumulative_cash_flow(),
        }
    }

    /// Change counter shared by both variants, for pollers.
    pub fn revision(&self) -> u64 {
        match self {
            Self::Computing(s) => s.revision(),
            Self::External(s) => s.revision(),
        }
    }

    pub fn as_computing(&self) -> Option<&ComputingSystem> {
        match self {
            Self::Computing(s) => Some(s),
            Self::External(_) => None,
        }
    }

    pub fn as_computing_mut(&mut self) -> Option<&mut ComputingSystem> {
        match self {
            Self::Computing(s) => Some(s),
            Self::External(_) => None,
        }
    }

    pub fn as_external(&self) -> Option<&ExternalSystem> {
        match self {
            Self::Computing(_) => None,
            Self::External(s) => Some(s),
        }
    }

    /// The write contract for outside actors; `None` for computing systems.
    pub fn as_external_mut(&mut self) -> Option<&mut ExternalSystem> {
        match self {
            Self::Computing(_) => None,
            Self::External(s) => Some(s),
        }
    }

    pub(crate) fn commit(&mut self) {
        match self {
            Self::Computing(s) => s.commit(),
            Self::External(s) => s.commit(),
        }
    }

    pub(crate) fn advance_lifecycles(&mut self) {
        if let Self::Computing(s) = self {
            s.advance_lifecycles();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_share_read_contract() {
        let mut external = ExternalSystem::new(7.0);
        external.set_cash_flow(10.0);
        external.set_consumption(Commodity::Fuel, 3.0);

        let systems = [
            SectorSystem::Computing(ComputingSystem::new(7.0)),
            SectorSystem::External(external),
        ];

        for system in &systems {
            assert_eq!(system.price(), 7.0);
            // Both variants answer the same queries without panicking.
            let _ = system.cash_flow();
            let _ = system.domestic_production();
            let _ = system.consumption(Commodity::Fuel);
            let _ = system.revision();
        }

        assert_eq!(systems[0].cash_flow(), 0.0);
        assert_eq!(systems[1].cash_flow(), 10.0);
        assert_eq!(systems[1].consumption(Commodity::Fuel), 3.0);
    }

    #[test]
    fn test_write_contract_reaches_only_external_variant() {
        let mut computing = SectorSystem::Computing(ComputingSystem::new(1.0));
        let mut external = SectorSystem::External(ExternalSystem::new(1.0));

        assert!(computing.as_external_mut().is_none());
        assert!(external.as_external_mut().is_some());
        assert!(computing.as_computing_mut().is_some());

        if let Some(sys) = external.as_external_mut() {
            sys.set_domestic_production(42.0);
        }
        assert_eq!(external.domestic_production(), 42.0);
    }
}
