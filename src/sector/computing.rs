//! The computing sector system: owns facilities and derives its economics
//! from them.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::{CommodityMap, Facility};

use super::economics::{Economics, Ledger};

/// Shared handle to a system's facility collection.
///
/// The engine itself is single-threaded, but a presentation layer may hold a
/// clone of this handle and read mid-iteration, so the collection lives
/// behind a lock rather than a plain `Vec`.
pub type FacilitySet = Arc<RwLock<Vec<Facility>>>;

/// A sector system that computes its aggregates from owned facilities.
#[derive(Debug)]
pub struct ComputingSystem {
    price: f64,
    facilities: FacilitySet,
    /// Fallback quantity drawn from outside the network, solved per
    /// iteration by the allocator.
    import_level: f64,
    /// Quantity pushed to the export sink, solved per iteration.
    export_level: f64,
    ledger: Ledger,
    revision: u64,
}

impl ComputingSystem {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            facilities: Arc::new(RwLock::new(Vec::new())),
            import_level: 0.0,
            export_level: 0.0,
            ledger: Ledger::default(),
            revision: 0,
        }
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Clone of the facility handle, for readers outside the engine.
    pub fn facilities(&self) -> FacilitySet {
        Arc::clone(&self.facilities)
    }

    pub fn facility_count(&self) -> usize {
        self.facilities.read().len()
    }

    pub fn import_level(&self) -> f64 {
        self.import_level
    }

    pub fn export_level(&self) -> f64 {
        self.export_level
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Change counter, bumped on every mutation that a poller could observe.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Committed production of the sector's commodity.
    pub fn domestic_production(&self) -> f64 {
        self.ledger.current().domestic_production
    }

    /// Committed consumption of one input commodity.
    pub fn consumption(&self) -> &CommodityMap<f64> {
        &self.ledger.current().consumption
    }

    pub fn cash_flow(&self) -> f64 {
        self.ledger.current().cash_flow()
    }

    pub(crate) fn add_facility(&mut self, facility: Facility) {
        self.facilities.write().push(facility);
        self.revision += 1;
    }

    pub(crate) fn set_import_level(&mut self, value: f64) {
        self.import_level = value;
        self.revision += 1;
    }

    pub(crate) fn set_export_level(&mut self, value: f64) {
        self.export_level = value;
        self.revision += 1;
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    pub(crate) fn stage(&mut self, economics: Economics) {
        self.ledger.stage(economics);
    }

    pub(crate) fn commit(&mut self) {
        self.ledger.commit();
        self.revision += 1;
    }

    pub(crate) fn advance_lifecycles(&mut self) {
        for facility in self.facilities.write().iter_mut() {
            facility.lifecycle_mut().advance();
        }
    }
}

// A cloned system gets its own facility collection. Sharing the handle
// across clones would let one world's allocation leak into another.
impl Clone for ComputingSystem {
    fn clone(&self) -> Self {
        let facilities = self.facilities.read().clone();
        Self {
            price: self.price,
            facilities: Arc::new(RwLock::new(facilities)),
            import_level: self.import_level,
            export_level: self.export_level,
            ledger: self.ledger.clone(),
            revision: self.revision,
        }
    }
}
