//! Facility lifecycle: a time-driven existence/operational state machine.
//!
//! A facility moves through five phases as the annual clock advances:
//! Future → Initializing → Operational → Decommissioning → Retired. The
//! phase and every recognized cost are pure functions of the current period
//! and the immutable schedule; nothing here is stored as a separately
//! mutable flag. Downstream economics depend on exact period placement, so
//! the degenerate zero-duration cases are part of the contract, not corner
//! noise: a zero-length window still recognizes its lump cost at the window
//! start.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use super::error::ConfigError;
use super::types::Period;

/// Lifecycle phase, in time order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LifecyclePhase {
    Future,
    Initializing,
    Operational,
    Decommissioning,
    Retired,
}

/// Immutable lifecycle parameters fixed at construction.
///
/// Durations are period counts (non-negative by type); costs are per-facility
/// totals except `fixed_operating_cost`, which is charged every operational
/// period. With `levelize` set, capital and decommission costs are spread
/// evenly across their windows instead of recognized as lumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSchedule {
    /// First period of the initialization window.
    pub anchor: Period,
    pub init_duration: Period,
    pub ops_duration: Period,
    pub decommission_duration: Period,
    pub capital_cost: f64,
    pub fixed_operating_cost: f64,
    pub decommission_cost: f64,
    pub levelize: bool,
}

impl Default for LifecycleSchedule {
    /// Always-on and free: operational from period 0, effectively forever.
    fn default() -> Self {
        Self {
            anchor: 0,
            init_duration: 0,
            ops_duration: Period::MAX,
            decommission_duration: 0,
            capital_cost: 0.0,
            fixed_operating_cost: 0.0,
            decommission_cost: 0.0,
            levelize: false,
        }
    }
}

impl LifecycleSchedule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (what, value) in [
            ("capital_cost", self.capital_cost),
            ("fixed_operating_cost", self.fixed_operating_cost),
            ("decommission_cost", self.decommission_cost),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeQuantity {
                    what: what.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// First operational period.
    pub fn ops_start(&self) -> Period {
        self.anchor.saturating_add(self.init_duration)
    }

    /// First decommissioning period.
    pub fn decommission_start(&self) -> Period {
        self.ops_start().saturating_add(self.ops_duration)
    }

    /// First retired period.
    pub fn retire_at(&self) -> Period {
        self.decommission_start()
            .saturating_add(self.decommission_duration)
    }

    /// Phase at an arbitrary period.
    pub fn phase_at(&self, period: Period) -> LifecyclePhase {
        if period < self.anchor {
            LifecyclePhase::Future
        } else if period < self.ops_start() {
            LifecyclePhase::Initializing
        } else if period < self.decommission_start() {
            LifecyclePhase::Operational
        } else if period < self.retire_at() {
            LifecyclePhase::Decommissioning
        } else {
            LifecyclePhase::Retired
        }
    }
}

/// A facility's lifecycle position: the immutable schedule plus the
/// advancing period counter. The counter only ever moves forward, once per
/// tock, so phases are visited in order and at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lifecycle {
    schedule: LifecycleSchedule,
    period: Period,
}

impl Lifecycle {
    pub fn new(schedule: LifecycleSchedule, start: Period) -> Result<Self, ConfigError> {
        schedule.validate()?;
        Ok(Self {
            schedule,
            period: start,
        })
    }

    pub fn schedule(&self) -> &LifecycleSchedule {
        &self.schedule
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.schedule.phase_at(self.period)
    }

    /// True only in the Operational phase. Gates every flow-valued accessor
    /// on the owning facility.
    pub fn is_operational(&self) -> bool {
        self.phase() == LifecyclePhase::Operational
    }

    /// True from the start of initialization until fully decommissioned.
    pub fn exists(&self) -> bool {
        self.period >= self.schedule.anchor && self.period < self.schedule.retire_at()
    }

    /// Advance the clock by one period. Called exactly once per tock.
    pub(crate) fn advance(&mut self) {
        self.period = self.period.saturating_add(1);
    }

    /// Capital cost recognized in the current period.
    pub fn capital_expense(&self) -> f64 {
        self.recognize(
            self.schedule.capital_cost,
            self.schedule.anchor,
            self.schedule.init_duration,
        )
    }

    /// Decommission cost recognized in the current period.
    pub fn decommission_expense(&self) -> f64 {
        self.recognize(
            self.schedule.decommission_cost,
            self.schedule.decommission_start(),
            self.schedule.decommission_duration,
        )
    }

    /// Fixed operating cost: charged every operational period, otherwise 0.
    pub fn fixed_operating_expense(&self) -> f64 {
        if self.is_operational() {
            self.schedule.fixed_operating_cost
        } else {
            0.0
        }
    }

    /// Time-phased recognition of a windowed cost. Levelized costs spread
    /// evenly across the window; otherwise (including zero-length windows)
    /// the full cost lands on the window's first period.
    fn recognize(&self, cost: f64, start: Period, duration: Period) -> f64 {
        if self.schedule.levelize && duration > 0 {
            if self.period >= start && self.period < start.saturating_add(duration) {
                cost / duration as f64
            } else {
                0.0
            }
        } else if self.period == start {
            cost
        } else {
            0.0
        }
    }
}
