//! Production and distribution facilities: the leaf entities of the tree.
//!
//! Every flow-valued accessor (production, throughput, output, commodity
//! consumption) is gated by the lifecycle: outside the Operational phase it
//! returns exactly zero regardless of the stored level. The stored level
//! itself survives operational gaps so a facility resumes where it left off.
//! Level setters validate bounds and reject rather than clamp; the resource
//! allocator clamps before writing, so a `LevelError` in normal operation
//! indicates a caller bug, not a routine condition.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::ConfigError;
use super::lifecycle::Lifecycle;
use super::types::{Commodity, CommodityMap, NodeId};

/// Rejected level write. Defensive contract: the allocator always clamps
/// into range before writing, so these should never fire in normal runs.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level for '{name}' cannot be negative, got {value}")]
    Negative { name: String, value: f64 },

    #[error("level {value} for '{name}' exceeds maximum {max}")]
    ExceedsMax { name: String, value: f64, max: f64 },
}

fn check_level(name: &str, value: f64, max: f64) -> Result<(), LevelError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LevelError::Negative {
            name: name.to_string(),
            value,
        });
    }
    if value > max {
        return Err(LevelError::ExceedsMax {
            name: name.to_string(),
            value,
            max,
        });
    }
    Ok(())
}

fn check_quantity(what: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::NegativeQuantity {
            what: what.to_string(),
            value,
        });
    }
    Ok(())
}

/// A facility that produces its sector's commodity at one city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionFacility {
    name: String,
    template: Option<String>,
    city: NodeId,
    lifecycle: Lifecycle,
    max_production: f64,
    variable_cost: f64,
    /// Per-unit input intensities: producing one unit consumes
    /// `inputs[commodity]` units of each input commodity.
    inputs: CommodityMap<f64>,
    level: f64,
}

impl ProductionFacility {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        template: Option<String>,
        city: NodeId,
        lifecycle: Lifecycle,
        max_production: f64,
        variable_cost: f64,
        inputs: CommodityMap<f64>,
        initial_level: f64,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        check_quantity(&format!("max_production of '{name}'"), max_production)?;
        check_quantity(&format!("variable_cost of '{name}'"), variable_cost)?;
        for (commodity, &intensity) in inputs.iter() {
            check_quantity(&format!("{commodity} intensity of '{name}'"), intensity)?;
        }
        check_quantity(&format!("initial level of '{name}'"), initial_level)?;
        if initial_level > max_production {
            return Err(ConfigError::InitialLevelExceedsMax {
                name,
                level: initial_level,
                max: max_production,
            });
        }

        Ok(Self {
            name,
            template,
            city,
            lifecycle,
            max_production,
            variable_cost,
            inputs,
            level: initial_level,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn city(&self) -> NodeId {
        self.city
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn max_production(&self) -> f64 {
        self.max_production
    }

    pub fn variable_cost(&self) -> f64 {
        self.variable_cost
    }

    pub fn input_intensity(&self, commodity: Commodity) -> f64 {
        self.inputs[commodity]
    }

    /// Production this period: the stored level while Operational, else 0.
    pub fn production(&self) -> f64 {
        if self.lifecycle.is_operational() {
            self.level
        } else {
            0.0
        }
    }

    /// The stored level, independent of phase.
    pub fn stored_level(&self) -> f64 {
        self.level
    }

    pub fn set_production(&mut self, value: f64) -> Result<(), LevelError> {
        check_level(&self.name, value, self.max_production)?;
        self.level = value;
        Ok(())
    }

    /// Input commodity consumed this period (intensity × gated production).
    pub fn consumption(&self, commodity: Commodity) -> f64 {
        self.inputs[commodity] * self.production()
    }

    /// Variable operating cost recognized this period.
    pub fn variable_operating_expense(&self) -> f64 {
        self.variable_cost * self.production()
    }
}

/// A transport link moving its sector's commodity from origin to
/// destination, losing `(1 - efficiency)` of its input on the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionFacility {
    name: String,
    template: Option<String>,
    origin: NodeId,
    destination: NodeId,
    lifecycle: Lifecycle,
    max_throughput: f64,
    efficiency: f64,
    variable_cost: f64,
    level: f64,
}

impl DistributionFacility {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        template: Option<String>,
        origin: NodeId,
        destination: NodeId,
        lifecycle: Lifecycle,
        max_throughput: f64,
        efficiency: f64,
        variable_cost: f64,
        initial_level: f64,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if origin == destination {
            return Err(ConfigError::SelfLoop { name });
        }
        check_quantity(&format!("max_throughput of '{name}'"), max_throughput)?;
        check_quantity(&format!("variable_cost of '{name}'"), variable_cost)?;
        if !efficiency.is_finite() || !(0.0..=1.0).contains(&efficiency) {
            return Err(ConfigError::EfficiencyOutOfRange {
                name,
                value: efficiency,
            });
        }
        check_quantity(&format!("initial level of '{name}'"), initial_level)?;
        if initial_level > max_throughput {
            return Err(ConfigError::InitialLevelExceedsMax {
                name,
                level: initial_level,
                max: max_throughput,
            });
        }

        Ok(Self {
            name,
            template,
            origin,
            destination,
            lifecycle,
            max_throughput,
            efficiency,
            variable_cost,
            level: initial_level,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn max_throughput(&self) -> f64 {
        self.max_throughput
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn variable_cost(&self) -> f64 {
        self.variable_cost
    }

    /// Commodity taken in at the origin this period (gated).
    pub fn input(&self) -> f64 {
        if self.lifecycle.is_operational() {
            self.level
        } else {
            0.0
        }
    }

    /// Commodity delivered at the destination: input × efficiency.
    pub fn output(&self) -> f64 {
        self.input() * self.efficiency
    }

    /// Distribution loss this period, always ≥ 0.
    pub fn loss(&self) -> f64 {
        self.input() - self.output()
    }

    /// The stored level, independent of phase.
    pub fn stored_level(&self) -> f64 {
        self.level
    }

    pub fn set_input(&mut self, value: f64) -> Result<(), LevelError> {
        check_level(&self.name, value, self.max_throughput)?;
        self.level = value;
        Ok(())
    }

    /// Variable operating cost recognized this period.
    pub fn variable_operating_expense(&self) -> f64 {
        self.variable_cost * self.input()
    }
}

/// Either facility kind, as stored by a sector system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Facility {
    Production(ProductionFacility),
    Distribution(DistributionFacility),
}

impl Facility {
    pub fn name(&self) -> &str {
        match self {
            Self::Production(p) => p.name(),
            Self::Distribution(d) => d.name(),
        }
    }

    /// Origin city. For production facilities this is the host city.
    pub fn origin(&self) -> NodeId {
        match self {
            Self::Production(p) => p.city(),
            Self::Distribution(d) => d.origin(),
        }
    }

    /// Destination city; equal to the origin for production facilities.
    pub fn destination(&self) -> NodeId {
        match self {
            Self::Production(p) => p.city(),
            Self::Distribution(d) => d.destination(),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        match self {
            Self::Production(p) => p.lifecycle(),
            Self::Distribution(d) => d.lifecycle(),
        }
    }

    pub(crate) fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        match self {
            Self::Production(p) => &mut p.lifecycle,
            Self::Distribution(d) => &mut d.lifecycle,
        }
    }

    pub fn is_operational(&self) -> bool {
        self.lifecycle().is_operational()
    }

    pub fn exists(&self) -> bool {
        self.lifecycle().exists()
    }

    /// Declared capacity: max production or max throughput.
    pub fn max_level(&self) -> f64 {
        match self {
            Self::Production(p) => p.max_production(),
            Self::Distribution(d) => d.max_throughput(),
        }
    }

    /// Stored level, independent of phase.
    pub fn stored_level(&self) -> f64 {
        match self {
            Self::Production(p) => p.stored_level(),
            Self::Distribution(d) => d.stored_level(),
        }
    }

    /// Current gated level: production or throughput input.
    pub fn level(&self) -> f64 {
        match self {
            Self::Production(p) => p.production(),
            Self::Distribution(d) => d.input(),
        }
    }

    /// Uniform setter used by the allocator's write-back.
    pub fn set_level(&mut self, value: f64) -> Result<(), LevelError> {
        match self {
            Self::Production(p) => p.set_production(value),
            Self::Distribution(d) => d.set_input(value),
        }
    }

    /// Input commodity consumption this period; zero for links.
    pub fn consumption(&self, commodity: Commodity) -> f64 {
        match self {
            Self::Production(p) => p.consumption(commodity),
            Self::Distribution(_) => 0.0,
        }
    }

    pub fn variable_operating_expense(&self) -> f64 {
        match self {
            Self::Production(p) => p.variable_operating_expense(),
            Self::Distribution(d) => d.variable_operating_expense(),
        }
    }

    pub fn as_production(&self) -> Option<&ProductionFacility> {
        match self {
            Self::Production(p) => Some(p),
            Self::Distribution(_) => None,
        }
    }

    pub fn as_distribution(&self) -> Option<&DistributionFacility> {
        match self {
            Self::Production(_) => None,
            Self::Distribution(d) => Some(d),
        }
    }
}
