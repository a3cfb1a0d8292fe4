//! Scenario files: the TOML construction surface for a world.
//!
//! A scenario declares prices, the society tree and the facility fleet.
//! Loading is plain serde through figment; `build` then performs every
//! semantic check (complete price table, parent resolution, cycle
//! detection, duplicate names) before handing back a ready [`World`].
//! Node order in the file is free: parents may be declared after their
//! children.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::domain::{
    CommodityMap, ConfigError, DistributionFacility, Lifecycle, LifecycleSchedule, NodeId, Period,
    ProductionFacility, Sector,
};
use crate::society::{NodeKind, SocietyNode, World};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub scenario: ScenarioMeta,
    /// Domestic unit prices; every commodity must be present.
    pub prices: CommodityMap<Option<f64>>,
    /// Additive perturbation on input prices inside the allocator
    /// objective only.
    #[serde(default)]
    pub price_deltas: CommodityMap<f64>,
    /// Import slack pricing; absent commodities fall back to the domestic
    /// price.
    #[serde(default)]
    pub import_prices: CommodityMap<Option<f64>>,
    /// Export slack credit; absent commodities earn nothing.
    #[serde(default)]
    pub export_prices: CommodityMap<Option<f64>>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub facilities: Vec<FacilityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioMeta {
    pub name: String,
    /// Calendar year of period 0, reporting only.
    #[serde(default)]
    pub base_year: Option<i32>,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default)]
    pub start_period: Period,
}

fn default_iterations() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub parent: Option<String>,
    /// Sectors fed by an outside actor instead of owned facilities.
    #[serde(default)]
    pub externally_fed: Vec<Sector>,
    #[serde(default)]
    pub funds: f64,
    #[serde(default)]
    pub demand: CommodityMap<f64>,
    #[serde(default)]
    pub local_supply: CommodityMap<f64>,
    #[serde(default)]
    pub import_capacity: CommodityMap<f64>,
    #[serde(default)]
    pub export_capacity: CommodityMap<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FacilityConfig {
    Production(ProductionConfig),
    Distribution(DistributionConfig),
}

impl FacilityConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Production(cfg) => &cfg.name,
            Self::Distribution(cfg) => &cfg.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductionConfig {
    pub name: String,
    #[serde(default)]
    pub template: Option<String>,
    pub sector: Sector,
    pub city: String,
    pub max_level: f64,
    #[serde(default)]
    pub initial_level: f64,
    #[serde(default)]
    pub variable_cost: f64,
    /// Commodity consumed per unit produced.
    #[serde(default)]
    pub inputs: CommodityMap<f64>,
    #[serde(default)]
    pub lifecycle: LifecycleSchedule,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    pub name: String,
    #[serde(default)]
    pub template: Option<String>,
    pub sector: Sector,
    pub origin: String,
    pub destination: String,
    pub max_level: f64,
    #[serde(default)]
    pub initial_level: f64,
    #[serde(default)]
    pub variable_cost: f64,
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
    #[serde(default)]
    pub lifecycle: LifecycleSchedule,
}

fn default_efficiency() -> f64 {
    1.0
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let figment = Figment::new().merge(Toml::file(path.as_ref()));
        Ok(figment.extract()?)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let figment = Figment::new().merge(Toml::string(text));
        Ok(figment.extract()?)
    }

    /// Build the world this scenario describes, or the first configuration
    /// error found.
    pub fn build(&self) -> Result<World, ConfigError> {
        let prices = self.required_prices()?;
        self.check_trade_prices()?;

        let mut world = World::new();
        world.set_clock(self.scenario.start_period);

        let parent_idx = self.resolve_parents()?;
        let order = self.insertion_order(&parent_idx)?;
        let mut assigned: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        for &i in &order {
            let cfg = &self.nodes[i];
            let parent = parent_idx[i].and_then(|p| assigned[p]);
            let node = SocietyNode::new(&cfg.name, cfg.kind, &prices, &cfg.externally_fed);
            let id = world.add_node(node, parent)?;
            let node = world.node_mut(id);
            node.set_funds(cfg.funds);
            node.set_base_demand(cfg.demand.clone());
            node.set_local_supply(cfg.local_supply.clone());
            node.set_import_capacity(cfg.import_capacity.clone());
            node.set_export_capacity(cfg.export_capacity.clone());
            assigned[i] = Some(id);
        }
        if world.roots().is_empty() {
            return Err(ConfigError::NoCountry);
        }

        world.set_trade_terms(
            CommodityMap::from_fn(|c| self.import_prices[c].unwrap_or(prices[c])),
            CommodityMap::from_fn(|c| self.export_prices[c].unwrap_or(0.0)),
            self.price_deltas.clone(),
        );

        let mut names = HashSet::new();
        for cfg in &self.facilities {
            if !names.insert(cfg.name()) {
                return Err(ConfigError::DuplicateFacility(cfg.name().to_string()));
            }
            match cfg {
                FacilityConfig::Production(p) => {
                    let city = lookup_city(&world, &p.name, &p.city)?;
                    let lifecycle =
                        Lifecycle::new(p.lifecycle.clone(), self.scenario.start_period)?;
                    let facility = ProductionFacility::new(
                        &p.name,
                        p.template.clone(),
                        city,
                        lifecycle,
                        p.max_level,
                        p.variable_cost,
                        p.inputs.clone(),
                        p.initial_level,
                    )?;
                    world.attach_production(p.sector, facility)?;
                }
                FacilityConfig::Distribution(d) => {
                    let origin = lookup_city(&world, &d.name, &d.origin)?;
                    let destination = lookup_city(&world, &d.name, &d.destination)?;
                    let lifecycle =
                        Lifecycle::new(d.lifecycle.clone(), self.scenario.start_period)?;
                    let facility = DistributionFacility::new(
                        &d.name,
                        d.template.clone(),
                        origin,
                        destination,
                        lifecycle,
                        d.max_level,
                        d.efficiency,
                        d.variable_cost,
                        d.initial_level,
                    )?;
                    world.attach_distribution(d.sector, facility)?;
                }
            }
        }

        Ok(world)
    }

    fn required_prices(&self) -> Result<CommodityMap<f64>, ConfigError> {
        let mut out = CommodityMap::ZERO;
        for (commodity, price) in self.prices.iter() {
            let value = (*price).ok_or(ConfigError::MissingPrice(commodity))?;
            check_price(&format!("price of '{commodity}'"), value)?;
            out[commodity] = value;
        }
        Ok(out)
    }

    fn check_trade_prices(&self) -> Result<(), ConfigError> {
        for (commodity, price) in self.import_prices.iter() {
            if let Some(value) = *price {
                check_price(&format!("import price of '{commodity}'"), value)?;
            }
        }
        for (commodity, price) in self.export_prices.iter() {
            if let Some(value) = *price {
                check_price(&format!("export price of '{commodity}'"), value)?;
            }
        }
        Ok(())
    }

    /// Map every node's parent name to its declaration index.
    fn resolve_parents(&self) -> Result<Vec<Option<usize>>, ConfigError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, cfg) in self.nodes.iter().enumerate() {
            if index.insert(cfg.name.as_str(), i).is_some() {
                return Err(ConfigError::DuplicateNode(cfg.name.clone()));
            }
        }
        self.nodes
            .iter()
            .map(|cfg| match &cfg.parent {
                Some(parent) => index
                    .get(parent.as_str())
                    .copied()
                    .map(Some)
                    .ok_or_else(|| ConfigError::UnknownParent {
                        node: cfg.name.clone(),
                        parent: parent.clone(),
                    }),
                None => Ok(None),
            })
            .collect()
    }

    /// Order declaration indices so parents precede children, rejecting
    /// cycles.
    fn insertion_order(&self, parent_idx: &[Option<usize>]) -> Result<Vec<usize>, ConfigError> {
        let n = parent_idx.len();
        let mut depth: Vec<Option<u32>> = vec![None; n];
        for start in 0..n {
            if depth[start].is_some() {
                continue;
            }
            let mut chain = Vec::new();
            let mut at = start;
            let base = loop {
                if let Some(d) = depth[at] {
                    break d;
                }
                if chain.contains(&at) {
                    return Err(ConfigError::ParentCycle(self.nodes[at].name.clone()));
                }
                chain.push(at);
                match parent_idx[at] {
                    Some(parent) => at = parent,
                    None => {
                        chain.pop();
                        depth[at] = Some(0);
                        break 0;
                    }
                }
            };
            let mut d = base;
            for &node in chain.iter().rev() {
                d += 1;
                depth[node] = Some(d);
            }
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| depth[i].unwrap_or(0));
        Ok(order)
    }
}

fn check_price(what: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::NegativeQuantity {
            what: what.to_string(),
            value,
        });
    }
    Ok(())
}

fn lookup_city(world: &World, facility: &str, city: &str) -> Result<NodeId, ConfigError> {
    world.find(city).ok_or_else(|| ConfigError::UnknownCity {
        name: facility.to_string(),
        city: city.to_string(),
    })
}
