//! The society tree: countries, regions and cities, each carrying one
//! sector system per sector.
//!
//! Nodes live in an arena owned by [`World`] and reference each other by
//! [`NodeId`]; parent links are weak lookups, never ownership. Roll-up
//! queries (demand, cash flow, production) walk the committed state of the
//! subtree on every call. The tick/tock pair advances one period: tick
//! computes a fresh economics snapshot per system from committed state only
//! and stages it, tock commits every staged snapshot, advances lifecycles
//! and the clock, and settles country funds. Callers outside the crate can
//! only trigger a full round through the driver, never a tick alone.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::domain::{
    Commodity, CommodityMap, ConfigError, DistributionFacility, Facility, NodeId, Period,
    ProductionFacility, Sector, SectorMap,
};
use crate::sector::{ComputingSystem, Economics, ExternalSystem, SectorSystem};

/// Position of a node in the containment hierarchy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Country,
    Region,
    City,
}

/// One node of the society tree.
#[derive(Debug, Clone)]
pub struct SocietyNode {
    name: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    systems: SectorMap<SectorSystem>,
    /// Final demand configured at this node, normally only on cities.
    base_demand: CommodityMap<f64>,
    /// Fixed local supply netted off demand before allocation.
    local_supply: CommodityMap<f64>,
    import_capacity: CommodityMap<f64>,
    export_capacity: CommodityMap<f64>,
    /// Treasury balance, meaningful on countries.
    funds: f64,
}

impl SocietyNode {
    /// Build a node with one system per sector, priced from the scenario's
    /// domestic price table. Sectors listed in `externally_fed` get the
    /// placeholder variant written from outside instead of a computing one.
    pub fn new(
        name: impl Into<String>,
        kind: NodeKind,
        prices: &CommodityMap<f64>,
        externally_fed: &[Sector],
    ) -> Self {
        let systems = SectorMap::from_fn(|sector| {
            let price = prices[sector.commodity()];
            if externally_fed.contains(&sector) {
                SectorSystem::External(ExternalSystem::new(price))
            } else {
                SectorSystem::Computing(ComputingSystem::new(price))
            }
        });
        Self {
            name: name.into(),
            kind,
            parent: None,
            children: Vec::new(),
            systems,
            base_demand: CommodityMap::ZERO,
            local_supply: CommodityMap::ZERO,
            import_capacity: CommodityMap::ZERO,
            export_capacity: CommodityMap::ZERO,
            funds: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn system(&self, sector: Sector) -> &SectorSystem {
        &self.systems[sector]
    }

    pub fn system_mut(&mut self, sector: Sector) -> &mut SectorSystem {
        &mut self.systems[sector]
    }

    pub fn base_demand(&self) -> &CommodityMap<f64> {
        &self.base_demand
    }

    pub fn local_supply(&self) -> &CommodityMap<f64> {
        &self.local_supply
    }

    pub fn import_capacity(&self) -> &CommodityMap<f64> {
        &self.import_capacity
    }

    pub fn export_capacity(&self) -> &CommodityMap<f64> {
        &self.export_capacity
    }

    pub fn funds(&self) -> f64 {
        self.funds
    }

    pub fn set_base_demand(&mut self, demand: CommodityMap<f64>) {
        self.base_demand = demand;
    }

    pub fn set_local_supply(&mut self, supply: CommodityMap<f64>) {
        self.local_supply = supply;
    }

    pub fn set_import_capacity(&mut self, capacity: CommodityMap<f64>) {
        self.import_capacity = capacity;
    }

    pub fn set_export_capacity(&mut self, capacity: CommodityMap<f64>) {
        self.export_capacity = capacity;
    }

    pub fn set_funds(&mut self, funds: f64) {
        self.funds = funds;
    }
}

impl fmt::Display for SocietyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// The whole simulated world: the node arena, the clock and the
/// scenario-level trade price tables.
#[derive(Debug, Clone)]
pub struct World {
    nodes: Vec<SocietyNode>,
    roots: Vec<NodeId>,
    clock: Period,
    import_prices: CommodityMap<f64>,
    export_prices: CommodityMap<f64>,
    price_deltas: CommodityMap<f64>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            clock: 0,
            import_prices: CommodityMap::ZERO,
            export_prices: CommodityMap::ZERO,
            price_deltas: CommodityMap::ZERO,
        }
    }

    /// Set the scenario-level trade terms. Build-time configuration; the
    /// engine never mutates these afterwards.
    pub fn set_trade_terms(
        &mut self,
        import_prices: CommodityMap<f64>,
        export_prices: CommodityMap<f64>,
        price_deltas: CommodityMap<f64>,
    ) {
        self.import_prices = import_prices;
        self.export_prices = export_prices;
        self.price_deltas = price_deltas;
    }

    pub fn clock(&self) -> Period {
        self.clock
    }

    /// Start the clock at a later period. Only meaningful before the first
    /// round; facilities are anchored against absolute periods.
    pub(crate) fn set_clock(&mut self, period: Period) {
        self.clock = period;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &SocietyNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SocietyNode {
        &mut self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SocietyNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Top-level countries, in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(NodeId)
    }

    pub fn import_price(&self, commodity: Commodity) -> f64 {
        self.import_prices[commodity]
    }

    pub fn export_price(&self, commodity: Commodity) -> f64 {
        self.export_prices[commodity]
    }

    pub fn price_delta(&self, commodity: Commodity) -> f64 {
        self.price_deltas[commodity]
    }

    /// Insert a node under `parent` (`None` only for countries). The tree
    /// shape is fixed once built; there is no re-parenting.
    pub fn add_node(
        &mut self,
        mut node: SocietyNode,
        parent: Option<NodeId>,
    ) -> Result<NodeId, ConfigError> {
        if self.nodes.iter().any(|n| n.name == node.name) {
            return Err(ConfigError::DuplicateNode(node.name));
        }
        match (node.kind, parent) {
            (NodeKind::Country, Some(_)) => {
                return Err(ConfigError::CountryWithParent(node.name));
            }
            (NodeKind::Region | NodeKind::City, None) => {
                return Err(ConfigError::MissingParent {
                    node: node.name,
                    kind: node.kind.to_string(),
                });
            }
            _ => {}
        }
        if let Some(parent_id) = parent {
            let parent_node = &self.nodes[parent_id.index()];
            if parent_node.kind == NodeKind::City {
                return Err(ConfigError::CityWithChildren(parent_node.name.clone()));
            }
        }

        let id = NodeId(self.nodes.len());
        node.parent = parent;
        self.nodes.push(node);
        match parent {
            Some(parent_id) => self.nodes[parent_id.index()].children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Attach a production facility to its host city's system.
    pub fn attach_production(
        &mut self,
        sector: Sector,
        facility: ProductionFacility,
    ) -> Result<(), ConfigError> {
        let city = facility.city();
        self.check_city(facility.name(), city)?;
        let node = &mut self.nodes[city.index()];
        match node.systems[sector].as_computing_mut() {
            Some(system) => {
                system.add_facility(Facility::Production(facility));
                Ok(())
            }
            None => Err(ConfigError::ExternallyFedOwner {
                node: node.name.clone(),
                facility: facility.name().to_string(),
            }),
        }
    }

    /// Attach a distribution facility; the origin city's system owns it.
    pub fn attach_distribution(
        &mut self,
        sector: Sector,
        facility: DistributionFacility,
    ) -> Result<(), ConfigError> {
        self.check_city(facility.name(), facility.origin())?;
        self.check_city(facility.name(), facility.destination())?;
        let node = &mut self.nodes[facility.origin().index()];
        match node.systems[sector].as_computing_mut() {
            Some(system) => {
                system.add_facility(Facility::Distribution(facility));
                Ok(())
            }
            None => Err(ConfigError::ExternallyFedOwner {
                node: node.name.clone(),
                facility: facility.name().to_string(),
            }),
        }
    }

    fn check_city(&self, facility: &str, id: NodeId) -> Result<(), ConfigError> {
        let Some(node) = self.nodes.get(id.index()) else {
            return Err(ConfigError::UnknownCity {
                name: facility.to_string(),
                city: id.to_string(),
            });
        };
        if node.kind != NodeKind::City {
            return Err(ConfigError::NotACity {
                name: facility.to_string(),
                place: node.name.clone(),
            });
        }
        Ok(())
    }

    /// Subtree node ids, depth-first, the root included.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.index()].children.iter().copied());
        }
        out
    }

    /// Cities covered by a node's subtree. A city covers itself. This is
    /// the ground truth for the internal/external facility partition and is
    /// recomputed from the topology on every call, never cached.
    pub fn covered_cities(&self, root: NodeId) -> Vec<NodeId> {
        self.subtree(root)
            .into_iter()
            .filter(|id| self.nodes[id.index()].kind == NodeKind::City)
            .collect()
    }

    /// Commodity delivered into a node's subtree by distribution facilities
    /// it does not own: origin outside the covered cities, destination
    /// inside.
    pub fn external_inbound_flow(&self, root: NodeId, sector: Sector) -> f64 {
        let covered = self.covered_cities(root);
        let mut total = 0.0;
        for other in &self.nodes {
            let Some(system) = other.systems[sector].as_computing() else {
                continue;
            };
            let facilities = system.facilities();
            let guard = facilities.read();
            for facility in guard.iter() {
                if let Facility::Distribution(link) = facility {
                    if covered.contains(&link.destination()) && !covered.contains(&link.origin())
                    {
                        total += link.output();
                    }
                }
            }
        }
        total
    }

    /// Gross demand roll-up: configured base demand plus committed system
    /// consumption, summed over the subtree.
    pub fn demand(&self, id: NodeId, commodity: Commodity) -> f64 {
        let node = &self.nodes[id.index()];
        let own: f64 = Sector::ALL
            .iter()
            .map(|&s| node.systems[s].consumption(commodity))
            .sum();
        let children: f64 = node
            .children
            .iter()
            .map(|&child| self.demand(child, commodity))
            .sum();
        node.base_demand[commodity] + own + children
    }

    /// Net demand one city presents to the allocation network: base demand
    /// plus committed consumption, less fixed local supply, floored at zero.
    pub fn net_city_demand(&self, city: NodeId, commodity: Commodity) -> f64 {
        let node = &self.nodes[city.index()];
        let consumed: f64 = Sector::ALL
            .iter()
            .map(|&s| node.systems[s].consumption(commodity))
            .sum();
        (node.base_demand[commodity] + consumed - node.local_supply[commodity]).max(0.0)
    }

    /// Committed cash flow summed over the subtree's systems.
    pub fn cash_flow_total(&self, root: NodeId) -> f64 {
        self.subtree(root)
            .into_iter()
            .flat_map(|id| {
                Sector::ALL
                    .iter()
                    .map(move |&s| self.nodes[id.index()].systems[s].cash_flow())
            })
            .sum()
    }

    /// Committed production of one sector's commodity over the subtree.
    pub fn production_total(&self, root: NodeId, sector: Sector) -> f64 {
        self.subtree(root)
            .into_iter()
            .map(|id| self.nodes[id.index()].systems[sector].domestic_production())
            .sum()
    }

    /// Committed consumption of one commodity over the subtree.
    pub fn consumption_total(&self, root: NodeId, commodity: Commodity) -> f64 {
        self.subtree(root)
            .into_iter()
            .map(|id| {
                Sector::ALL
                    .iter()
                    .map(|&s| self.nodes[id.index()].systems[s].consumption(commodity))
                    .sum::<f64>()
            })
            .sum()
    }

    /// Compute one system's economics for the current period from committed
    /// state. Physical-flow terms (sales, trade, inbound expense) are
    /// recognized at city systems, where flows terminate; enclosing nodes
    /// see them through roll-ups instead of recognizing them again.
    fn staged_economics(&self, id: NodeId, sector: Sector) -> Economics {
        let node = &self.nodes[id.index()];
        let Some(system) = node.systems[sector].as_computing() else {
            return Economics::default();
        };
        let price = system.price();
        let commodity = sector.commodity();
        let covered = self.covered_cities(id);

        let mut econ = Economics::default();
        let facilities = system.facilities();
        let guard = facilities.read();
        for facility in guard.iter() {
            let lifecycle = facility.lifecycle();
            econ.capital_expense += lifecycle.capital_expense();
            econ.decommission_expense += lifecycle.decommission_expense();
            econ.operating_expense +=
                lifecycle.fixed_operating_expense() + facility.variable_operating_expense();
            for c in Commodity::ALL {
                econ.consumption[c] += facility.consumption(c);
            }
            match facility {
                Facility::Production(plant) => {
                    econ.domestic_production += plant.production();
                }
                Facility::Distribution(link) => {
                    if !covered.contains(&link.destination()) {
                        econ.distribution_revenue += price * link.output();
                    }
                }
            }
        }
        drop(guard);

        if node.kind == NodeKind::City {
            econ.distribution_expense = price * self.external_inbound_flow(id, sector);
            let net_demand = self.net_city_demand(id, commodity);
            let import = system.import_level();
            let export = system.export_level();
            econ.sales_revenue = price * (net_demand - import).max(0.0);
            econ.import_expense = self.import_prices[commodity] * import;
            econ.export_revenue = self.export_prices[commodity] * export;
        }
        econ
    }

    /// Phase one of a round: compute every computing system's next-period
    /// economics from committed state, then stage them. Nothing committed
    /// changes here, so traversal order is irrelevant.
    pub(crate) fn tick(&mut self) {
        let mut staged = Vec::with_capacity(self.nodes.len() * Sector::COUNT);
        for index in 0..self.nodes.len() {
            let id = NodeId(index);
            for sector in Sector::ALL {
                if !self.nodes[index].systems[sector].is_externally_fed() {
                    staged.push((id, sector, self.staged_economics(id, sector)));
                }
            }
        }
        for (id, sector, economics) in staged {
            if let Some(system) = self.nodes[id.index()].systems[sector].as_computing_mut() {
                system.stage(economics);
            }
        }
    }

    /// Phase two: commit every staged snapshot, advance facility lifecycles
    /// and the clock, and settle each country's funds with its subtree's
    /// committed cash flow.
    pub(crate) fn tock(&mut self) {
        for node in &mut self.nodes {
            for (_, system) in node.systems.iter_mut() {
                system.commit();
                system.advance_lifecycles();
            }
        }

        let settlements: Vec<(NodeId, f64)> = self
            .roots
            .iter()
            .map(|&root| (root, self.cash_flow_total(root)))
            .collect();
        for (root, flow) in settlements {
            self.nodes[root.index()].funds += flow;
        }

        self.clock = self.clock.saturating_add(1);
    }
}
