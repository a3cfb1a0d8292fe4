//! Shared domain vocabulary: sectors, commodities and the simulation clock.
//!
//! Every quantity in the simulator is annual: the clock is a plain period
//! counter and all flows, costs and demands are per-period totals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{AddAssign, Index, IndexMut};
use strum_macros::{Display, EnumIter, EnumString};

/// Simulation clock position, in whole periods (years) since scenario start.
pub type Period = u32;

/// Handle to a Society Node in the world arena.
///
/// Plain index, handed out at scenario build time. Parent/child links and
/// facility endpoints are all expressed through these handles; nothing in
/// the tree holds an owning back-pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An infrastructure sector. Each sector trades exactly one commodity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sector {
    Agriculture,
    Water,
    Electricity,
    Petroleum,
}

impl Sector {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [
        Self::Agriculture,
        Self::Water,
        Self::Electricity,
        Self::Petroleum,
    ];

    /// The commodity this sector produces and distributes.
    pub fn commodity(self) -> Commodity {
        match self {
            Self::Agriculture => Commodity::Food,
            Self::Water => Commodity::Water,
            Self::Electricity => Commodity::Power,
            Self::Petroleum => Commodity::Fuel,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A tradeable commodity. One per sector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Commodity {
    Food,
    Water,
    Power,
    Fuel,
}

impl Commodity {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [Self::Food, Self::Water, Self::Power, Self::Fuel];

    /// The sector responsible for producing this commodity.
    pub fn sector(self) -> Sector {
        match self {
            Self::Food => Sector::Agriculture,
            Self::Water => Sector::Water,
            Self::Power => Sector::Electricity,
            Self::Fuel => Sector::Petroleum,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Dense per-commodity storage with value semantics.
///
/// Serializes as a map keyed by commodity name; missing keys deserialize to
/// `T::default()`, which is the right reading for demand/intensity tables
/// where an absent commodity means zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommodityMap<T>([T; Commodity::COUNT]);

impl<T> CommodityMap<T> {
    pub fn from_fn(mut f: impl FnMut(Commodity) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Commodity::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Commodity, &T)> {
        Commodity::ALL.iter().map(move |&c| (c, &self.0[c.index()]))
    }
}

impl CommodityMap<f64> {
    pub const ZERO: Self = Self([0.0; Commodity::COUNT]);

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl<T: Default> Default for CommodityMap<T> {
    fn default() -> Self {
        Self(std::array::from_fn(|_| T::default()))
    }
}

impl<T> Index<Commodity> for CommodityMap<T> {
    type Output = T;

    fn index(&self, commodity: Commodity) -> &T {
        &self.0[commodity.index()]
    }
}

impl<T> IndexMut<Commodity> for CommodityMap<T> {
    fn index_mut(&mut self, commodity: Commodity) -> &mut T {
        &mut self.0[commodity.index()]
    }
}

impl AddAssign for CommodityMap<f64> {
    fn add_assign(&mut self, rhs: Self) {
        for i in 0..Commodity::COUNT {
            self.0[i] += rhs.0[i];
        }
    }
}

impl<T: Serialize> Serialize for CommodityMap<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(Commodity::COUNT))?;
        for (commodity, value) in self.iter() {
            map.serialize_entry(&commodity, value)?;
        }
        map.end()
    }
}

/// Dense per-sector storage, one slot per sector.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorMap<T>([T; Sector::COUNT]);

impl<T> SectorMap<T> {
    pub fn from_fn(mut f: impl FnMut(Sector) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Sector::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Sector, &T)> {
        Sector::ALL.iter().map(move |&s| (s, &self.0[s.index()]))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Sector, &mut T)> {
        Sector::ALL.iter().copied().zip(self.0.iter_mut())
    }
}

impl<T: Default> Default for SectorMap<T> {
    fn default() -> Self {
        Self(std::array::from_fn(|_| T::default()))
    }
}

impl<T> Index<Sector> for SectorMap<T> {
    type Output = T;

    fn index(&self, sector: Sector) -> &T {
        &self.0[sector.index()]
    }
}

impl<T> IndexMut<Sector> for SectorMap<T> {
    fn index_mut(&mut self, sector: Sector) -> &mut T {
        &mut self.0[sector.index()]
    }
}

impl<'de, T: Deserialize<'de> + Default> Deserialize<'de> for CommodityMap<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de> + Default> serde::de::Visitor<'de> for MapVisitor<T> {
            type Value = CommodityMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map keyed by commodity name")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut access: A,
            ) -> Result<Self::Value, A::Error> {
                let mut out = CommodityMap::default();
                while let Some((key, value)) = access.next_entry::<Commodity, T>()? {
                    out[key] = value;
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_sector_commodity_bijection() {
        for sector in Sector::iter() {
            assert_eq!(sector.commodity().sector(), sector);
        }
        for commodity in Commodity::iter() {
            assert_eq!(commodity.sector().commodity(), commodity);
        }
    }

    #[test]
    fn test_sector_parsing() {
        assert_eq!(Sector::from_str("electricity").unwrap(), Sector::Electricity);
        assert_eq!(Sector::from_str("agriculture").unwrap(), Sector::Agriculture);
        assert!(Sector::from_str("banking").is_err());
    }

    #[test]
    fn test_sector_display_roundtrip() {
        for sector in Sector::iter() {
            let text = sector.to_string();
            assert_eq!(Sector::from_str(&text).unwrap(), sector);
        }
    }

    #[test]
    fn test_commodity_map_indexing() {
        let mut map = CommodityMap::<f64>::default();
        assert_eq!(map[Commodity::Power], 0.0);

        map[Commodity::Power] = 42.0;
        map[Commodity::Fuel] = 8.0;
        assert_eq!(map[Commodity::Power], 42.0);
        assert_eq!(map.total(), 50.0);
    }

    #[test]
    fn test_commodity_map_add_assign() {
        let mut a = CommodityMap::from_fn(|c| if c == Commodity::Water { 2.0 } else { 1.0 });
        let b = CommodityMap::from_fn(|_| 1.0);
        a += b;

        assert_eq!(a[Commodity::Water], 3.0);
        assert_eq!(a[Commodity::Food], 2.0);
        assert_eq!(a.total(), 9.0);
    }

    #[test]
    fn test_commodity_map_serde_roundtrip() {
        let mut map = CommodityMap::<f64>::default();
        map[Commodity::Food] = 1.5;
        map[Commodity::Power] = 90.0;

        let json = serde_json::to_string(&map).unwrap();
        assert!(json.contains("\"food\":1.5"));

        let back: CommodityMap<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_commodity_map_partial_deserialize_defaults_missing() {
        let map: CommodityMap<f64> = serde_json::from_str(r#"{"power": 90.0}"#).unwrap();
        assert_eq!(map[Commodity::Power], 90.0);
        assert_eq!(map[Commodity::Food], 0.0);
        assert_eq!(map[Commodity::Water], 0.0);
    }
}
