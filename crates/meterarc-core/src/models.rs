use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::interval::Interval;

/// A measurement group, identity only. Hierarchy navigation lives outside
/// this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub parent: Option<Uuid>,
}

impl Group {
    pub fn new<N: Into<String>>(id: Uuid, name: N) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
        }
    }
}

/// A measured quantity, addressed by its property name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quantity {
    pub property: String,
    pub unit: Option<String>,
}

impl Quantity {
    pub fn new<P: Into<String>>(property: P, unit: Option<&str>) -> Self {
        Self {
            property: property.into(),
            unit: unit.map(|u| u.to_string()),
        }
    }

    /// The empty quantity used when only timestamps matter, e.g. when
    /// deriving the overall archive interval.
    pub fn placeholder() -> Self {
        Self {
            property: String::new(),
            unit: None,
        }
    }
}

/// Which archive of a group a query addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ArchiveKind {
    Main = 0,
    ElectricityMeter = 1,
}

impl ArchiveKind {
    /// Meter archives hold running totals; their synthetic streams are
    /// non-decreasing.
    pub fn is_cumulative(&self) -> bool {
        matches!(self, ArchiveKind::ElectricityMeter)
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ArchiveKind::Main),
            1 => Some(ArchiveKind::ElectricityMeter),
            _ => None,
        }
    }
}

impl FromStr for ArchiveKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "main" => Ok(ArchiveKind::Main),
            "meter" | "electricity-meter" => Ok(ArchiveKind::ElectricityMeter),
            _ => anyhow::bail!("unknown archive kind: {s}"),
        }
    }
}

/// How energy quantities are aggregated. Both row sources currently accept
/// and ignore this; it is carried for store adapters that honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyAggregation {
    Cumulative,
    Standard,
}

impl Default for EnergyAggregation {
    fn default() -> Self {
        EnergyAggregation::Cumulative
    }
}

/// Parameters of a row fetch. `interval` stays optional so the missing-
/// interval failure of the archive contract is expressible; `aggregation`
/// of 0 means raw rows.
#[derive(Debug, Clone)]
pub struct RowsQuery {
    pub quantities: Vec<Quantity>,
    pub interval: Option<Interval>,
    pub aggregation: u32,
    pub energy: EnergyAggregation,
}

impl RowsQuery {
    pub fn new(quantities: Vec<Quantity>, interval: Interval) -> Self {
        Self {
            quantities,
            interval: Some(interval),
            aggregation: 0,
            energy: EnergyAggregation::default(),
        }
    }
}
