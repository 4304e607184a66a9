//! Role-based projection of items into uniform, owned records

use crate::item::{ItemKind, ItemView};
use std::collections::BTreeMap;

/// Named fields every row exposes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Id,
    Type,
    Name,
    Description,
    Symbol,
    DisplayColor,
    Length,
    Lat,
    Lon,
    Elevation,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Id,
        Role::Type,
        Role::Name,
        Role::Description,
        Role::Symbol,
        Role::DisplayColor,
        Role::Length,
        Role::Lat,
        Role::Lon,
        Role::Elevation,
    ];

    /// Stable external name of the role
    pub fn name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Type => "type",
            Self::Name => "name",
            Self::Description => "description",
            Self::Symbol => "symbol",
            Self::DisplayColor => "displayColor",
            Self::Length => "length",
            Self::Lat => "lat",
            Self::Lon => "lon",
            Self::Elevation => "elevation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.name() == name)
    }
}

/// All roles with their external names
pub fn role_names() -> Vec<(Role, &'static str)> {
    Role::ALL.iter().map(|role| (*role, role.name())).collect()
}

/// Value of one role
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RoleValue {
    Int(usize),
    Kind(ItemKind),
    Text(String),
    Float(f64),
}

impl RoleValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Owned snapshot of one row
///
/// Fields that do not apply to the row's kind hold "" or 0.0.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ItemRecord {
    pub id: usize,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: ItemKind,
    pub name: String,
    pub description: String,
    pub symbol: String,
    pub display_color: String,
    pub length: f64,
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
}

impl ItemRecord {
    pub fn from_view(view: &ItemView<'_>) -> Self {
        let mut record = Self {
            id: view.id(),
            kind: view.kind(),
            name: view.name(),
            description: view.description(),
            symbol: String::new(),
            display_color: String::new(),
            length: 0.0,
            lat: 0.0,
            lon: 0.0,
            elevation: 0.0,
        };
        match view {
            ItemView::Track(track) => {
                record.display_color = track.display_color().to_hex();
                record.length = track.length();
            }
            ItemView::Waypoint(waypoint) => {
                record.symbol = waypoint.symbol();
                record.lat = waypoint.lat();
                record.lon = waypoint.lon();
                record.elevation = waypoint.elevation();
            }
        }
        record
    }

    pub fn value(&self, role: Role) -> RoleValue {
        match role {
            Role::Id => RoleValue::Int(self.id),
            Role::Type => RoleValue::Kind(self.kind),
            Role::Name => RoleValue::Text(self.name.clone()),
            Role::Description => RoleValue::Text(self.description.clone()),
            Role::Symbol => RoleValue::Text(self.symbol.clone()),
            Role::DisplayColor => RoleValue::Text(self.display_color.clone()),
            Role::Length => RoleValue::Float(self.length),
            Role::Lat => RoleValue::Float(self.lat),
            Role::Lon => RoleValue::Float(self.lon),
            Role::Elevation => RoleValue::Float(self.elevation),
        }
    }

    /// Uniform key-value form, keyed by role name
    pub fn to_map(&self) -> BTreeMap<&'static str, RoleValue> {
        Role::ALL
            .iter()
            .map(|role| (role.name(), self.value(*role)))
            .collect()
    }
}
