#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grid box, city grid and food category types.
//!
//! These types mirror the shape of the embedded TOML tables in
//! `district_stats_geography`. They carry no behavior beyond small
//! accessors; lookups live in the registry crate.

use serde::{Deserialize, Serialize};

/// A rectangular cell in projected meter coordinates (UTM-K).
///
/// Boxes page a city's area through the box-oriented statistical APIs.
/// They are only used to build query parameters and are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoBox {
    /// Western edge.
    pub min_x: i64,
    /// Eastern edge.
    pub max_x: i64,
    /// Southern edge.
    pub min_y: i64,
    /// Northern edge.
    pub max_y: i64,
}

impl GeoBox {
    /// Creates a new box from its edges.
    #[must_use]
    pub const fn new(min_x: i64, max_x: i64, min_y: i64, max_y: i64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Whether the edges describe a non-empty rectangle.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.min_x < self.max_x && self.min_y < self.max_y
    }
}

impl std::fmt::Display for GeoBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}..{}, {}..{}]",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

/// The ordered grid of boxes covering one city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityGrid {
    /// Lowercase identifier (e.g. `"seoul"`).
    pub id: String,
    /// Display name (e.g. `"Seoul"`).
    pub name: String,
    /// Alternative names accepted on lookup (e.g. `"서울특별시"`).
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Boxes in enumeration order.
    pub boxes: Vec<GeoBox>,
}

impl CityGrid {
    /// Returns `true` if `name` refers to this city. Case-insensitive over
    /// the id, display name and aliases.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.id.eq_ignore_ascii_case(name)
            || self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// A food-service category with both of its code forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodCategory {
    /// Short identifier (e.g. `"korean"`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Fine-grained code used by the sales API.
    pub sales_code: String,
    /// Coarse-grained code used by the business-count API.
    pub business_code: String,
    /// Scaling factor applied to raw sales figures.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

const fn default_multiplier() -> f64 {
    1.0
}

/// An administrative area code queried by the area-oriented APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaCode {
    /// Numeric code as sent on the wire (e.g. `"11110"`).
    pub code: String,
    /// Display name.
    pub name: String,
}
