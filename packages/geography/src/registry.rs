//! Compile-time embedded geography tables.
//!
//! Each city grid is a TOML file under `regions/`, baked into the binary
//! via [`include_str!`]. Adding a city is a matter of creating its TOML
//! file and adding a line to [`REGION_TOMLS`].

use district_stats_geography_models::{AreaCode, CityGrid, FoodCategory};
use serde::Deserialize;

/// City grid TOML configs embedded at compile time, in enumeration order.
const REGION_TOMLS: &[(&str, &str)] = &[
    ("seoul", include_str!("../regions/seoul.toml")),
    ("busan", include_str!("../regions/busan.toml")),
    ("daegu", include_str!("../regions/daegu.toml")),
    ("incheon", include_str!("../regions/incheon.toml")),
    ("gwangju", include_str!("../regions/gwangju.toml")),
    ("daejeon", include_str!("../regions/daejeon.toml")),
    ("ulsan", include_str!("../regions/ulsan.toml")),
    ("sejong", include_str!("../regions/sejong.toml")),
];

const CATEGORIES_TOML: &str = include_str!("../categories.toml");

const AREA_CODES_TOML: &str = include_str!("../area_codes.toml");

#[derive(Deserialize)]
struct CategoryTable {
    categories: Vec<FoodCategory>,
}

#[derive(Deserialize)]
struct AreaCodeTable {
    area_codes: Vec<AreaCode>,
}

/// Returns every embedded city grid, in registry order.
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so
/// this is a development error caught by the tests below).
#[must_use]
pub fn all_grids() -> Vec<CityGrid> {
    REGION_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse region '{name}': {e}"))
        })
        .collect()
}

/// Returns every embedded food category.
///
/// # Panics
///
/// Panics if `categories.toml` is malformed.
#[must_use]
pub fn all_categories() -> Vec<FoodCategory> {
    toml::de::from_str::<CategoryTable>(CATEGORIES_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse categories.toml: {e}"))
        .categories
}

/// Returns every embedded area code.
///
/// # Panics
///
/// Panics if `area_codes.toml` is malformed.
#[must_use]
pub fn all_area_codes() -> Vec<AreaCode> {
    toml::de::from_str::<AreaCodeTable>(AREA_CODES_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse area_codes.toml: {e}"))
        .area_codes
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn region_ids_match_file_names() {
        for ((name, _), grid) in REGION_TOMLS.iter().zip(all_grids()) {
            assert_eq!(*name, grid.id);
        }
    }

    #[test]
    fn every_box_is_a_rectangle() {
        for grid in all_grids() {
            assert!(!grid.boxes.is_empty(), "{} has no boxes", grid.id);
            for b in &grid.boxes {
                assert!(b.is_valid(), "{}: degenerate box {b}", grid.id);
            }
        }
    }

    #[test]
    fn category_codes_are_unique() {
        let categories = all_categories();
        let sales: BTreeSet<&str> = categories.iter().map(|c| c.sales_code.as_str()).collect();
        let business: BTreeSet<&str> = categories
            .iter()
            .map(|c| c.business_code.as_str())
            .collect();
        assert_eq!(sales.len(), categories.len());
        assert_eq!(business.len(), categories.len());
    }

    #[test]
    fn multipliers_are_positive() {
        for cat in all_categories() {
            assert!(cat.multiplier > 0.0, "{}: multiplier {}", cat.id, cat.multiplier);
        }
    }

    #[test]
    fn area_codes_are_numeric() {
        for area in all_area_codes() {
            assert!(
                area.code.chars().all(|c| c.is_ascii_digit()),
                "non-numeric area code {}",
                area.code
            );
            assert!(!area.name.is_empty());
        }
    }
}
