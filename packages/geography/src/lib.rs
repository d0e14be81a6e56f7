#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Static geography and category configuration for district statistics
//! collection.
//!
//! [`GeoRegistry`] answers the handful of questions the collectors ask:
//! which boxes cover a city, which category codes to query, what
//! multiplier applies to a category's sales, and which area codes to walk.
//! Unknown keys yield an empty list or the default multiplier, never an
//! error.

pub mod registry;

use district_stats_geography_models::{AreaCode, CityGrid, FoodCategory, GeoBox};

/// Multiplier used for categories without a configured factor.
pub const DEFAULT_MULTIPLIER: f64 = 1.0;

/// Lookup tables for city grids, food categories and area codes.
#[derive(Debug, Clone)]
pub struct GeoRegistry {
    grids: Vec<CityGrid>,
    categories: Vec<FoodCategory>,
    area_codes: Vec<AreaCode>,
}

impl GeoRegistry {
    /// Builds a registry from explicit tables.
    #[must_use]
    pub const fn new(
        grids: Vec<CityGrid>,
        categories: Vec<FoodCategory>,
        area_codes: Vec<AreaCode>,
    ) -> Self {
        Self {
            grids,
            categories,
            area_codes,
        }
    }

    /// Builds a registry from the tables embedded at compile time.
    #[must_use]
    pub fn embedded() -> Self {
        let registry = Self::new(
            registry::all_grids(),
            registry::all_categories(),
            registry::all_area_codes(),
        );
        log::debug!(
            "Loaded geo registry: {} cities, {} boxes, {} categories, {} area codes",
            registry.grids.len(),
            registry.grids.iter().map(|g| g.boxes.len()).sum::<usize>(),
            registry.categories.len(),
            registry.area_codes.len(),
        );
        registry
    }

    /// Returns the configured city grid matching `city`, if any.
    #[must_use]
    pub fn grid(&self, city: &str) -> Option<&CityGrid> {
        self.grids.iter().find(|g| g.matches(city))
    }

    /// Returns the boxes covering `city` in enumeration order. Empty for an
    /// unknown city.
    #[must_use]
    pub fn boxes_for(&self, city: &str) -> &[GeoBox] {
        self.grid(city).map_or(&[][..], |g| g.boxes.as_slice())
    }

    /// Returns every configured city id, in registry order.
    #[must_use]
    pub fn cities(&self) -> Vec<String> {
        self.grids.iter().map(|g| g.id.clone()).collect()
    }

    /// Returns every configured city grid.
    #[must_use]
    pub fn grids(&self) -> &[CityGrid] {
        &self.grids
    }

    /// Returns every configured food category.
    #[must_use]
    pub fn categories(&self) -> &[FoodCategory] {
        &self.categories
    }

    /// Fine-grained category codes used by the sales API.
    #[must_use]
    pub fn sales_category_codes(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.sales_code.clone()).collect()
    }

    /// Coarse-grained category codes used by the business-count API.
    #[must_use]
    pub fn business_category_codes(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| c.business_code.clone())
            .collect()
    }

    /// Resolves a fine-grained sales code to its category.
    #[must_use]
    pub fn category_for_sales_code(&self, code: &str) -> Option<&FoodCategory> {
        self.categories.iter().find(|c| c.sales_code == code)
    }

    /// Resolves a coarse-grained business code to its category.
    #[must_use]
    pub fn category_for_business_code(&self, code: &str) -> Option<&FoodCategory> {
        self.categories.iter().find(|c| c.business_code == code)
    }

    /// Returns the sales multiplier for a category code (either form),
    /// or [`DEFAULT_MULTIPLIER`] when the code is not configured.
    #[must_use]
    pub fn multiplier_for(&self, code: &str) -> f64 {
        self.category_for_sales_code(code)
            .or_else(|| self.category_for_business_code(code))
            .map_or(DEFAULT_MULTIPLIER, |c| c.multiplier)
    }

    /// Returns every configured area code, in registry order.
    #[must_use]
    pub fn area_codes(&self) -> Vec<String> {
        self.area_codes.iter().map(|a| a.code.clone()).collect()
    }

    /// Returns the configured area code entries.
    #[must_use]
    pub fn area_code_entries(&self) -> &[AreaCode] {
        &self.area_codes
    }
}

impl Default for GeoRegistry {
    fn default() -> Self {
        Self::embedded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Golden box counts per city.
    const EXPECTED_BOXES: &[(&str, usize)] = &[
        ("seoul", 12),
        ("busan", 9),
        ("daegu", 6),
        ("incheon", 9),
        ("gwangju", 4),
        ("daejeon", 4),
        ("ulsan", 6),
        ("sejong", 4),
    ];

    const EXPECTED_CATEGORY_COUNT: usize = 8;

    const EXPECTED_AREA_CODE_COUNT: usize = 25;

    #[test]
    fn golden_box_counts() {
        let registry = GeoRegistry::embedded();
        for (city, count) in EXPECTED_BOXES {
            assert_eq!(registry.boxes_for(city).len(), *count, "{city}");
        }
        assert_eq!(registry.cities().len(), EXPECTED_BOXES.len());
    }

    #[test]
    fn box_enumeration_is_deterministic() {
        let a = GeoRegistry::embedded();
        let b = GeoRegistry::embedded();
        for city in a.cities() {
            assert_eq!(a.boxes_for(&city), b.boxes_for(&city));
        }
    }

    #[test]
    fn city_lookup_accepts_names_and_aliases() {
        let registry = GeoRegistry::embedded();
        assert_eq!(registry.boxes_for("Seoul").len(), 12);
        assert_eq!(registry.boxes_for("서울특별시").len(), 12);
    }

    #[test]
    fn unknown_city_has_no_boxes() {
        let registry = GeoRegistry::embedded();
        assert!(registry.boxes_for("atlantis").is_empty());
        assert!(registry.grid("atlantis").is_none());
    }

    #[test]
    fn category_code_lists() {
        let registry = GeoRegistry::embedded();
        assert_eq!(registry.sales_category_codes().len(), EXPECTED_CATEGORY_COUNT);
        assert_eq!(
            registry.business_category_codes().len(),
            EXPECTED_CATEGORY_COUNT
        );
        assert_eq!(registry.sales_category_codes()[0], "I20101");
        assert_eq!(registry.business_category_codes()[0], "I201");
    }

    #[test]
    fn multiplier_lookup() {
        let registry = GeoRegistry::embedded();
        assert!((registry.multiplier_for("I21201") - 1.2).abs() < f64::EPSILON);
        assert!((registry.multiplier_for("I212") - 1.2).abs() < f64::EPSILON);
        assert!((registry.multiplier_for("Z99999") - DEFAULT_MULTIPLIER).abs() < f64::EPSILON);
    }

    #[test]
    fn area_code_list() {
        let registry = GeoRegistry::embedded();
        let codes = registry.area_codes();
        assert_eq!(codes.len(), EXPECTED_AREA_CODE_COUNT);
        assert_eq!(codes[0], "11110");
    }

    #[test]
    fn explicit_tables() {
        let registry = GeoRegistry::new(
            vec![CityGrid {
                id: "seoul".to_string(),
                name: "Seoul".to_string(),
                aliases: vec![],
                boxes: vec![GeoBox::new(0, 1, 0, 1), GeoBox::new(1, 2, 0, 1)],
            }],
            vec![],
            vec![],
        );
        assert_eq!(registry.boxes_for("Seoul").len(), 2);
        assert!(registry.sales_category_codes().is_empty());
        assert!(registry.area_codes().is_empty());
    }
}
