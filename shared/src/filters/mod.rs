//! Search/filter state shared by the address bar, the store and the
//! free-text inputs.

pub mod address;
pub mod draft;
pub mod driver;
pub mod sync;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::FIRST_PAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    House,
    Room,
    Land,
    Commercial,
}

impl PropertyType {
    #[must_use]
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "apartment" => Some(Self::Apartment),
            "house" => Some(Self::House),
            "room" => Some(Self::Room),
            "land" => Some(Self::Land),
            "commercial" => Some(Self::Commercial),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apartment => "apartment",
            Self::House => "house",
            Self::Room => "room",
            Self::Land => "land",
            Self::Commercial => "commercial",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    AreaDesc,
}

impl SortOrder {
    #[must_use]
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "newest" => Some(Self::Newest),
            "price_asc" => Some(Self::PriceAsc),
            "price_desc" => Some(Self::PriceDesc),
            "area_desc" => Some(Self::AreaDesc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::AreaDesc => "area_desc",
        }
    }
}

/// Filter values currently driving data fetch and the address bar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppliedFilters {
    pub property_type: Option<PropertyType>,
    pub rooms: Option<u8>,
    pub price_min: Option<u64>,
    pub price_max: Option<u64>,
    pub area_min: Option<u64>,
    pub query: Option<String>,
    pub sort: SortOrder,
}

impl AppliedFilters {
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Whether moving from `previous` to `self` can change which results
    /// exist, so the current page may no longer be meaningful.
    ///
    /// Sort changes never do. A bound only counts when it gets tighter;
    /// loosening or clearing it keeps the page.
    #[must_use]
    pub fn resets_page_from(&self, previous: &Self) -> bool {
        self.property_type != previous.property_type
            || self.rooms != previous.rooms
            || self.query != previous.query
            || lower_bound_tightened(previous.price_min, self.price_min)
            || upper_bound_tightened(previous.price_max, self.price_max)
            || lower_bound_tightened(previous.area_min, self.area_min)
    }

    pub fn value(&self, field: DraftField) -> Option<String> {
        match field {
            DraftField::PriceMin => self.price_min.map(|v| v.to_string()),
            DraftField::PriceMax => self.price_max.map(|v| v.to_string()),
            DraftField::AreaMin => self.area_min.map(|v| v.to_string()),
            DraftField::Query => self.query.clone(),
        }
    }

    pub fn clear(&mut self, field: DraftField) {
        match field {
            DraftField::PriceMin => self.price_min = None,
            DraftField::PriceMax => self.price_max = None,
            DraftField::AreaMin => self.area_min = None,
            DraftField::Query => self.query = None,
        }
    }
}

fn lower_bound_tightened(old: Option<u64>, new: Option<u64>) -> bool {
    match (old, new) {
        (None, Some(_)) => true,
        (Some(old), Some(new)) => new > old,
        _ => false,
    }
}

fn upper_bound_tightened(old: Option<u64>, new: Option<u64>) -> bool {
    match (old, new) {
        (None, Some(_)) => true,
        (Some(old), Some(new)) => new < old,
        _ => false,
    }
}

/// What the shared store holds: applied filters plus the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSnapshot {
    pub applied: AppliedFilters,
    pub page: u32,
}

impl Default for FilterSnapshot {
    fn default() -> Self {
        Self {
            applied: AppliedFilters::default(),
            page: FIRST_PAGE,
        }
    }
}

/// Partial store write; `None` halves are left as they are.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPatch {
    pub applied: Option<AppliedFilters>,
    pub page: Option<u32>,
}

impl FilterPatch {
    #[must_use]
    pub fn full(snapshot: FilterSnapshot) -> Self {
        Self {
            applied: Some(snapshot.applied),
            page: Some(snapshot.page),
        }
    }

    #[must_use]
    pub fn applied(applied: AppliedFilters) -> Self {
        Self {
            applied: Some(applied),
            page: None,
        }
    }

    #[must_use]
    pub fn page(page: u32) -> Self {
        Self {
            applied: None,
            page: Some(page),
        }
    }

    #[must_use]
    pub fn apply_to(&self, current: &FilterSnapshot) -> FilterSnapshot {
        FilterSnapshot {
            applied: self
                .applied
                .clone()
                .unwrap_or_else(|| current.applied.clone()),
            page: self.page.unwrap_or(current.page).max(FIRST_PAGE),
        }
    }
}

/// Free-text inputs that keep a draft separate from the applied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DraftField {
    PriceMin,
    PriceMax,
    AreaMin,
    Query,
}

impl DraftField {
    pub const ALL: [Self; 4] = [Self::PriceMin, Self::PriceMax, Self::AreaMin, Self::Query];

    #[must_use]
    pub const fn is_price(self) -> bool {
        matches!(self, Self::PriceMin | Self::PriceMax)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceMin => "price_min",
            Self::PriceMax => "price_max",
            Self::AreaMin => "area_min",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Select-style filters, applied without debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChange {
    PropertyType(Option<PropertyType>),
    Rooms(Option<u8>),
    Sort(SortOrder),
}

impl FilterChange {
    pub fn apply(self, applied: &mut AppliedFilters) {
        match self {
            Self::PropertyType(value) => applied.property_type = value,
            Self::Rooms(value) => applied.rooms = value,
            Self::Sort(value) => applied.sort = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    All,
    Price,
    Area,
    Query,
}

impl ResetScope {
    #[must_use]
    pub fn fields(self) -> &'static [DraftField] {
        match self {
            Self::All => &DraftField::ALL,
            Self::Price => &[DraftField::PriceMin, DraftField::PriceMax],
            Self::Area => &[DraftField::AreaMin],
            Self::Query => &[DraftField::Query],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(f: impl FnOnce(&mut AppliedFilters)) -> AppliedFilters {
        let mut applied = AppliedFilters::default();
        f(&mut applied);
        applied
    }

    #[test]
    fn test_enum_string_forms() {
        for t in [
            PropertyType::Apartment,
            PropertyType::House,
            PropertyType::Room,
            PropertyType::Land,
            PropertyType::Commercial,
        ] {
            assert_eq!(PropertyType::from_param(t.as_str()), Some(t));
        }
        assert_eq!(SortOrder::from_param("price_desc"), Some(SortOrder::PriceDesc));
        assert_eq!(SortOrder::from_param("cheapest"), None);
    }

    #[test]
    fn test_sort_change_keeps_page() {
        let old = AppliedFilters::default();
        let new = with(|a| a.sort = SortOrder::PriceAsc);
        assert!(!new.resets_page_from(&old));
    }

    #[test]
    fn test_tightening_resets_page() {
        let old = with(|a| a.price_min = Some(1_000_000));
        assert!(with(|a| a.price_min = Some(2_000_000)).resets_page_from(&old));
        assert!(with(|a| {
            a.price_min = Some(1_000_000);
            a.price_max = Some(5_000_000);
        })
        .resets_page_from(&old));
    }

    #[test]
    fn test_loosening_keeps_page() {
        let old = with(|a| {
            a.price_min = Some(2_000_000);
            a.price_max = Some(5_000_000);
            a.area_min = Some(40);
        });
        let looser = with(|a| {
            a.price_min = Some(1_000_000);
            a.price_max = Some(9_000_000);
            a.area_min = None;
        });
        assert!(!looser.resets_page_from(&old));
    }

    #[test]
    fn test_type_and_query_reset_page() {
        let old = AppliedFilters::default();
        assert!(with(|a| a.property_type = Some(PropertyType::Land)).resets_page_from(&old));
        assert!(with(|a| a.query = Some("loft".into())).resets_page_from(&old));
        let queried = with(|a| a.query = Some("loft".into()));
        assert!(old.resets_page_from(&queried));
    }

    #[test]
    fn test_patch_never_goes_below_first_page() {
        let snapshot = FilterPatch::page(0).apply_to(&FilterSnapshot::default());
        assert_eq!(snapshot.page, FIRST_PAGE);
    }

    #[test]
    fn test_reset_scope_fields() {
        assert_eq!(ResetScope::All.fields().len(), 4);
        assert_eq!(
            ResetScope::Price.fields(),
            &[DraftField::PriceMin, DraftField::PriceMax]
        );
    }
}
