//! Canonical address-bar encoding of [`FilterSnapshot`].
//!
//! Parameters are always written in one fixed order with defaults omitted,
//! so two snapshots are equal exactly when their encodings are.

use url::form_urlencoded;

use super::{AppliedFilters, FilterSnapshot, PropertyType, SortOrder};
use crate::FIRST_PAGE;

pub const PARAM_TYPE: &str = "type";
pub const PARAM_ROOMS: &str = "rooms";
pub const PARAM_PRICE_MIN: &str = "priceMin";
pub const PARAM_PRICE_MAX: &str = "priceMax";
pub const PARAM_AREA_MIN: &str = "areaMin";
pub const PARAM_QUERY: &str = "q";
pub const PARAM_SORT: &str = "sort";
pub const PARAM_PAGE: &str = "page";

const KNOWN_PARAMS: [&str; 8] = [
    PARAM_TYPE,
    PARAM_ROOMS,
    PARAM_PRICE_MIN,
    PARAM_PRICE_MAX,
    PARAM_AREA_MIN,
    PARAM_QUERY,
    PARAM_SORT,
    PARAM_PAGE,
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedAddress {
    pub snapshot: FilterSnapshot,
    /// At least one known parameter carried a usable value.
    pub recognized: bool,
    /// Parameters this codec does not own, in their original order.
    pub extra: Vec<(String, String)>,
}

pub fn parse(search: &str) -> ParsedAddress {
    let raw = search.strip_prefix('?').unwrap_or(search);
    let mut parsed = ParsedAddress::default();

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        let value = value.trim();
        let used = match &*key {
            PARAM_TYPE => set(
                &mut parsed.snapshot.applied.property_type,
                PropertyType::from_param(value),
            ),
            PARAM_ROOMS => set(
                &mut parsed.snapshot.applied.rooms,
                value.parse::<u8>().ok().filter(|r| *r > 0),
            ),
            PARAM_PRICE_MIN => set(&mut parsed.snapshot.applied.price_min, value.parse().ok()),
            PARAM_PRICE_MAX => set(&mut parsed.snapshot.applied.price_max, value.parse().ok()),
            PARAM_AREA_MIN => set(&mut parsed.snapshot.applied.area_min, value.parse().ok()),
            PARAM_QUERY => set(
                &mut parsed.snapshot.applied.query,
                Some(value.to_string()).filter(|q| !q.is_empty()),
            ),
            PARAM_SORT => match SortOrder::from_param(value) {
                Some(sort) => {
                    parsed.snapshot.applied.sort = sort;
                    true
                }
                None => false,
            },
            PARAM_PAGE => match value.parse::<u32>().ok().filter(|p| *p >= FIRST_PAGE) {
                Some(page) => {
                    parsed.snapshot.page = page;
                    true
                }
                None => false,
            },
            other => {
                parsed.extra.push((other.to_string(), value.to_string()));
                false
            }
        };
        parsed.recognized |= used;
    }

    parsed
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => false,
    }
}

/// Canonical search string for `snapshot`; empty when everything is default.
pub fn encode(snapshot: &FilterSnapshot) -> String {
    encode_with_extra(snapshot, &[])
}

/// Like [`encode`], with foreign parameters appended after the known ones.
pub fn encode_with_extra(snapshot: &FilterSnapshot, extra: &[(String, String)]) -> String {
    let applied: &AppliedFilters = &snapshot.applied;
    let mut out = form_urlencoded::Serializer::new(String::new());

    if let Some(t) = applied.property_type {
        out.append_pair(PARAM_TYPE, t.as_str());
    }
    if let Some(rooms) = applied.rooms {
        out.append_pair(PARAM_ROOMS, &rooms.to_string());
    }
    if let Some(v) = applied.price_min {
        out.append_pair(PARAM_PRICE_MIN, &v.to_string());
    }
    if let Some(v) = applied.price_max {
        out.append_pair(PARAM_PRICE_MAX, &v.to_string());
    }
    if let Some(v) = applied.area_min {
        out.append_pair(PARAM_AREA_MIN, &v.to_string());
    }
    if let Some(q) = applied.query.as_deref() {
        out.append_pair(PARAM_QUERY, q);
    }
    if applied.sort != SortOrder::default() {
        out.append_pair(PARAM_SORT, applied.sort.as_str());
    }
    if snapshot.page > FIRST_PAGE {
        out.append_pair(PARAM_PAGE, &snapshot.page.to_string());
    }
    for (key, value) in extra {
        if !KNOWN_PARAMS.contains(&key.as_str()) {
            out.append_pair(key, value);
        }
    }

    let encoded = out.finish();
    if encoded.is_empty() {
        encoded
    } else {
        format!("?{encoded}")
    }
}

/// Canonical form of an arbitrary search string, ignoring foreign parameters.
pub fn canonicalize(search: &str) -> String {
    encode(&parse(search).snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_parameters() {
        let parsed = parse("?type=apartment&priceMin=1000000&page=2");
        assert!(parsed.recognized);
        assert_eq!(
            parsed.snapshot.applied.property_type,
            Some(PropertyType::Apartment)
        );
        assert_eq!(parsed.snapshot.applied.price_min, Some(1_000_000));
        assert_eq!(parsed.snapshot.page, 2);
        assert!(parsed.extra.is_empty());
    }

    #[test]
    fn test_canonical_encoding_is_stable() {
        let raw = "?type=apartment&priceMin=1000000&page=2";
        assert_eq!(canonicalize(raw), raw);
        assert_eq!(
            canonicalize("?page=2&priceMin=1000000&type=apartment"),
            raw
        );
    }

    #[test]
    fn test_defaults_are_omitted() {
        assert_eq!(encode(&FilterSnapshot::default()), "");
        assert_eq!(canonicalize("?sort=newest&page=1"), "");
    }

    #[test]
    fn test_unusable_values_are_not_recognized() {
        let parsed = parse("?type=castle&priceMin=-5&page=0&rooms=0");
        assert!(!parsed.recognized);
        assert_eq!(parsed.snapshot, FilterSnapshot::default());
    }

    #[test]
    fn test_foreign_parameters_are_preserved() {
        let parsed = parse("?utm_source=mail&rooms=2");
        assert_eq!(parsed.extra, vec![("utm_source".to_string(), "mail".to_string())]);
        assert_eq!(
            encode_with_extra(&parsed.snapshot, &parsed.extra),
            "?rooms=2&utm_source=mail"
        );
        assert_eq!(canonicalize("?utm_source=mail&rooms=2"), "?rooms=2");
    }

    #[test]
    fn test_query_text_round_trips_through_encoding() {
        let mut snapshot = FilterSnapshot::default();
        snapshot.applied.query = Some("вид на море & парк".into());
        let encoded = encode(&snapshot);
        assert_eq!(parse(&encoded).snapshot, snapshot);
    }

    #[test]
    fn test_without_leading_question_mark() {
        assert_eq!(parse("sort=price_asc").snapshot.applied.sort, SortOrder::PriceAsc);
    }
}
