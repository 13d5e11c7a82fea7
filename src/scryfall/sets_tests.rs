//! Tests for the Scryfall set list and next release prediction

use super::*;
use chrono::TimeZone;

const SETS_16: &str = include_str!("../../tests/data/sets-small-16sets.json");

fn sets_fixture() -> ScryfallSetList {
    ScryfallSetList::from_json_bytes(SETS_16.as_bytes()).unwrap()
}

fn midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

fn set(name: &str, released_at: &str, mtgo_code: Option<&str>) -> ScryfallSet {
    ScryfallSet {
        name: name.to_string(),
        released_at: Some(released_at.to_string()),
        mtgo_code: mtgo_code.map(str::to_string),
    }
}

#[test]
fn fixture_deserializes() {
    let sets = sets_fixture();
    assert_eq!(sets.data.len(), 16);
    assert!(!sets.has_more);
    // Sets that never come to MTGO have no mtgo_code
    assert_eq!(sets.data[1].mtgo_code, None);
}

#[test]
fn newest_announced_is_first_entry() {
    let sets = sets_fixture();
    let newest = sets.newest_announced().unwrap();
    assert_eq!(newest.name, "Ravnica Remastered");
    assert_eq!(newest.released_at.as_deref(), Some("2024-03-01"));
}

#[test]
fn next_release_before_target() {
    let next = sets_fixture()
        .next_released_mtgo_set(midnight(2023, 10, 14))
        .unwrap();

    assert_eq!(next.name, "Lost Caverns of Ixalan Commander");
    assert_eq!(next.released_at, NaiveDate::from_ymd_opt(2023, 11, 17).unwrap());
    assert_eq!(next.mtgo_code, "lcc");
}

#[test]
fn next_release_on_exact_release_date_is_still_upcoming() {
    let next = sets_fixture()
        .next_released_mtgo_set(midnight(2023, 11, 17))
        .unwrap();

    assert_eq!(next.name, "Lost Caverns of Ixalan Commander");
    assert_eq!(next.released_at, NaiveDate::from_ymd_opt(2023, 11, 17).unwrap());
}

#[test]
fn next_release_after_latest_known_release_errors() {
    let result = sets_fixture().next_released_mtgo_set(midnight(2024, 11, 17));
    assert!(matches!(result, Err(GetterError::NoUpcomingRelease { .. })));
}

#[test]
fn sets_without_mtgo_code_are_skipped() {
    let sets = vec![
        set("Paper Only", "2030-01-01", None),
        set("Also Paper", "2029-06-01", Some("")),
        set("On MTGO", "2029-01-01", Some("mto")),
        set("Old", "2020-01-01", Some("old")),
    ];

    let next = next_released_mtgo_set(&sets, midnight(2025, 1, 1)).unwrap();
    assert_eq!(next.name, "On MTGO");
}

#[test]
fn all_upcoming_returns_last_candidate() {
    let sets = vec![
        set("Far", "2030-01-01", Some("far")),
        set("Near", "2029-01-01", Some("nea")),
    ];

    let next = next_released_mtgo_set(&sets, midnight(2025, 1, 1)).unwrap();
    assert_eq!(next.name, "Near");
}

#[test]
fn empty_list_errors() {
    let result = next_released_mtgo_set(&[], midnight(2025, 1, 1));
    assert!(matches!(result, Err(GetterError::NoUpcomingRelease { .. })));
}

#[test]
fn only_lookback_window_is_scanned() {
    let mut sets: Vec<ScryfallSet> = (0..SET_LOOKBACK)
        .map(|i| set(&format!("Future {}", i), "2030-01-01", Some("fut")))
        .collect();
    // Closer to the target but beyond the lookback window
    sets.push(set("Beyond Lookback", "2026-01-01", Some("bey")));

    let next = next_released_mtgo_set(&sets, midnight(2025, 1, 1)).unwrap();
    assert_eq!(next.name, format!("Future {}", SET_LOOKBACK - 1));
}

#[test]
fn eligible_set_beyond_lookback_is_not_found() {
    let mut sets: Vec<ScryfallSet> = (0..SET_LOOKBACK)
        .map(|i| set(&format!("Paper {}", i), "2030-01-01", None))
        .collect();
    sets.push(set("Beyond Lookback", "2030-01-01", Some("bey")));

    let result = next_released_mtgo_set(&sets, midnight(2025, 1, 1));
    assert!(matches!(result, Err(GetterError::NoUpcomingRelease { .. })));
}

#[test]
fn malformed_release_date_errors() {
    let sets = vec![set("Broken", "17/11/2023", Some("brk"))];

    let result = next_released_mtgo_set(&sets, midnight(2023, 10, 14));
    assert!(matches!(result, Err(GetterError::InvalidDate { .. })));
}

#[test]
fn malformed_json_errors() {
    let result = ScryfallSetList::from_json_bytes(b"{\"object\": \"list\"}");
    assert!(matches!(result, Err(GetterError::Parse(_))));
}
