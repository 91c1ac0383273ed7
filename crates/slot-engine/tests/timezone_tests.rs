//! Tests for time-zone normalization and DST resolution.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use slot_engine::dst::DstPolicy;
use slot_engine::slot::AvailabilitySlot;
use slot_engine::timezone::{self, combine, combine_in, display, to_owner_local, to_viewer_local};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn new_york_morning_is_london_afternoon() {
    // 2025-03-10: New York is already on EDT (UTC-4), London still on GMT.
    let start = combine(date(2025, 3, 10), time(9, 0), "America/New_York");
    assert!(start.warning.is_none());
    assert_eq!(
        start.value,
        Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap()
    );

    let seen = to_viewer_local(start.value, "Europe/London").into_value();
    assert_eq!(seen.date(), date(2025, 3, 10));
    assert_eq!(seen.time(), time(13, 0));
}

#[test]
fn owner_local_roundtrips_combine() {
    let instant = combine(date(2025, 7, 1), time(18, 30), "Asia/Tokyo").into_value();
    let local = to_owner_local(instant, "Asia/Tokyo").into_value();
    assert_eq!(local, date(2025, 7, 1).and_time(time(18, 30)));
}

#[test]
fn invalid_zone_falls_back_to_utc_with_warning() {
    let result = combine(date(2025, 3, 10), time(9, 0), "Mars/Olympus_Mons");

    assert_eq!(
        result.value,
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    );
    let warning = result.warning.expect("fallback should be signalled");
    assert_eq!(warning.zone, "Mars/Olympus_Mons");
}

#[test]
fn invalid_viewer_zone_shows_utc() {
    let instant = Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap();
    let seen = to_viewer_local(instant, "not-a-zone");
    assert!(seen.warning.is_some());
    assert_eq!(seen.value.time(), time(13, 0));
}

#[test]
fn spring_forward_gap_shifts_forward() {
    // 02:30 does not exist in New York on 2025-03-09; shifted past the gap it
    // becomes 03:30 EDT = 07:30 UTC.
    let instant = combine_in(
        date(2025, 3, 9),
        time(2, 30),
        chrono_tz::America::New_York,
        DstPolicy::ShiftForward,
    );
    assert_eq!(
        instant,
        Some(Utc.with_ymd_and_hms(2025, 3, 9, 7, 30, 0).unwrap())
    );
}

#[test]
fn spring_forward_gap_skipped_under_skip_policy() {
    let instant = combine_in(
        date(2025, 3, 9),
        time(2, 30),
        chrono_tz::America::New_York,
        DstPolicy::Skip,
    );
    assert_eq!(instant, None);
}

#[test]
fn fall_back_ambiguity_resolves_to_earliest() {
    // 01:30 happens twice on 2025-11-02; the first is EDT (UTC-4).
    let instant = combine_in(
        date(2025, 11, 2),
        time(1, 30),
        chrono_tz::America::New_York,
        DstPolicy::Skip,
    );
    assert_eq!(
        instant,
        Some(Utc.with_ymd_and_hms(2025, 11, 2, 5, 30, 0).unwrap())
    );
}

#[test]
fn display_renders_slot_in_viewer_zone() {
    let start = Utc.with_ymd_and_hms(2025, 3, 10, 13, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap();
    let slot = AvailabilitySlot::open("trainer-1", start, end, chrono_tz::America::New_York);

    let shown = display(&slot, "Asia/Tokyo").into_value();
    // Tokyo is UTC+9: 22:00-23:00 the same day.
    assert_eq!(shown.local_date, date(2025, 3, 10));
    assert_eq!(shown.local_start, time(22, 0));
    assert_eq!(shown.local_end, time(23, 0));
    assert_eq!(shown.time_zone, "Asia/Tokyo");
}

#[test]
fn slot_date_is_filed_in_owner_zone() {
    // 02:00 UTC on the 11th is still the evening of the 10th in Los Angeles.
    let start = Utc.with_ymd_and_hms(2025, 3, 11, 2, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 3, 11, 3, 0, 0).unwrap();
    let slot = AvailabilitySlot::open("trainer-1", start, end, chrono_tz::America::Los_Angeles);

    assert_eq!(slot.date, date(2025, 3, 10));
    assert_eq!(slot.owner_time_zone, "America/Los_Angeles");
}

#[test]
fn resolve_zone_accepts_utc() {
    let resolved = timezone::resolve_zone("UTC");
    assert!(resolved.warning.is_none());
    assert_eq!(resolved.value, chrono_tz::UTC);
}
