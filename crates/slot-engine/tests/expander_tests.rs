//! Tests for recurrence expansion.

use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use slot_engine::expander::{expand, RecurrenceMode, RecurrenceRequest, SkipReason};
use slot_engine::slot::{AvailabilitySlot, SlotStatus};
use slot_engine::timezone::{combine, to_owner_local};
use slot_engine::{DstPolicy, EngineConfig};

const NEW_YORK: &str = "America/New_York";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// An open slot at local `start..end` on `day` in `zone`.
fn local_slot(
    trainer: &str,
    day: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    zone: &str,
) -> AvailabilitySlot {
    AvailabilitySlot::open(
        trainer,
        combine(day, start, zone).into_value(),
        combine(day, end, zone).into_value(),
        zone.parse().unwrap(),
    )
}

fn request(sources: Vec<AvailabilitySlot>, mode: RecurrenceMode) -> RecurrenceRequest {
    RecurrenceRequest {
        source_slots: sources,
        mode,
    }
}

// ---------------------------------------------------------------------------
// NextWeek / NextMonth
// ---------------------------------------------------------------------------

#[test]
fn next_week_keeps_local_time_across_spring_forward() {
    // 2025-03-04 09:00 EST (UTC-5); DST starts 2025-03-09.
    let source = local_slot("t1", date(2025, 3, 4), time(9, 0), time(10, 0), NEW_YORK);
    assert_eq!(source.start_time.hour(), 14);

    let result = expand(
        &request(vec![source.clone()], RecurrenceMode::NextWeek),
        &[source],
        &EngineConfig::default(),
    )
    .expect("should expand");

    assert_eq!(result.slots.len(), 1);
    let next = &result.slots[0];
    assert_eq!(next.date, date(2025, 3, 11));
    // 09:00 EDT is 13:00 UTC: same wall clock, different offset.
    assert_eq!(
        next.start_time,
        Utc.with_ymd_and_hms(2025, 3, 11, 13, 0, 0).unwrap()
    );
    assert_eq!(
        next.end_time,
        Utc.with_ymd_and_hms(2025, 3, 11, 14, 0, 0).unwrap()
    );
    assert_eq!(to_owner_local(next.start_time, NEW_YORK).value.time(), time(9, 0));
}

#[test]
fn expanded_slots_are_fresh_and_open() {
    let mut source = local_slot("t1", date(2025, 6, 2), time(9, 0), time(10, 0), NEW_YORK);
    source.status = SlotStatus::Booked;
    source.package_id = Some("pkg-1".into());
    source.meeting_id = Some("meeting-1".into());

    let result = expand(
        &request(vec![source.clone()], RecurrenceMode::NextWeek),
        &[source.clone()],
        &EngineConfig::default(),
    )
    .unwrap();

    let next = &result.slots[0];
    assert_ne!(next.id, source.id);
    assert_eq!(next.status, SlotStatus::Open);
    assert_eq!(next.package_id, None);
    assert_eq!(next.meeting_id, None);
    assert_eq!(next.trainer_id, "t1");
    assert_eq!(next.owner_time_zone, NEW_YORK);
}

#[test]
fn next_month_clamps_to_last_day() {
    let source = local_slot("t1", date(2025, 1, 31), time(9, 0), time(9, 30), "UTC");

    let result = expand(
        &request(vec![source.clone()], RecurrenceMode::NextMonth),
        &[source],
        &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(result.slots.len(), 1);
    assert_eq!(result.slots[0].date, date(2025, 2, 28));
    assert_eq!(
        result.slots[0].start_time,
        Utc.with_ymd_and_hms(2025, 2, 28, 9, 0, 0).unwrap()
    );
}

#[test]
fn next_week_repeats_a_whole_run() {
    let run = vec![
        local_slot("t1", date(2025, 5, 5), time(9, 0), time(10, 0), NEW_YORK),
        local_slot("t1", date(2025, 5, 5), time(10, 0), time(11, 0), NEW_YORK),
        local_slot("t1", date(2025, 5, 5), time(11, 0), time(11, 30), NEW_YORK),
    ];

    let result = expand(
        &request(run.clone(), RecurrenceMode::NextWeek),
        &run,
        &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(result.slots.len(), 3);
    assert!(result.skipped.is_empty());
    for window in result.slots.windows(2) {
        assert_eq!(window[0].end_time, window[1].start_time, "run stays contiguous");
    }
    assert_eq!(result.slots[2].duration_minutes(), 30);
}

// ---------------------------------------------------------------------------
// Weekday modes
// ---------------------------------------------------------------------------

#[test]
fn tuesdays_for_three_months_with_one_blocked() {
    // Anchor Tuesday 2025-12-02; Tuesdays after it through 2026-03-02 number 12.
    let source = local_slot("t1", date(2025, 12, 2), time(9, 0), time(10, 0), NEW_YORK);
    let mut blocker = local_slot("t1", date(2026, 1, 13), time(9, 0), time(10, 0), NEW_YORK);
    blocker.status = SlotStatus::Booked;

    let result = expand(
        &request(
            vec![source.clone()],
            RecurrenceMode::DayOfWeekForMonths {
                weekday: Weekday::Tue,
                months: 3,
            },
        ),
        &[source.clone(), blocker.clone()],
        &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(result.slots.len(), 11);
    assert_eq!(result.skipped.len(), 1);
    let skip = &result.skipped[0];
    assert_eq!(skip.date, date(2026, 1, 13));
    assert_eq!(skip.source, source.id);
    assert_eq!(
        skip.reason,
        SkipReason::Overlap {
            conflicting: blocker.id.clone()
        }
    );

    for slot in &result.slots {
        assert_eq!(slot.date.weekday(), Weekday::Tue);
        assert_eq!(to_owner_local(slot.start_time, NEW_YORK).value.time(), time(9, 0));
    }
    assert_eq!(result.slots.first().unwrap().date, date(2025, 12, 9));
    assert_eq!(result.slots.last().unwrap().date, date(2026, 2, 24));
}

#[test]
fn weekday_mode_emits_one_slot_per_source_per_date() {
    let sources = vec![
        local_slot("t1", date(2025, 9, 1), time(9, 0), time(10, 0), "UTC"),
        local_slot("t1", date(2025, 9, 1), time(14, 0), time(15, 0), "UTC"),
    ];

    let result = expand(
        &request(
            sources.clone(),
            RecurrenceMode::DayOfWeekForCurrentMonth {
                weekday: Weekday::Fri,
            },
        ),
        &sources,
        &EngineConfig::default(),
    )
    .unwrap();

    // Fridays after 2025-09-01 in September: 5, 12, 19, 26.
    assert_eq!(result.slots.len(), 8);
    let dates: Vec<NaiveDate> = result.slots.iter().map(|s| s.date).collect();
    assert_eq!(dates[0], date(2025, 9, 5));
    assert_eq!(dates[7], date(2025, 9, 26));
}

#[test]
fn current_month_mode_excludes_anchor_and_other_months() {
    // Anchor is itself a Wednesday; it must not be repeated onto itself.
    let source = local_slot("t1", date(2025, 10, 15), time(8, 0), time(9, 0), "UTC");

    let result = expand(
        &request(
            vec![source.clone()],
            RecurrenceMode::DayOfWeekForCurrentMonth {
                weekday: Weekday::Wed,
            },
        ),
        &[source],
        &EngineConfig::default(),
    )
    .unwrap();

    let dates: Vec<NaiveDate> = result.slots.iter().map(|s| s.date).collect();
    assert_eq!(dates, vec![date(2025, 10, 22), date(2025, 10, 29)]);
}

#[test]
fn current_month_mode_on_last_day_yields_nothing() {
    let source = local_slot("t1", date(2025, 10, 31), time(8, 0), time(9, 0), "UTC");
    let result = expand(
        &request(
            vec![source.clone()],
            RecurrenceMode::DayOfWeekForCurrentMonth {
                weekday: Weekday::Fri,
            },
        ),
        &[source],
        &EngineConfig::default(),
    )
    .unwrap();
    assert!(result.slots.is_empty());
    assert!(result.skipped.is_empty());
}

#[test]
fn months_are_capped_by_config() {
    let source = local_slot("t1", date(2025, 1, 6), time(8, 0), time(9, 0), "UTC");
    let config = EngineConfig {
        max_recurrence_months: 1,
        ..EngineConfig::default()
    };

    let result = expand(
        &request(
            vec![source.clone()],
            RecurrenceMode::DayOfWeekForMonths {
                weekday: Weekday::Mon,
                months: 24,
            },
        ),
        &[source],
        &config,
    )
    .unwrap();

    // Mondays after 2025-01-06 through 2025-02-06.
    assert_eq!(result.slots.len(), 4);
}

#[test]
fn long_horizon_is_not_truncated() {
    let config = EngineConfig {
        max_recurrence_months: 240,
        ..EngineConfig::default()
    };
    let source = local_slot("t1", date(2025, 1, 6), time(9, 0), time(10, 0), "UTC");

    let result = expand(
        &request(
            vec![source],
            RecurrenceMode::DayOfWeekForMonths {
                weekday: Weekday::Mon,
                months: 240,
            },
        ),
        &[],
        &config,
    )
    .unwrap();

    // Every Monday after 2025-01-06 through 2045-01-06.
    assert_eq!(result.slots.len(), 1043);
    assert_eq!(result.slots.last().unwrap().date, date(2045, 1, 2));
}

#[test]
fn empty_request_expands_to_nothing() {
    let result = expand(
        &request(vec![], RecurrenceMode::NextWeek),
        &[],
        &EngineConfig::default(),
    )
    .unwrap();
    assert!(result.slots.is_empty());
}

// ---------------------------------------------------------------------------
// DST edge cases
// ---------------------------------------------------------------------------

#[test]
fn instance_in_dst_gap_is_skipped_under_skip_policy() {
    // 02:30 exists on 2025-03-02 but not on 2025-03-09 in New York.
    let source = local_slot("t1", date(2025, 3, 2), time(2, 30), time(3, 30), NEW_YORK);
    let config = EngineConfig {
        dst_policy: DstPolicy::Skip,
        ..EngineConfig::default()
    };

    let result = expand(
        &request(vec![source.clone()], RecurrenceMode::NextWeek),
        &[source],
        &config,
    )
    .unwrap();

    assert!(result.slots.is_empty());
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].reason, SkipReason::NonexistentLocalTime);
    assert_eq!(result.skipped[0].date, date(2025, 3, 9));
}

#[test]
fn invalid_owner_zone_expands_in_utc_with_warning() {
    let mut source = local_slot("t1", date(2025, 4, 1), time(9, 0), time(10, 0), "UTC");
    source.owner_time_zone = "Nowhere/Atlantis".into();

    let result = expand(
        &request(vec![source.clone()], RecurrenceMode::NextWeek),
        &[source],
        &EngineConfig::default(),
    )
    .unwrap();

    assert_eq!(result.slots.len(), 1);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].zone, "Nowhere/Atlantis");
}

#[test]
fn target_window_covers_expansion() {
    let source = local_slot("t1", date(2025, 12, 2), time(9, 0), time(10, 0), NEW_YORK);
    let req = request(
        vec![source],
        RecurrenceMode::DayOfWeekForMonths {
            weekday: Weekday::Tue,
            months: 3,
        },
    );

    let window = req
        .target_window(&EngineConfig::default())
        .unwrap()
        .expect("non-empty expansion has a window");
    assert_eq!(window.start, date(2025, 12, 8));
    assert_eq!(window.end, date(2026, 2, 25));
}
