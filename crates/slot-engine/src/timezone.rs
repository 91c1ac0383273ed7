//! Conversions between absolute instants and trainer/viewer wall-clock time.
//!
//! All functions are pure. An unknown IANA identifier never fails an
//! operation: the conversion is carried out in UTC and the returned
//! [`Resolved`] carries a [`ConfigurationError`] describing the fallback.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::dst::DstPolicy;
use crate::error::ConfigurationError;
use crate::slot::{AvailabilitySlot, SlotId, SlotStatus};

/// A value computed under a possibly-substituted time zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    /// Set when the requested zone was invalid and UTC was used instead.
    pub warning: Option<ConfigurationError>,
}

impl<T> Resolved<T> {
    fn exact(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            warning: self.warning,
        }
    }

    /// Discard the warning. It has already been logged at resolution time.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Resolve an IANA zone identifier, falling back to UTC.
pub fn resolve_zone(zone: &str) -> Resolved<Tz> {
    match zone.parse::<Tz>() {
        Ok(tz) => Resolved::exact(tz),
        Err(_) => {
            tracing::warn!(zone, "unknown time zone, falling back to UTC");
            Resolved {
                value: Tz::UTC,
                warning: Some(ConfigurationError {
                    zone: zone.to_string(),
                }),
            }
        }
    }
}

/// Wall-clock time of `instant` in `tz`.
pub fn local_in(instant: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

/// Wall-clock time of `instant` as seen by a viewer in `viewer_zone`.
pub fn to_viewer_local(instant: DateTime<Utc>, viewer_zone: &str) -> Resolved<NaiveDateTime> {
    resolve_zone(viewer_zone).map(|tz| local_in(instant, tz))
}

/// Wall-clock time of `instant` in the slot owner's zone.
pub fn to_owner_local(instant: DateTime<Utc>, owner_zone: &str) -> Resolved<NaiveDateTime> {
    resolve_zone(owner_zone).map(|tz| local_in(instant, tz))
}

/// Combine a local date and time in `zone` into an absolute instant, shifting
/// nonexistent (spring-forward) times past the gap.
pub fn combine(date: NaiveDate, time: NaiveTime, zone: &str) -> Resolved<DateTime<Utc>> {
    resolve_zone(zone).map(|tz| {
        // ShiftForward always yields an instant.
        combine_in(date, time, tz, DstPolicy::ShiftForward)
            .unwrap_or_else(|| date.and_time(time).and_utc())
    })
}

/// Combine a local date and time in an already-resolved zone.
///
/// Ambiguous times resolve to the earliest instant. Nonexistent times follow
/// `policy`; `Skip` returns `None`.
pub fn combine_in(
    date: NaiveDate,
    time: NaiveTime,
    tz: Tz,
    policy: DstPolicy,
) -> Option<DateTime<Utc>> {
    let local = date.and_time(time);
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return Some(dt.with_timezone(&Utc));
    }

    match policy {
        DstPolicy::Skip => None,
        DstPolicy::ShiftForward => {
            // No zone has a gap longer than a few hours.
            let before_gap = tz
                .from_local_datetime(&(local - Duration::hours(3)))
                .earliest()?;
            let offset_secs = before_gap.offset().fix().local_minus_utc();
            Some(local.and_utc() - Duration::seconds(i64::from(offset_secs)))
        }
    }
}

/// A slot rendered in a viewer's time zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySlot {
    pub id: SlotId,
    pub local_date: NaiveDate,
    pub local_start: NaiveTime,
    pub local_end: NaiveTime,
    pub status: SlotStatus,
    pub time_zone: String,
}

/// Render `slot` for a viewer in `viewer_zone`.
pub fn display(slot: &AvailabilitySlot, viewer_zone: &str) -> Resolved<DisplaySlot> {
    resolve_zone(viewer_zone).map(|tz| {
        let start = local_in(slot.start_time, tz);
        let end = local_in(slot.end_time, tz);
        DisplaySlot {
            id: slot.id.clone(),
            local_date: start.date(),
            local_start: start.time(),
            local_end: end.time(),
            status: slot.status,
            time_zone: tz.name().to_string(),
        }
    })
}
