//! The availability slot data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque slot identifier, assigned at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(Uuid);

impl SlotId {
    /// A fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SlotId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for SlotId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Booking state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Open,
    Booked,
    /// Terminal. A released slot may be deleted, or replaced by a new open slot.
    Released,
}

impl SlotStatus {
    /// Open and booked slots occupy the trainer's time; released ones do not.
    pub fn occupies_time(self) -> bool {
        matches!(self, SlotStatus::Open | SlotStatus::Booked)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotStatus::Open => "open",
            SlotStatus::Booked => "booked",
            SlotStatus::Released => "released",
        };
        f.write_str(s)
    }
}

/// A single bookable interval owned by one trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub id: SlotId,
    pub trainer_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Trainer-local date the slot is filed under. Derived from `start_time` in
    /// the owner's zone at creation and never recomputed.
    pub date: NaiveDate,
    pub status: SlotStatus,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub meeting_id: Option<String>,
    pub owner_time_zone: String,
}

impl AvailabilitySlot {
    /// Build a new open slot with a fresh id, filing it under the trainer-local
    /// date of `start_time` in `owner_zone`.
    pub fn open(
        trainer_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        owner_zone: Tz,
    ) -> Self {
        Self {
            id: SlotId::new(),
            trainer_id: trainer_id.into(),
            start_time,
            end_time,
            date: start_time.with_timezone(&owner_zone).date_naive(),
            status: SlotStatus::Open,
            package_id: None,
            meeting_id: None,
            owner_time_zone: owner_zone.name().to_string(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Half-open interval overlap: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &AvailabilitySlot) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

/// Inclusive range of trainer-local dates, used as the store query key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// Widen by one day on each side. Slot dates are frozen in the owner's zone
    /// at creation, so a neighbouring date can still hold an overlapping slot.
    pub fn padded(self) -> Self {
        Self {
            start: self.start.pred_opt().unwrap_or(self.start),
            end: self.end.succ_opt().unwrap_or(self.end),
        }
    }

    /// The smallest range covering both `self` and `date`.
    pub fn including(self, date: NaiveDate) -> Self {
        Self {
            start: self.start.min(date),
            end: self.end.max(date),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}
