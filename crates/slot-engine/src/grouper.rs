//! Group a trainer-day's slots into maximal contiguous runs.
//!
//! Slots are sorted by start time, then walked once: a slot joins the current
//! group only if it starts exactly when the previous slot ends (no gap
//! tolerance) and has the same status. Groups drive both the chip display and
//! the bulk delete/repeat actions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::slot::{AvailabilitySlot, SlotId, SlotStatus};

/// An ordered run of contiguous, same-status slots. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotGroup {
    pub slots: Vec<AvailabilitySlot>,
}

impl SlotGroup {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.slots.first().map(|s| s.start_time)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.slots.last().map(|s| s.end_time)
    }

    pub fn status(&self) -> Option<SlotStatus> {
        self.slots.first().map(|s| s.status)
    }

    pub fn ids(&self) -> Vec<SlotId> {
        self.slots.iter().map(|s| s.id.clone()).collect()
    }

    pub fn contains(&self, id: &SlotId) -> bool {
        self.slots.iter().any(|s| &s.id == id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total span of the run in minutes.
    pub fn duration_minutes(&self) -> i64 {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => (end - start).num_minutes(),
            _ => 0,
        }
    }
}

/// Partition `slots` into maximal runs. O(n log n), dominated by the sort.
pub fn group(slots: &[AvailabilitySlot]) -> Vec<SlotGroup> {
    let mut sorted: Vec<&AvailabilitySlot> = slots.iter().collect();
    // Stable, so slots sharing a start keep their input order.
    sorted.sort_by_key(|s| s.start_time);

    let mut groups: Vec<SlotGroup> = Vec::new();
    for slot in sorted {
        if let Some(current) = groups.last_mut() {
            if let Some(prev) = current.slots.last() {
                if prev.end_time == slot.start_time && prev.status == slot.status {
                    current.slots.push(slot.clone());
                    continue;
                }
            }
        }
        groups.push(SlotGroup {
            slots: vec![slot.clone()],
        });
    }

    groups
}

/// Group only the slots filed under `trainer_id` on `date`.
pub fn group_day(slots: &[AvailabilitySlot], trainer_id: &str, date: NaiveDate) -> Vec<SlotGroup> {
    let day: Vec<AvailabilitySlot> = slots
        .iter()
        .filter(|s| s.trainer_id == trainer_id && s.date == date)
        .cloned()
        .collect();
    group(&day)
}

/// The group containing slot `id`, if any.
pub fn find_group<'a>(groups: &'a [SlotGroup], id: &SlotId) -> Option<&'a SlotGroup> {
    groups.iter().find(|g| g.contains(id))
}
