//! Trainer intent expressed in local wall-clock time, and its conversion into
//! concrete slots.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::timezone::{self, Resolved};
use crate::slot::AvailabilitySlot;

/// "I am free from `start` to `end` on `date`", in the trainer's zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotProposal {
    pub trainer_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub time_zone: String,
}

impl SlotProposal {
    /// The single open slot this proposal describes. An `end` at or before
    /// `start` is taken to be on the following day.
    pub fn to_slot(&self) -> Resolved<AvailabilitySlot> {
        let tz = timezone::resolve_zone(&self.time_zone);
        let warning = tz.warning.clone();
        let tz = tz.value;

        let start = timezone::combine(self.date, self.start, tz.name()).into_value();
        let end_date = end_date(self.date, self.start, self.end);
        let end = timezone::combine(end_date, self.end, tz.name()).into_value();

        Resolved {
            value: AvailabilitySlot::open(self.trainer_id.clone(), start, end, tz),
            warning,
        }
    }
}

/// A local window to be split into bucket-sized slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeProposal {
    pub trainer_id: String,
    pub date: NaiveDate,
    pub from: NaiveTime,
    pub to: NaiveTime,
    pub time_zone: String,
}

/// Split the proposal's window into consecutive slots of `bucket_minutes`.
///
/// The final slot is clipped to the window end and may be shorter than a
/// bucket. Buckets are laid out on absolute time, so a window spanning a DST
/// transition yields one slot per elapsed hour, not per wall-clock hour.
pub fn generate_range(proposal: &RangeProposal, bucket_minutes: i64) -> Resolved<Vec<AvailabilitySlot>> {
    let tz = timezone::resolve_zone(&proposal.time_zone);
    let warning = tz.warning.clone();
    let tz = tz.value;

    let window_start = timezone::combine(proposal.date, proposal.from, tz.name()).into_value();
    let window_end = timezone::combine(
        end_date(proposal.date, proposal.from, proposal.to),
        proposal.to,
        tz.name(),
    )
    .into_value();

    let mut slots = Vec::new();
    if bucket_minutes > 0 {
        let bucket = Duration::minutes(bucket_minutes);
        let mut cursor = window_start;
        while cursor < window_end {
            let next = (cursor + bucket).min(window_end);
            slots.push(AvailabilitySlot::open(
                proposal.trainer_id.clone(),
                cursor,
                next,
                tz,
            ));
            cursor = next;
        }
    }

    tracing::debug!(
        trainer_id = %proposal.trainer_id,
        date = %proposal.date,
        count = slots.len(),
        "generated slots for window"
    );

    Resolved {
        value: slots,
        warning,
    }
}

fn end_date(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> NaiveDate {
    if end <= start {
        date.succ_opt().unwrap_or(date)
    } else {
        date
    }
}
