//! Duration and non-overlap validation for candidate slots.
//!
//! Two slots overlap when `a.start < b.end && b.start < a.end`. Adjacent slots
//! (one ends exactly when the other starts) do NOT overlap. Only `Open` and
//! `Booked` slots of the same trainer block a candidate.
//!
//! Validation is pure: the same inputs always produce the same result, which is
//! what makes retries of a rejected proposal safe.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::ValidationError;
use crate::slot::{AvailabilitySlot, SlotId};

/// Durations accepted for individually created slots when no config is given.
pub const STANDARD_DURATIONS_MINUTES: [i64; 2] = [30, 60];

/// Which duration rule a candidate is held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationRule<'a> {
    /// Individually created slots: the duration must be one of `allowed`.
    Exact { allowed: &'a [i64] },
    /// Window-generated slots: each slot lasts at most one bucket, and only the
    /// final slot of a contiguous run may be shorter than a bucket.
    Range { bucket_minutes: i64 },
}

impl<'a> DurationRule<'a> {
    pub fn standard() -> DurationRule<'static> {
        DurationRule::Exact {
            allowed: &STANDARD_DURATIONS_MINUTES,
        }
    }

    pub fn exact(config: &'a EngineConfig) -> Self {
        DurationRule::Exact {
            allowed: &config.allowed_durations_minutes,
        }
    }

    pub fn range(config: &EngineConfig) -> Self {
        DurationRule::Range {
            bucket_minutes: config.range_bucket_minutes,
        }
    }

    fn admits(&self, minutes: i64) -> bool {
        match *self {
            DurationRule::Exact { allowed } => allowed.contains(&minutes),
            DurationRule::Range { bucket_minutes } => minutes > 0 && minutes <= bucket_minutes,
        }
    }
}

/// A single candidate or a batch proposed together.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    Single(&'a AvailabilitySlot),
    Batch(&'a [AvailabilitySlot]),
}

impl<'a> Candidate<'a> {
    fn as_slice(&self) -> &'a [AvailabilitySlot] {
        match *self {
            Candidate::Single(slot) => std::slice::from_ref(slot),
            Candidate::Batch(slots) => slots,
        }
    }
}

/// Validate a candidate (or batch) against the existing slots.
///
/// Rules are applied in order across the whole candidate set: duration, then
/// overlap with `existing`, then pairwise overlap within the batch. The first
/// violation is returned.
pub fn validate(
    candidate: Candidate<'_>,
    existing: &[AvailabilitySlot],
    rule: DurationRule<'_>,
) -> Result<(), ValidationError> {
    let batch = candidate.as_slice();

    for slot in batch {
        check_duration(slot, rule)?;
    }

    if let DurationRule::Range { bucket_minutes } = rule {
        for slot in batch {
            let short = slot.duration_minutes() < bucket_minutes;
            let continued = batch
                .iter()
                .any(|next| next.trainer_id == slot.trainer_id && next.start_time == slot.end_time);
            if short && continued {
                return Err(ValidationError::InvalidDuration {
                    slot: slot.id.clone(),
                    minutes: slot.duration_minutes(),
                });
            }
        }
    }

    for slot in batch {
        if let Some(conflict) = first_conflict(slot, existing) {
            return Err(ValidationError::Overlap {
                slot: slot.id.clone(),
                conflicting: conflict.id.clone(),
            });
        }
    }

    for (i, later) in batch.iter().enumerate() {
        if let Some(earlier) = batch[..i].iter().find(|s| blocks(s, later)) {
            return Err(ValidationError::Overlap {
                slot: later.id.clone(),
                conflicting: earlier.id.clone(),
            });
        }
    }

    Ok(())
}

/// Per-candidate outcome of [`partition`].
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub accepted: Vec<AvailabilitySlot>,
    pub rejected: Vec<(AvailabilitySlot, ValidationError)>,
}

/// Validate candidates one at a time, keeping the ones that pass.
///
/// Each candidate is checked against `existing` and against the candidates
/// accepted before it, so the accepted set is itself overlap-free. Used by
/// partial-success batch operations.
pub fn partition(
    candidates: Vec<AvailabilitySlot>,
    existing: &[AvailabilitySlot],
    rule: DurationRule<'_>,
) -> Partition {
    let mut result = Partition::default();

    for slot in candidates {
        let verdict = check_duration(&slot, rule).and_then(|()| {
            match first_conflict(&slot, existing)
                .or_else(|| first_conflict(&slot, &result.accepted))
            {
                Some(conflict) => Err(ValidationError::Overlap {
                    slot: slot.id.clone(),
                    conflicting: conflict.id.clone(),
                }),
                None => Ok(()),
            }
        });

        match verdict {
            Ok(()) => result.accepted.push(slot),
            Err(reason) => result.rejected.push((slot, reason)),
        }
    }

    result
}

/// A detected overlap between two time-occupying slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub slot_a: SlotId,
    pub slot_b: SlotId,
    pub overlap_minutes: i64,
}

/// Find every pair of overlapping open/booked slots of the same trainer.
pub fn find_overlaps(slots: &[AvailabilitySlot]) -> Vec<Overlap> {
    let mut overlaps = Vec::new();

    for (i, a) in slots.iter().enumerate() {
        for b in &slots[i + 1..] {
            if b.status.occupies_time() && blocks(a, b) {
                let overlap_start = a.start_time.max(b.start_time);
                let overlap_end = a.end_time.min(b.end_time);
                overlaps.push(Overlap {
                    slot_a: a.id.clone(),
                    slot_b: b.id.clone(),
                    overlap_minutes: (overlap_end - overlap_start).num_minutes(),
                });
            }
        }
    }

    overlaps
}

fn check_duration(slot: &AvailabilitySlot, rule: DurationRule<'_>) -> Result<(), ValidationError> {
    let minutes = slot.duration_minutes();
    // Sub-minute remainders never tile a bucket.
    let whole = slot.duration() == chrono::Duration::minutes(minutes);
    if slot.end_time <= slot.start_time || !whole || !rule.admits(minutes) {
        return Err(ValidationError::InvalidDuration {
            slot: slot.id.clone(),
            minutes,
        });
    }
    Ok(())
}

fn first_conflict<'e>(
    slot: &AvailabilitySlot,
    existing: &'e [AvailabilitySlot],
) -> Option<&'e AvailabilitySlot> {
    existing.iter().find(|other| blocks(other, slot))
}

/// Whether `other` blocks `slot`: same trainer, a different slot, occupying
/// time, and overlapping.
fn blocks(other: &AvailabilitySlot, slot: &AvailabilitySlot) -> bool {
    other.trainer_id == slot.trainer_id
        && other.id != slot.id
        && other.status.occupies_time()
        && other.overlaps(slot)
}
