//! Recurrence expansion -- turns template slots and a repetition rule into new
//! concrete slots.
//!
//! Every instance is rebuilt from the source slot's trainer-local time of day
//! on the target date, so a 09:00 slot stays at 09:00 local on both sides of a
//! DST transition even though its UTC offset changes. Weekday enumeration is
//! delegated to the `rrule` crate.
//!
//! Expansion is partial-success: candidates are validated against the existing
//! slots and against each other, and the ones that fail are reported in
//! [`Expansion::skipped`] instead of failing the whole request.

use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate, Weekday};
use chrono_tz::Tz;
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dst::DstPolicy;
use crate::error::{ConfigurationError, Result, SchedulingError, ValidationError};
use crate::slot::{AvailabilitySlot, DateRange, SlotId, SlotStatus};
use crate::timezone::{self, local_in};
use crate::validator::{self, DurationRule};

/// How a set of source slots is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrenceMode {
    /// Same local time, seven days later.
    NextWeek,
    /// Same local time and day of month, one month later (clamped to the
    /// month's last day).
    NextMonth,
    /// Every `weekday` after the anchor date, through `months` months ahead.
    DayOfWeekForMonths { weekday: Weekday, months: u32 },
    /// Every remaining `weekday` in the anchor date's month.
    DayOfWeekForCurrentMonth { weekday: Weekday },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRequest {
    pub source_slots: Vec<AvailabilitySlot>,
    pub mode: RecurrenceMode,
}

impl RecurrenceRequest {
    /// The earliest source date. Weekday modes enumerate from here.
    pub fn anchor(&self) -> Option<NaiveDate> {
        self.source_slots.iter().map(|s| s.date).min()
    }

    /// The trainer-local dates new slots may land on, padded by a day on each
    /// side. Used to query the existing slots the expansion is validated against.
    pub fn target_window(&self, config: &EngineConfig) -> Result<Option<DateRange>> {
        let dates: Vec<NaiveDate> = self
            .targets(config)?
            .into_iter()
            .map(|(_, date)| date)
            .collect();
        let window = match (dates.iter().min(), dates.iter().max()) {
            (Some(&start), Some(&end)) => Some(DateRange::new(start, end).padded()),
            _ => None,
        };
        Ok(window)
    }

    /// (source index, target date) pairs, before any validation.
    fn targets(&self, config: &EngineConfig) -> Result<Vec<(usize, NaiveDate)>> {
        let Some(anchor) = self.anchor() else {
            return Ok(Vec::new());
        };

        let targets: Vec<(usize, NaiveDate)> = match self.mode {
            RecurrenceMode::NextWeek => self
                .source_slots
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.date.checked_add_days(chrono::Days::new(7)).map(|d| (i, d)))
                .collect(),
            RecurrenceMode::NextMonth => self
                .source_slots
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.date.checked_add_months(Months::new(1)).map(|d| (i, d)))
                .collect(),
            RecurrenceMode::DayOfWeekForMonths { weekday, months } => {
                let months = months.min(config.max_recurrence_months);
                let through = anchor
                    .checked_add_months(Months::new(months))
                    .unwrap_or(anchor);
                self.cross(weekday_dates(weekday, anchor, through)?)
            }
            RecurrenceMode::DayOfWeekForCurrentMonth { weekday } => {
                self.cross(weekday_dates(weekday, anchor, last_day_of_month(anchor))?)
            }
        };

        Ok(targets)
    }

    fn cross(&self, dates: Vec<NaiveDate>) -> Vec<(usize, NaiveDate)> {
        dates
            .into_iter()
            .flat_map(|date| (0..self.source_slots.len()).map(move |i| (i, date)))
            .collect()
    }
}

/// Why a recurrence instance was not produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Overlap { conflicting: SlotId },
    InvalidDuration { minutes: i64 },
    /// The local time falls in a DST gap and the policy is `Skip`.
    NonexistentLocalTime,
}

impl From<ValidationError> for SkipReason {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::Overlap { conflicting, .. } => SkipReason::Overlap { conflicting },
            ValidationError::InvalidDuration { minutes, .. } => {
                SkipReason::InvalidDuration { minutes }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedInstance {
    /// The template slot the instance was derived from.
    pub source: SlotId,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Result of expanding a recurrence request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expansion {
    /// Valid new slots, ordered by start time.
    pub slots: Vec<AvailabilitySlot>,
    pub skipped: Vec<SkippedInstance>,
    /// Source zones that could not be resolved (UTC was used).
    pub warnings: Vec<ConfigurationError>,
    /// New slot id to the template slot it was copied from.
    #[serde(skip)]
    pub(crate) origins: HashMap<SlotId, SlotId>,
}

impl Expansion {
    /// The template slot a new slot was copied from.
    pub fn origin_of(&self, id: &SlotId) -> Option<&SlotId> {
        self.origins.get(id)
    }
}

/// Expand `request` into new open slots, validated against `existing`.
///
/// `existing` should hold every slot of the trainer around the target dates,
/// including the source slots themselves.
///
/// # Errors
/// Returns `SchedulingError::Recurrence` if the weekday rule cannot be built.
pub fn expand(
    request: &RecurrenceRequest,
    existing: &[AvailabilitySlot],
    config: &EngineConfig,
) -> Result<Expansion> {
    let mut expansion = Expansion::default();
    let mut candidates = Vec::new();

    let zones: Vec<Tz> = request
        .source_slots
        .iter()
        .map(|s| {
            let resolved = timezone::resolve_zone(&s.owner_time_zone);
            if let Some(w) = resolved.warning {
                if !expansion.warnings.contains(&w) {
                    expansion.warnings.push(w);
                }
            }
            resolved.value
        })
        .collect();

    for (i, date) in request.targets(config)? {
        let source = &request.source_slots[i];
        match instance(source, date, zones[i], config.dst_policy) {
            Some(slot) => {
                expansion.origins.insert(slot.id.clone(), source.id.clone());
                candidates.push(slot);
            }
            None => expansion.skipped.push(SkippedInstance {
                source: source.id.clone(),
                date,
                reason: SkipReason::NonexistentLocalTime,
            }),
        }
    }

    candidates.sort_by_key(|s| s.start_time);

    let partition = validator::partition(candidates, existing, expansion_rule(config));
    for (slot, reason) in partition.rejected {
        expansion.skipped.push(SkippedInstance {
            source: expansion
                .origins
                .remove(&slot.id)
                .unwrap_or_else(|| slot.id.clone()),
            date: slot.date,
            reason: reason.into(),
        });
    }
    expansion.slots = partition.accepted;

    tracing::debug!(
        mode = ?request.mode,
        created = expansion.slots.len(),
        skipped = expansion.skipped.len(),
        "expanded recurrence"
    );

    Ok(expansion)
}

/// Copies keep their source's duration, which may be a clipped final slot of a
/// generated window, so they are held to the bucket rule.
pub(crate) fn expansion_rule(config: &EngineConfig) -> DurationRule<'static> {
    let longest = config
        .allowed_durations_minutes
        .iter()
        .copied()
        .max()
        .unwrap_or(config.range_bucket_minutes);
    DurationRule::Range {
        bucket_minutes: config.range_bucket_minutes.max(longest),
    }
}

/// Rebuild `source` on `date` at the same trainer-local times.
fn instance(
    source: &AvailabilitySlot,
    date: NaiveDate,
    tz: Tz,
    policy: DstPolicy,
) -> Option<AvailabilitySlot> {
    let local_start = local_in(source.start_time, tz);
    let local_end = local_in(source.end_time, tz);
    let spill_days = (local_end.date() - local_start.date()).num_days();
    let end_date = date.checked_add_signed(chrono::Duration::days(spill_days))?;

    let start_time = timezone::combine_in(date, local_start.time(), tz, policy)?;
    let end_time = timezone::combine_in(end_date, local_end.time(), tz, policy)?;

    Some(AvailabilitySlot {
        id: SlotId::new(),
        trainer_id: source.trainer_id.clone(),
        start_time,
        end_time,
        date,
        status: SlotStatus::Open,
        package_id: None,
        meeting_id: None,
        owner_time_zone: source.owner_time_zone.clone(),
    })
}

/// Every `weekday` strictly after `after`, up to and including `through`.
fn weekday_dates(weekday: Weekday, after: NaiveDate, through: NaiveDate) -> Result<Vec<NaiveDate>> {
    let Some(first) = after.succ_opt() else {
        return Ok(Vec::new());
    };
    if first > through {
        return Ok(Vec::new());
    }

    // The rrule crate requires UNTIL in UTC ("Z") when DTSTART is in UTC.
    let rrule_text = format!(
        "DTSTART;TZID=UTC:{}T000000\nRRULE:FREQ=WEEKLY;BYDAY={};UNTIL={}T000000Z",
        first.format("%Y%m%d"),
        byday(weekday),
        through.format("%Y%m%d"),
    );

    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| SchedulingError::Recurrence(format!("{}", e)))?;

    // One instance per week, plus the partial week at either end.
    let weeks = (through - first).num_weeks() + 2;
    let limit = u16::try_from(weeks).unwrap_or(u16::MAX);
    let instances = rrule_set.all(limit);
    if instances.limited {
        tracing::warn!(%weekday, %through, "weekday expansion truncated");
    }

    Ok(instances
        .dates
        .into_iter()
        .map(|dt| dt.date_naive())
        .filter(|d| d.weekday() == weekday && *d > after && *d <= through)
        .collect())
}

fn byday(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}
