//! Orchestration entry point for screens and controllers.
//!
//! Each operation runs in a fixed order: validate, expand (recurrence only),
//! persist, notify. Errors come back as [`SchedulingError`], whose variants
//! separate invalid requests from store failures. Batch operations return a
//! [`BatchReport`] describing exactly what was created, skipped and lost.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{ConfigurationError, LifecycleError, Result, SchedulingError, StoreError};
use crate::expander::{self, Expansion, RecurrenceMode, RecurrenceRequest, SkippedInstance};
use crate::feed::LiveSchedule;
use crate::grouper::{self, SlotGroup};
use crate::lifecycle::{BookingLifecycleManager, BookingRequest, GroupDeletion};
use crate::ports::{MeetingScheduler, Notifier, ProfileDirectory};
use crate::proposal::{self, RangeProposal, SlotProposal};
use crate::slot::{AvailabilitySlot, DateRange, SlotId, SlotStatus};
use crate::store::{AvailabilityStore, WriteOutcome};
use crate::timezone::{self, DisplaySlot, Resolved};
use crate::validator::{self, Candidate, DurationRule};

/// Outcome of a batch creation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub created: Vec<AvailabilitySlot>,
    pub skipped: Vec<SkippedInstance>,
    /// Writes the store rejected. Writes not listed here completed and are not
    /// rolled back.
    pub failed_writes: Vec<SlotId>,
    pub warnings: Vec<ConfigurationError>,
}

impl BatchReport {
    pub fn requested(&self) -> usize {
        self.created.len() + self.skipped.len() + self.failed_writes.len()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed_writes.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} slots created", self.created.len(), self.requested())?;
        if !self.skipped.is_empty() {
            write!(f, "; {} skipped due to conflicts", self.skipped.len())?;
        }
        if !self.failed_writes.is_empty() {
            write!(f, "; {} could not be saved", self.failed_writes.len())?;
        }
        Ok(())
    }
}

/// An expanded recurrence that has not been persisted. Dropping it abandons the
/// request at no cost.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePlan {
    pub mode: RecurrenceMode,
    pub expansion: Expansion,
}

pub struct SchedulingFacade {
    store: Arc<dyn AvailabilityStore>,
    lifecycle: BookingLifecycleManager,
    profiles: Arc<dyn ProfileDirectory>,
    config: EngineConfig,
}

impl SchedulingFacade {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        meetings: Arc<dyn MeetingScheduler>,
        notifier: Arc<dyn Notifier>,
        profiles: Arc<dyn ProfileDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            lifecycle: BookingLifecycleManager::new(store.clone(), meetings, notifier),
            store,
            profiles,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create one open slot from trainer-local intent.
    ///
    /// # Errors
    /// `InvalidDuration` unless the slot lasts an allowed duration, `Overlap`
    /// with the conflicting slot id, or a store failure.
    pub fn propose_availability(&self, proposal: &SlotProposal) -> Result<Resolved<AvailabilitySlot>> {
        let resolved = proposal.to_slot();
        let slot = &resolved.value;

        let existing = self
            .store
            .query(&slot.trainer_id, DateRange::single(slot.date).padded())?;
        validator::validate(
            Candidate::Single(slot),
            &existing,
            DurationRule::exact(&self.config),
        )?;

        let outcome = self.store.create_many(std::slice::from_ref(slot));
        if let Some((_, e)) = outcome.failed.into_iter().next() {
            return Err(e.into());
        }

        tracing::info!(slot_id = %slot.id, trainer_id = %slot.trainer_id, "availability created");
        Ok(resolved)
    }

    /// Split a local window into bucket-sized slots and create them together.
    /// Validation is all-or-nothing; persistence is reported per slot.
    pub fn propose_range(&self, proposal: &RangeProposal) -> Result<BatchReport> {
        let resolved = proposal::generate_range(proposal, self.config.range_bucket_minutes);
        let slots = resolved.value;
        let Some(first) = slots.first() else {
            return Ok(BatchReport::default());
        };

        let span = DateRange::new(first.date, slots.last().map_or(first.date, |s| s.date));
        let existing = self.store.query(&proposal.trainer_id, span.padded())?;
        validator::validate(
            Candidate::Batch(&slots),
            &existing,
            DurationRule::range(&self.config),
        )?;

        let outcome = self.store.create_many(&slots);
        let mut report = persisted(slots, outcome)?;
        report.warnings.extend(resolved.warning);

        tracing::info!(trainer_id = %proposal.trainer_id, %report, "window proposed");
        Ok(report)
    }

    /// Expand a recurrence request without persisting anything.
    pub fn plan_recurrence(&self, request: &RecurrenceRequest) -> Result<RecurrencePlan> {
        let mut existing = Vec::new();
        if let Some(window) = request.target_window(&self.config)? {
            let trainers: BTreeSet<&str> = request
                .source_slots
                .iter()
                .map(|s| s.trainer_id.as_str())
                .collect();
            for trainer_id in trainers {
                existing.extend(self.store.query(trainer_id, window)?);
            }
        }

        let expansion = expander::expand(request, &existing, &self.config)?;
        Ok(RecurrencePlan {
            mode: request.mode,
            expansion,
        })
    }

    /// Persist a plan. The plan is re-checked against the store first, so slots
    /// created since it was drawn up are not overlapped; instances that now
    /// conflict are reported as skipped. Writes already issued are never rolled
    /// back; the report lists the ones that failed.
    ///
    /// # Errors
    /// A store failure while re-reading the target dates, or if not a single
    /// write landed.
    pub fn commit_plan(&self, plan: RecurrencePlan) -> Result<BatchReport> {
        let Expansion {
            slots,
            mut skipped,
            warnings,
            origins,
        } = plan.expansion;

        let existing = self.occupying(&slots)?;
        let recheck = validator::partition(slots, &existing, expander::expansion_rule(&self.config));
        for (slot, reason) in recheck.rejected {
            tracing::debug!(slot_id = %slot.id, %reason, "planned slot no longer fits");
            skipped.push(SkippedInstance {
                source: origins.get(&slot.id).cloned().unwrap_or(slot.id),
                date: slot.date,
                reason: reason.into(),
            });
        }
        let slots = recheck.accepted;

        let mut report = if slots.is_empty() {
            BatchReport::default()
        } else {
            let outcome = self.store.create_many(&slots);
            persisted(slots, outcome)?
        };
        report.skipped = skipped;
        report.warnings = warnings;

        tracing::info!(mode = ?plan.mode, %report, "recurrence committed");
        Ok(report)
    }

    pub fn propose_recurrence(&self, request: &RecurrenceRequest) -> Result<BatchReport> {
        let plan = self.plan_recurrence(request)?;
        self.commit_plan(plan)
    }

    /// Repeat a whole run of slots ("repeat this run").
    pub fn repeat_run(&self, group: &SlotGroup, mode: RecurrenceMode) -> Result<BatchReport> {
        self.propose_recurrence(&RecurrenceRequest {
            source_slots: group.slots.clone(),
            mode,
        })
    }

    pub fn book_slot(&self, id: &SlotId, request: &BookingRequest) -> Result<AvailabilitySlot> {
        self.lifecycle.book(id, request)
    }

    pub fn release_slot(&self, id: &SlotId) -> Result<AvailabilitySlot> {
        self.lifecycle.release(id)
    }

    /// Delete a run ("delete this run"). Booked slots need `cascade`.
    pub fn delete_run(&self, group: &SlotGroup, cascade: bool) -> Result<GroupDeletion> {
        self.lifecycle.delete_group(group, cascade)
    }

    pub fn delete_slot(&self, id: &SlotId, cascade: bool) -> Result<GroupDeletion> {
        let slot = self
            .store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))?;
        self.lifecycle
            .delete_group(&SlotGroup { slots: vec![slot] }, cascade)
    }

    /// Move an open slot to new local times on its filed date. The slot is
    /// re-validated against everything except itself.
    pub fn reschedule_slot(
        &self,
        id: &SlotId,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<AvailabilitySlot> {
        let slot = self
            .store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))?;
        match slot.status {
            SlotStatus::Open => {}
            SlotStatus::Booked => return Err(LifecycleError::AlreadyBooked(id.clone()).into()),
            SlotStatus::Released => return Err(LifecycleError::SlotReleased(id.clone()).into()),
        }

        let moved = SlotProposal {
            trainer_id: slot.trainer_id.clone(),
            date: slot.date,
            start,
            end,
            time_zone: slot.owner_time_zone.clone(),
        }
        .to_slot()
        .into_value();
        let candidate = AvailabilitySlot {
            start_time: moved.start_time,
            end_time: moved.end_time,
            ..slot
        };

        let existing = self
            .store
            .query(&candidate.trainer_id, DateRange::single(candidate.date).padded())?;
        validator::validate(
            Candidate::Single(&candidate),
            &existing,
            DurationRule::exact(&self.config),
        )?;

        self.store
            .update_times(id, candidate.start_time, candidate.end_time, SlotStatus::Open)
            .map_err(|e| match e {
                StoreError::PreconditionFailed { .. } => {
                    SchedulingError::from(LifecycleError::AlreadyBooked(id.clone()))
                }
                other => other.into(),
            })
    }

    /// The trainer's runs for one day.
    pub fn day_groups(&self, trainer_id: &str, date: NaiveDate) -> Result<Vec<SlotGroup>> {
        let slots = self.store.query(trainer_id, DateRange::single(date))?;
        Ok(grouper::group_day(&slots, trainer_id, date))
    }

    /// A trainer's day as seen by `viewer_id`, in the viewer's profile zone.
    pub fn viewer_schedule(
        &self,
        trainer_id: &str,
        date: NaiveDate,
        viewer_id: &str,
    ) -> Result<Resolved<Vec<DisplaySlot>>> {
        let zone = self
            .profiles
            .time_zone(viewer_id)
            .unwrap_or_else(|| self.config.default_time_zone.clone());
        let slots = self.store.query(trainer_id, DateRange::single(date))?;

        let mut warning = None;
        let rendered: Vec<DisplaySlot> = slots
            .iter()
            .map(|slot| {
                let shown = timezone::display(slot, &zone);
                warning = warning.take().or(shown.warning);
                shown.value
            })
            .collect();

        Ok(Resolved {
            value: rendered,
            warning,
        })
    }

    pub fn live_schedule(&self, trainer_id: &str) -> Result<LiveSchedule> {
        Ok(LiveSchedule::subscribe(self.store.as_ref(), trainer_id)?)
    }

    /// Stored slots of every trainer in `slots`, around the dates they fall on.
    fn occupying(&self, slots: &[AvailabilitySlot]) -> Result<Vec<AvailabilitySlot>> {
        let mut spans: BTreeMap<&str, DateRange> = BTreeMap::new();
        for slot in slots {
            spans
                .entry(slot.trainer_id.as_str())
                .and_modify(|span| *span = span.including(slot.date))
                .or_insert_with(|| DateRange::single(slot.date));
        }

        let mut existing = Vec::new();
        for (trainer_id, span) in spans {
            existing.extend(self.store.query(trainer_id, span.padded())?);
        }
        Ok(existing)
    }
}

/// Fold a write outcome into a report, or a store failure if nothing landed.
fn persisted(slots: Vec<AvailabilitySlot>, outcome: WriteOutcome) -> Result<BatchReport> {
    if outcome.completed.is_empty() {
        if let Some((_, e)) = outcome.failed.first() {
            return Err(e.clone().into());
        }
    }

    let failed_writes: Vec<SlotId> = outcome.failed.into_iter().map(|(id, _)| id).collect();
    let created = slots
        .into_iter()
        .filter(|s| !failed_writes.contains(&s.id))
        .collect();

    Ok(BatchReport {
        created,
        failed_writes,
        ..BatchReport::default()
    })
}
