//! Booking state transitions: `Open -> Booked -> Released`.
//!
//! A released slot is never reopened in place; making the time bookable again
//! means creating a new open slot. Booking relies on the store's conditional
//! write, so of two concurrent attempts on one slot exactly one succeeds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{LifecycleError, Result, SchedulingError, StoreError};
use crate::grouper::SlotGroup;
use crate::ports::{MeetingScheduler, Notifier};
use crate::slot::{AvailabilitySlot, SlotId, SlotStatus};
use crate::store::{AvailabilityStore, StatusUpdate};

/// Which meeting a booking is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeetingRef {
    /// A meeting the caller already scheduled.
    Existing { meeting_id: String },
    /// Ask the meeting scheduler to create one.
    Schedule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub package_id: String,
    pub client_id: String,
    pub meeting: MeetingRef,
}

/// Outcome of deleting a slot group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupDeletion {
    Deleted(Vec<SlotId>),
    PartialFailure {
        deleted: Vec<SlotId>,
        failed: Vec<(SlotId, SchedulingError)>,
    },
}

impl GroupDeletion {
    pub fn deleted(&self) -> &[SlotId] {
        match self {
            GroupDeletion::Deleted(ids) => ids,
            GroupDeletion::PartialFailure { deleted, .. } => deleted,
        }
    }

    pub fn failed(&self) -> &[(SlotId, SchedulingError)] {
        match self {
            GroupDeletion::Deleted(_) => &[],
            GroupDeletion::PartialFailure { failed, .. } => failed,
        }
    }
}

pub struct BookingLifecycleManager {
    store: Arc<dyn AvailabilityStore>,
    meetings: Arc<dyn MeetingScheduler>,
    notifier: Arc<dyn Notifier>,
}

impl BookingLifecycleManager {
    pub fn new(
        store: Arc<dyn AvailabilityStore>,
        meetings: Arc<dyn MeetingScheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            meetings,
            notifier,
        }
    }

    /// Book an open slot.
    ///
    /// The meeting is resolved first so the single conditional write carries
    /// both the package and the meeting id; a booked slot is never observable
    /// without its meeting. If the write loses a race, a meeting created for
    /// this attempt is cancelled again.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyBooked`, `SlotReleased`, a collaborator error if the
    /// meeting cannot be created, or a store failure.
    pub fn book(&self, id: &SlotId, request: &BookingRequest) -> Result<AvailabilitySlot> {
        let slot = self
            .store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))?;
        ensure_bookable(&slot)?;

        let (meeting_id, created) = match &request.meeting {
            MeetingRef::Existing { meeting_id } => (meeting_id.clone(), false),
            MeetingRef::Schedule => (
                self.meetings.create_meeting(&slot, &request.client_id)?,
                true,
            ),
        };

        let update = StatusUpdate {
            expected: SlotStatus::Open,
            status: SlotStatus::Booked,
            package_id: Some(request.package_id.clone()),
            meeting_id: Some(meeting_id.clone()),
        };

        match self.store.update_status(id, &update) {
            Ok(booked) => {
                tracing::info!(slot_id = %id, trainer_id = %booked.trainer_id, "slot booked");
                self.announce_booking(&booked, request);
                Ok(booked)
            }
            Err(e) => {
                if created {
                    self.cancel_meeting(&meeting_id);
                }
                Err(lifecycle_error(id, e))
            }
        }
    }

    /// Release a booked slot: status becomes `Released`, package and meeting
    /// links are cleared, and the meeting is cancelled.
    pub fn release(&self, id: &SlotId) -> Result<AvailabilitySlot> {
        let slot = self
            .store
            .get(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))?;
        if slot.status != SlotStatus::Booked {
            return Err(LifecycleError::NotBooked(id.clone()).into());
        }

        let update = StatusUpdate {
            expected: SlotStatus::Booked,
            status: SlotStatus::Released,
            package_id: None,
            meeting_id: None,
        };
        let released = self
            .store
            .update_status(id, &update)
            .map_err(|e| match e {
                StoreError::PreconditionFailed { .. } => {
                    SchedulingError::from(LifecycleError::NotBooked(id.clone()))
                }
                other => lifecycle_error(id, other),
            })?;

        if let Some(meeting_id) = &slot.meeting_id {
            self.cancel_meeting(meeting_id);
        }
        tracing::info!(slot_id = %id, "slot released");
        Ok(released)
    }

    /// Delete every slot of `group`.
    ///
    /// Each slot is re-read first, since the group may be stale. Booked slots are
    /// refused unless `cascade` is set; with `cascade`, once a booked slot is
    /// actually deleted its meeting is cancelled and the trainer notified.
    ///
    /// # Errors
    /// A store failure while re-reading the group, before anything is deleted.
    /// Failures of the delete writes themselves are reported per slot.
    pub fn delete_group(&self, group: &SlotGroup, cascade: bool) -> Result<GroupDeletion> {
        let mut failed: Vec<(SlotId, SchedulingError)> = Vec::new();
        let mut deletable: Vec<SlotId> = Vec::new();
        let mut cancellations: Vec<AvailabilitySlot> = Vec::new();

        for id in group.ids() {
            match self.store.get(&id)? {
                None => failed.push((id.clone(), LifecycleError::NotFound(id).into())),
                Some(slot) if slot.status == SlotStatus::Booked && !cascade => {
                    failed.push((id.clone(), LifecycleError::BookedSlotInGroup(id).into()));
                }
                Some(slot) => {
                    if slot.status == SlotStatus::Booked {
                        cancellations.push(slot);
                    }
                    deletable.push(id);
                }
            }
        }

        let outcome = if deletable.is_empty() {
            Default::default()
        } else {
            self.store.delete_many(&deletable)
        };

        // A booked slot whose delete failed keeps its meeting.
        for slot in cancellations
            .iter()
            .filter(|s| outcome.completed.contains(&s.id))
        {
            if let Some(meeting_id) = &slot.meeting_id {
                self.cancel_meeting(meeting_id);
            }
            self.send(
                &slot.trainer_id,
                "A booked session was cancelled",
                &json!({ "slotId": slot.id, "start": slot.start_time, "packageId": slot.package_id }),
            );
        }

        failed.extend(
            outcome
                .failed
                .into_iter()
                .map(|(id, e)| (id, SchedulingError::from(e))),
        );

        tracing::info!(
            deleted = outcome.completed.len(),
            failed = failed.len(),
            "deleted slot group"
        );

        Ok(if failed.is_empty() {
            GroupDeletion::Deleted(outcome.completed)
        } else {
            GroupDeletion::PartialFailure {
                deleted: outcome.completed,
                failed,
            }
        })
    }

    fn announce_booking(&self, slot: &AvailabilitySlot, request: &BookingRequest) {
        let metadata = json!({
            "slotId": slot.id,
            "start": slot.start_time,
            "end": slot.end_time,
            "packageId": slot.package_id,
            "meetingId": slot.meeting_id,
        });
        self.send(&slot.trainer_id, "New session booked", &metadata);
        self.send(&request.client_id, "Your session is confirmed", &metadata);
    }

    fn send(&self, user_id: &str, message: &str, metadata: &serde_json::Value) {
        if let Err(e) = self.notifier.notify(user_id, message, metadata) {
            tracing::warn!(user_id, error = %e, "notification failed");
        }
    }

    fn cancel_meeting(&self, meeting_id: &str) {
        if let Err(e) = self.meetings.cancel_meeting(meeting_id) {
            tracing::warn!(meeting_id, error = %e, "meeting cancellation failed");
        }
    }
}

fn ensure_bookable(slot: &AvailabilitySlot) -> Result<()> {
    match slot.status {
        SlotStatus::Open => Ok(()),
        SlotStatus::Booked => Err(LifecycleError::AlreadyBooked(slot.id.clone()).into()),
        SlotStatus::Released => Err(LifecycleError::SlotReleased(slot.id.clone()).into()),
    }
}

/// Map a failed conditional booking write onto the lifecycle taxonomy.
fn lifecycle_error(id: &SlotId, e: StoreError) -> SchedulingError {
    match e {
        StoreError::PreconditionFailed {
            current: SlotStatus::Released,
            ..
        } => LifecycleError::SlotReleased(id.clone()).into(),
        StoreError::PreconditionFailed { .. } => LifecycleError::AlreadyBooked(id.clone()).into(),
        StoreError::NotFound(_) => LifecycleError::NotFound(id.clone()).into(),
        other => other.into(),
    }
}
