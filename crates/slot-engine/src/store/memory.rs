//! In-process reference adapter for [`AvailabilityStore`].
//!
//! Backs the CLI and the test suites. Supports fault injection so partial
//! batch failures and outages can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{AvailabilityStore, StatusUpdate, StoreResult, WriteOutcome};
use crate::error::StoreError;
use crate::slot::{AvailabilitySlot, DateRange, SlotId, SlotStatus};

#[derive(Default)]
struct Inner {
    slots: HashMap<SlotId, AvailabilitySlot>,
    subscribers: Vec<(String, Sender<Vec<AvailabilitySlot>>)>,
    failing: HashSet<SlotId>,
    offline: bool,
}

impl Inner {
    fn trainer_slots(&self, trainer_id: &str) -> Vec<AvailabilitySlot> {
        let mut slots: Vec<AvailabilitySlot> = self
            .slots
            .values()
            .filter(|s| s.trainer_id == trainer_id)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start_time);
        slots
    }

    fn publish(&mut self, trainers: &HashSet<String>) {
        let snapshots: HashMap<&String, Vec<AvailabilitySlot>> = trainers
            .iter()
            .map(|t| (t, self.trainer_slots(t)))
            .collect();
        // Drop subscribers whose receiver is gone.
        self.subscribers
            .retain(|subscriber| match snapshots.get(&subscriber.0) {
                Some(snapshot) => subscriber.1.send(snapshot.clone()).is_ok(),
                None => true,
            });
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline {
            Err(StoreError::Unavailable("store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `slots`.
    pub fn from_slots(slots: impl IntoIterator<Item = AvailabilitySlot>) -> Self {
        let store = Self::new();
        store
            .inner
            .lock()
            .slots
            .extend(slots.into_iter().map(|s| (s.id.clone(), s)));
        store
    }

    /// Every slot in the store, ordered by start time.
    pub fn snapshot(&self) -> Vec<AvailabilitySlot> {
        let mut slots: Vec<AvailabilitySlot> = self.inner.lock().slots.values().cloned().collect();
        slots.sort_by_key(|s| s.start_time);
        slots
    }

    /// Make every subsequent call fail with `Unavailable` until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Make writes touching `id` fail with `Unavailable`.
    pub fn fail_writes_for(&self, id: SlotId) {
        self.inner.lock().failing.insert(id);
    }
}

impl AvailabilityStore for InMemoryStore {
    fn get(&self, id: &SlotId) -> StoreResult<Option<AvailabilitySlot>> {
        let inner = self.inner.lock();
        inner.check_online()?;
        Ok(inner.slots.get(id).cloned())
    }

    fn query(&self, trainer_id: &str, range: DateRange) -> StoreResult<Vec<AvailabilitySlot>> {
        let inner = self.inner.lock();
        inner.check_online()?;
        Ok(inner
            .trainer_slots(trainer_id)
            .into_iter()
            .filter(|s| range.contains(s.date))
            .collect())
    }

    fn create_many(&self, slots: &[AvailabilitySlot]) -> WriteOutcome {
        let mut inner = self.inner.lock();
        if let Err(e) = inner.check_online() {
            return WriteOutcome::all_failed(slots.iter().map(|s| s.id.clone()), e);
        }

        let mut outcome = WriteOutcome::default();
        let mut touched = HashSet::new();
        for slot in slots {
            if inner.failing.contains(&slot.id) {
                outcome.failed.push((
                    slot.id.clone(),
                    StoreError::Unavailable(format!("write of {} rejected", slot.id)),
                ));
                continue;
            }
            inner
                .slots
                .entry(slot.id.clone())
                .or_insert_with(|| slot.clone());
            touched.insert(slot.trainer_id.clone());
            outcome.completed.push(slot.id.clone());
        }

        inner.publish(&touched);
        outcome
    }

    fn update_status(&self, id: &SlotId, update: &StatusUpdate) -> StoreResult<AvailabilitySlot> {
        let mut inner = self.inner.lock();
        inner.check_online()?;
        if inner.failing.contains(id) {
            return Err(StoreError::Unavailable(format!("write of {} rejected", id)));
        }

        let slot = inner
            .slots
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if slot.status != update.expected {
            return Err(StoreError::PreconditionFailed {
                expected: update.expected,
                current: slot.status,
            });
        }
        slot.status = update.status;
        slot.package_id = update.package_id.clone();
        slot.meeting_id = update.meeting_id.clone();
        let updated = slot.clone();

        inner.publish(&HashSet::from([updated.trainer_id.clone()]));
        Ok(updated)
    }

    fn update_times(
        &self,
        id: &SlotId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        expected: SlotStatus,
    ) -> StoreResult<AvailabilitySlot> {
        let mut inner = self.inner.lock();
        inner.check_online()?;

        let slot = inner
            .slots
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if slot.status != expected {
            return Err(StoreError::PreconditionFailed {
                expected,
                current: slot.status,
            });
        }
        slot.start_time = start_time;
        slot.end_time = end_time;
        let updated = slot.clone();

        inner.publish(&HashSet::from([updated.trainer_id.clone()]));
        Ok(updated)
    }

    fn delete_many(&self, ids: &[SlotId]) -> WriteOutcome {
        let mut inner = self.inner.lock();
        if let Err(e) = inner.check_online() {
            return WriteOutcome::all_failed(ids.iter().cloned(), e);
        }

        let mut outcome = WriteOutcome::default();
        let mut touched = HashSet::new();
        for id in ids {
            if inner.failing.contains(id) {
                outcome.failed.push((
                    id.clone(),
                    StoreError::Unavailable(format!("delete of {} rejected", id)),
                ));
                continue;
            }
            match inner.slots.remove(id) {
                Some(slot) => {
                    touched.insert(slot.trainer_id);
                    outcome.completed.push(id.clone());
                }
                None => outcome.failed.push((id.clone(), StoreError::NotFound(id.clone()))),
            }
        }

        inner.publish(&touched);
        outcome
    }

    fn subscribe(&self, trainer_id: &str) -> StoreResult<Receiver<Vec<AvailabilitySlot>>> {
        let mut inner = self.inner.lock();
        inner.check_online()?;
        let (tx, rx) = mpsc::channel();
        // Prime with the current set.
        tx.send(inner.trainer_slots(trainer_id))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        inner.subscribers.push((trainer_id.to_string(), tx));
        Ok(rx)
    }
}
