//! Read-side cache of a trainer's slots, fed by store change notifications.
//!
//! Every notification is the complete slot set and replaces the cache
//! wholesale; there are no incremental patches.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use chrono::NaiveDate;

use crate::grouper::{self, SlotGroup};
use crate::slot::AvailabilitySlot;
use crate::store::{AvailabilityStore, StoreResult};

pub struct LiveSchedule {
    trainer_id: String,
    slots: Vec<AvailabilitySlot>,
    updates: Receiver<Vec<AvailabilitySlot>>,
    disconnected: bool,
}

impl LiveSchedule {
    pub fn subscribe(store: &dyn AvailabilityStore, trainer_id: &str) -> StoreResult<Self> {
        let updates = store.subscribe(trainer_id)?;
        let mut schedule = Self {
            trainer_id: trainer_id.to_string(),
            slots: Vec::new(),
            updates,
            disconnected: false,
        };
        schedule.refresh();
        Ok(schedule)
    }

    /// Apply every pending notification; only the newest matters. Returns how
    /// many were received.
    pub fn refresh(&mut self) -> usize {
        let mut received = 0;
        loop {
            match self.updates.try_recv() {
                Ok(snapshot) => {
                    self.replace_all(snapshot);
                    received += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        received
    }

    /// Block up to `timeout` for the next notification, then drain the rest.
    pub fn wait_for_update(&mut self, timeout: Duration) -> bool {
        match self.updates.recv_timeout(timeout) {
            Ok(snapshot) => {
                self.replace_all(snapshot);
                self.refresh();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.disconnected = true;
                false
            }
        }
    }

    pub fn replace_all(&mut self, snapshot: Vec<AvailabilitySlot>) {
        self.slots = snapshot;
    }

    pub fn slots(&self) -> &[AvailabilitySlot] {
        &self.slots
    }

    /// Current runs for one day of this trainer.
    pub fn groups(&self, date: NaiveDate) -> Vec<SlotGroup> {
        grouper::group_day(&self.slots, &self.trainer_id, date)
    }

    /// The store side of the subscription has gone away.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}
