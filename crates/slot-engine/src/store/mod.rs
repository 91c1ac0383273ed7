//! The persistence boundary.
//!
//! The engine is storage-agnostic: a document-store adapter implements
//! [`AvailabilityStore`] and is injected into the lifecycle manager and the
//! facade. Timeouts and transport retries are the adapter's business; any
//! failure it reports surfaces to callers as a store failure.

mod memory;

use std::sync::mpsc::Receiver;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::slot::{AvailabilitySlot, DateRange, SlotId, SlotStatus};

pub use memory::InMemoryStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A conditional status write: applies only if the slot's current status is
/// `expected`. This compare-and-swap is what serializes concurrent bookings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub expected: SlotStatus,
    pub status: SlotStatus,
    pub package_id: Option<String>,
    pub meeting_id: Option<String>,
}

/// Per-document outcome of a non-atomic batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome {
    pub completed: Vec<SlotId>,
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<(SlotId, StoreError)>,
}

impl WriteOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Every id failed with the same error, e.g. when the store is unreachable.
    pub fn all_failed(ids: impl IntoIterator<Item = SlotId>, error: StoreError) -> Self {
        Self {
            completed: Vec::new(),
            failed: ids.into_iter().map(|id| (id, error.clone())).collect(),
        }
    }
}

fn serialize_failures<S>(failed: &[(SlotId, StoreError)], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut seq = s.serialize_seq(Some(failed.len()))?;
    for (id, error) in failed {
        seq.serialize_element(&serde_json::json!({ "id": id, "error": error.to_string() }))?;
    }
    seq.end()
}

pub trait AvailabilityStore: Send + Sync {
    fn get(&self, id: &SlotId) -> StoreResult<Option<AvailabilitySlot>>;

    /// Slots of `trainer_id` whose `date` falls in `range`.
    fn query(&self, trainer_id: &str, range: DateRange) -> StoreResult<Vec<AvailabilitySlot>>;

    /// Create documents. Not atomic: the outcome lists which writes landed.
    /// Re-submitting a slot whose id already exists is a no-op success.
    fn create_many(&self, slots: &[AvailabilitySlot]) -> WriteOutcome;

    /// Conditional status write; fails with `PreconditionFailed` if the slot's
    /// status is no longer `update.expected`.
    fn update_status(&self, id: &SlotId, update: &StatusUpdate) -> StoreResult<AvailabilitySlot>;

    /// Conditional time edit, guarded like [`AvailabilityStore::update_status`].
    fn update_times(
        &self,
        id: &SlotId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        expected: SlotStatus,
    ) -> StoreResult<AvailabilitySlot>;

    fn delete_many(&self, ids: &[SlotId]) -> WriteOutcome;

    /// Live slot set for a trainer. Every message is the complete current set,
    /// never a delta.
    fn subscribe(&self, trainer_id: &str) -> StoreResult<Receiver<Vec<AvailabilitySlot>>>;
}
