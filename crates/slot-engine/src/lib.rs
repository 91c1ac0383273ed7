//! # slot-engine
//!
//! Trainer availability and scheduling engine.
//!
//! The engine creates, validates, groups, repeats and books a trainer's
//! bookable time slots. It reconciles the trainer's local wall-clock intent
//! ("free 9 to 5 on Tuesdays") with each viewer's time zone, prevents
//! double-booking, and keeps recurring slots at the same local time across DST
//! transitions. Persistence is injected through [`store::AvailabilityStore`].
//!
//! ## Modules
//!
//! - [`slot`]: `AvailabilitySlot`, ids, status, date ranges
//! - [`timezone`]: instant ↔ trainer/viewer wall-clock conversion
//! - [`dst`]: DST gap policies
//! - [`proposal`]: trainer intent → slots, window splitting
//! - [`validator`]: duration and non-overlap checks
//! - [`expander`]: recurrence expansion (next week, next month, weekdays)
//! - [`grouper`]: contiguous same-status runs for display and bulk actions
//! - [`store`]: persistence boundary and the in-memory adapter
//! - [`ports`]: notification, meeting and profile collaborators
//! - [`lifecycle`]: open → booked → released transitions
//! - [`facade`]: orchestration entry point
//! - [`feed`]: live slot set from store notifications
//! - [`config`]: engine tunables
//! - [`error`]: error types

pub mod config;
pub mod dst;
pub mod error;
pub mod expander;
pub mod facade;
pub mod feed;
pub mod grouper;
pub mod lifecycle;
pub mod ports;
pub mod proposal;
pub mod slot;
pub mod store;
pub mod timezone;
pub mod validator;

pub use config::EngineConfig;
pub use dst::DstPolicy;
pub use error::{
    ConfigurationError, LifecycleError, SchedulingError, StoreError, ValidationError,
};
pub use expander::{expand, Expansion, RecurrenceMode, RecurrenceRequest, SkipReason};
pub use facade::{BatchReport, RecurrencePlan, SchedulingFacade};
pub use grouper::{group, SlotGroup};
pub use lifecycle::{BookingLifecycleManager, BookingRequest, GroupDeletion, MeetingRef};
pub use proposal::{RangeProposal, SlotProposal};
pub use slot::{AvailabilitySlot, DateRange, SlotId, SlotStatus};
pub use store::{AvailabilityStore, InMemoryStore};
pub use validator::{validate, Candidate, DurationRule};
