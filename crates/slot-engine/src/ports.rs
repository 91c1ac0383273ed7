//! External collaborators the engine calls but does not implement.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::slot::AvailabilitySlot;

/// Failure reported by a collaborator. Side-effect failures are logged and never
/// change the outcome of the operation that triggered them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{collaborator} failed: {message}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

/// Push-notification dispatch.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        user_id: &str,
        message: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), CollaboratorError>;
}

/// Creates and cancels the meeting record attached to a booked slot.
pub trait MeetingScheduler: Send + Sync {
    /// Returns the new meeting's id.
    fn create_meeting(
        &self,
        slot: &AvailabilitySlot,
        client_id: &str,
    ) -> Result<String, CollaboratorError>;

    fn cancel_meeting(&self, meeting_id: &str) -> Result<(), CollaboratorError>;
}

/// Looks up a participant's IANA time zone.
pub trait ProfileDirectory: Send + Sync {
    fn time_zone(&self, user_id: &str) -> Option<String>;
}

/// Notifier that only logs. Useful where no push channel exists (CLI, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(
        &self,
        user_id: &str,
        message: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        tracing::info!(user_id, message, %metadata, "notification");
        Ok(())
    }
}

/// Meeting scheduler that mints local ids instead of calling a video provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalMeetings;

impl MeetingScheduler for LocalMeetings {
    fn create_meeting(
        &self,
        _slot: &AvailabilitySlot,
        _client_id: &str,
    ) -> Result<String, CollaboratorError> {
        Ok(format!("meeting-{}", Uuid::new_v4()))
    }

    fn cancel_meeting(&self, _meeting_id: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Fixed user → zone table.
#[derive(Debug, Default, Clone)]
pub struct StaticProfiles {
    zones: HashMap<String, String>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, user_id: impl Into<String>, zone: impl Into<String>) -> Self {
        self.zones.insert(user_id.into(), zone.into());
        self
    }
}

impl ProfileDirectory for StaticProfiles {
    fn time_zone(&self, user_id: &str) -> Option<String> {
        self.zones.get(user_id).cloned()
    }
}
