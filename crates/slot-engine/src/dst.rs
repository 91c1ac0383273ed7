//! DST transition policies for recombining trainer-local wall-clock times.

use serde::{Deserialize, Serialize};

/// Policy for a local time that does not exist because of a spring-forward gap
/// (e.g. 02:30 on the US transition date). Ambiguous fall-back times always
/// resolve to the earlier instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Drop the instance; recurrence reports it as skipped.
    Skip,
    /// Interpret the time with the offset in force before the gap, which lands
    /// the instant just after the transition (02:30 EST becomes 03:30 EDT).
    #[default]
    ShiftForward,
}
