//! Engine tunables.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! allowed_durations_minutes = [30, 60]
//! range_bucket_minutes = 60
//! dst_policy = "shift_forward"
//! max_recurrence_months = 12
//! default_time_zone = "UTC"
//! ```

use serde::{Deserialize, Serialize};

use crate::dst::DstPolicy;
use crate::error::{Result, SchedulingError};

/// Largest accepted `max_recurrence_months` (ten years).
pub const MAX_RECURRENCE_MONTHS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Durations accepted for individually created slots.
    pub allowed_durations_minutes: Vec<i64>,
    /// Bucket length used when a window is split into slots.
    pub range_bucket_minutes: i64,
    /// How recurrence handles local times that fall in a DST gap.
    pub dst_policy: DstPolicy,
    /// Upper bound on `DayOfWeekForMonths` horizons.
    pub max_recurrence_months: u32,
    /// Zone used for viewers whose profile has no zone.
    pub default_time_zone: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allowed_durations_minutes: vec![30, 60],
            range_bucket_minutes: 60,
            dst_policy: DstPolicy::default(),
            max_recurrence_months: 12,
            default_time_zone: "UTC".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| SchedulingError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.allowed_durations_minutes.is_empty()
            || self.allowed_durations_minutes.iter().any(|&m| m <= 0)
        {
            return Err(SchedulingError::Config(
                "allowed_durations_minutes must be non-empty and positive".to_string(),
            ));
        }
        if self.range_bucket_minutes <= 0 {
            return Err(SchedulingError::Config(
                "range_bucket_minutes must be positive".to_string(),
            ));
        }
        if self.max_recurrence_months > MAX_RECURRENCE_MONTHS {
            return Err(SchedulingError::Config(format!(
                "max_recurrence_months must be at most {}",
                MAX_RECURRENCE_MONTHS
            )));
        }
        Ok(())
    }
}
