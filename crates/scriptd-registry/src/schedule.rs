use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use croner::Cron;

use crate::error::{RegistryError, Result};

/// Number of whitespace-separated fields a task expression must have:
/// minute, hour, day-of-month, month, day-of-week.
pub const CRON_FIELDS: usize = 5;

/// A validated five-field cron expression.
///
/// Evaluated against the host's local time zone at minute resolution.
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    /// Parse `expression`, rejecting anything that is not exactly five fields
    /// (seconds and `@daily`-style nicknames are not accepted).
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let fields = trimmed.split_whitespace().count();
        if fields != CRON_FIELDS {
            return Err(RegistryError::InvalidCron {
                expression: expression.to_string(),
                reason: format!("expected {CRON_FIELDS} fields, found {fields}"),
            });
        }
        let cron = Cron::from_str(trimmed).map_err(|e| RegistryError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expression: trimmed.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`, or `None` if the expression
    /// can never match again.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&Local);
        self.cron
            .find_next_occurrence(&local, false)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronSchedule")
            .field("expression", &self.expression)
            .finish()
    }
}

/// Validate without keeping the parsed schedule.
pub fn validate(expression: &str) -> Result<()> {
    CronSchedule::parse(expression).map(|_| ())
}
