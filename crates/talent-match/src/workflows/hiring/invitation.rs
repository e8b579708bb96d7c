use chrono::{DateTime, Duration, Utc};

use super::entry::PipelineEntry;

pub const DEFAULT_INVITATION_WINDOW_HOURS: i64 = 48;

/// Response window between a company's interest and the candidate's answer.
///
/// Every deadline comparison in the pipeline goes through `is_expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvitationWindow {
    length: Duration,
}

impl InvitationWindow {
    pub fn new(length: Duration) -> Self {
        Self { length }
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    pub fn deadline_from(&self, expressed_at: DateTime<Utc>) -> DateTime<Utc> {
        expressed_at + self.length
    }

    /// An entry without a deadline has nothing to expire.
    pub fn is_expired(entry: &PipelineEntry, now: DateTime<Utc>) -> bool {
        entry
            .interest_response_deadline
            .map(|deadline| now > deadline)
            .unwrap_or(false)
    }

    pub fn time_remaining(entry: &PipelineEntry, now: DateTime<Utc>) -> Option<Duration> {
        entry
            .interest_response_deadline
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }
}

impl Default for InvitationWindow {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_INVITATION_WINDOW_HOURS))
    }
}
