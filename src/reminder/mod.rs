//! Reminder scheduling core: the record, the in-memory index over unsent records, the loop that
//! delivers them, and the collaborators the loop talks to.

pub mod index;
pub mod scheduler;
pub mod sink;
pub mod store;
pub mod time;

use chrono::{DateTime, Utc};

pub use index::ReminderIndex;
pub use scheduler::{MarkSentFailure, ReminderScheduler, SchedulerHandle, SchedulerSettings};
pub use sink::{DiscordSink, NotificationSink};
pub use store::{ReminderStore, SqliteReminderStore};
pub use time::{LlmTimeResolver, TimeResolver};

/// A persisted reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Assigned by the store.  Zero before persistence.
    pub id: i64,
    pub user_id: u64,
    pub channel_id: u64,
    pub message: String,
    pub remind_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_sent: bool,
}

/// What a command handler asks the store to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub user_id: u64,
    pub channel_id: u64,
    pub message: String,
    pub remind_at: DateTime<Utc>,
}

impl Reminder {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_sent && self.remind_at <= now
    }

    /// Message delivered to the reminder's channel.
    pub fn render(&self) -> String {
        format!(
            "<@{}> reminder: {}\n-# set <t:{}:R>",
            self.user_id,
            self.message,
            self.created_at.timestamp()
        )
    }
}
