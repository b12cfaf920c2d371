//! Durable reminder storage.

#[cfg(test)]
mod inmemory;
mod sqlite;

use super::{NewReminder, Reminder};
use anyhow::Result;

#[cfg(test)]
pub use inmemory::InMemoryReminderStore;
pub use sqlite::SqliteReminderStore;

#[serenity::async_trait]
pub trait ReminderStore: Send + Sync {
    /// Persist a new, unsent reminder and return it with its assigned id.
    async fn schedule_reminder(&self, reminder: NewReminder) -> Result<Reminder>;
    /// Every unsent reminder, earliest first.
    async fn get_all_unsent(&self) -> Result<Vec<Reminder>>;
    /// Unsent reminders belonging to one user, earliest first.
    async fn get_unsent_for_user(&self, user_id: u64) -> Result<Vec<Reminder>>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Reminder>>;
    /// Returns whether a row was deleted.
    async fn delete_by_id(&self, id: i64) -> Result<bool>;
    /// Flag reminders as delivered.  Re-marking an already sent id is not an error.
    async fn mark_sent(&self, ids: &[i64]) -> Result<()>;
}
