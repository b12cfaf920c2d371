use super::ReminderStore;
use crate::reminder::{NewReminder, Reminder};
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

/// Store used by scheduler tests.  Failures can be switched on to exercise error paths.
#[derive(Default)]
pub struct InMemoryReminderStore {
    reminders: Mutex<Vec<Reminder>>,
    pub fail_reads: AtomicBool,
    pub fail_mark_sent: AtomicBool,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: Mutex::new(reminders),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Vec<Reminder> {
        self.reminders.lock().unwrap().clone()
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(anyhow!("simulated {} failure", what))
        } else {
            Ok(())
        }
    }

    fn unsent_by(&self, mut keep: impl FnMut(&Reminder) -> bool) -> Vec<Reminder> {
        let mut found: Vec<Reminder> = self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.is_sent && keep(r))
            .cloned()
            .collect();
        found.sort_by_key(|r| (r.remind_at, r.id));
        found
    }
}

#[serenity::async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn schedule_reminder(&self, reminder: NewReminder) -> Result<Reminder> {
        let mut reminders = self.reminders.lock().unwrap();
        let id = reminders.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let created = Reminder {
            id,
            user_id: reminder.user_id,
            channel_id: reminder.channel_id,
            message: reminder.message,
            remind_at: reminder.remind_at,
            created_at: Utc::now(),
            is_sent: false,
        };
        reminders.push(created.clone());
        Ok(created)
    }

    async fn get_all_unsent(&self) -> Result<Vec<Reminder>> {
        Self::check(&self.fail_reads, "read")?;
        Ok(self.unsent_by(|_| true))
    }

    async fn get_unsent_for_user(&self, user_id: u64) -> Result<Vec<Reminder>> {
        Self::check(&self.fail_reads, "read")?;
        Ok(self.unsent_by(|r| r.user_id == user_id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Reminder>> {
        Self::check(&self.fail_reads, "read")?;
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let mut reminders = self.reminders.lock().unwrap();
        let before = reminders.len();
        reminders.retain(|r| r.id != id);
        Ok(reminders.len() != before)
    }

    async fn mark_sent(&self, ids: &[i64]) -> Result<()> {
        Self::check(&self.fail_mark_sent, "mark sent")?;
        for reminder in self.reminders.lock().unwrap().iter_mut() {
            if ids.contains(&reminder.id) {
                reminder.is_sent = true;
            }
        }
        Ok(())
    }
}
