use super::Reminder;
use crate::{log_warn, shutdown::Shutdown};
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::Notify;

/// Ordering key.  Ties on the due time are broken by id so the order is total.
type DueKey = (DateTime<Utc>, i64);

/// In-memory index of unsent reminders, ordered by due time then id.
///
/// This is a cache over the reminder store, never the system of record.  It starts empty and is
/// seeded by the scheduler with `insert_many`.
///
/// A reminder is due at its `remind_at` unless it has been deferred, in which case it is due at
/// the later retry time.  Deferring only moves the entry within the index; the record itself is
/// untouched.
///
/// Every mutation that changes the earliest due time raises a single-slot wake signal which
/// `wait_for_earlier` consumes.  Raising an already raised signal does nothing, so any number of
/// mutations between two waits collapse into one wake, and a raise with nobody waiting is kept
/// until the next wait.
pub struct ReminderIndex {
    entries: Mutex<Entries>,
    earlier: Notify,
}

#[derive(Default)]
struct Entries {
    by_due: BTreeMap<DueKey, Reminder>,
    due_by_id: HashMap<i64, DateTime<Utc>>,
}

/// An insert refused because the record was never persisted.
struct Unpersisted {
    user_id: u64,
}

impl Entries {
    fn earliest(&self) -> Option<DateTime<Utc>> {
        self.by_due.keys().next().map(|(at, _)| *at)
    }

    /// First insert of an id wins.  Sent records are skipped.
    fn insert(&mut self, reminder: Reminder) -> Result<(), Unpersisted> {
        if reminder.id <= 0 {
            return Err(Unpersisted {
                user_id: reminder.user_id,
            });
        }
        if reminder.is_sent || self.due_by_id.contains_key(&reminder.id) {
            return Ok(());
        }
        self.due_by_id.insert(reminder.id, reminder.remind_at);
        self.by_due.insert((reminder.remind_at, reminder.id), reminder);
        Ok(())
    }

    fn remove(&mut self, id: i64) -> Option<Reminder> {
        let at = self.due_by_id.remove(&id)?;
        self.by_due.remove(&(at, id))
    }

    fn defer(&mut self, id: i64, until: DateTime<Utc>) {
        match self.due_by_id.get(&id) {
            Some(at) if *at < until => {}
            _ => return,
        }
        if let Some(reminder) = self.remove(id) {
            self.due_by_id.insert(id, until);
            self.by_due.insert((until, id), reminder);
        }
    }
}

impl Default for ReminderIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ReminderIndex {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            earlier: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Every mutation leaves both maps consistent before it can panic, so a poisoned lock still
        // guards valid data.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` under the lock and raise the signal, after unlocking, if the earliest due time
    /// moved.
    fn mutate<R>(&self, f: impl FnOnce(&mut Entries) -> R) -> R {
        let (result, moved) = {
            let mut entries = self.lock();
            let before = entries.earliest();
            let result = f(&mut entries);
            (result, before != entries.earliest())
        };

        if moved {
            self.earlier.notify_one();
        }
        result
    }

    /// Earliest due time held, if any.
    pub fn next_due_time(&self) -> Option<DateTime<Utc>> {
        self.lock().earliest()
    }

    pub fn insert(&self, reminder: Reminder) {
        if let Err(rejected) = self.mutate(|entries| entries.insert(reminder)) {
            Self::report_unpersisted(&[rejected]);
        }
    }

    /// Bulk load, used to seed from the store.  Sent and already present records are skipped.
    pub fn insert_many(&self, reminders: impl IntoIterator<Item = Reminder>) {
        let rejected: Vec<Unpersisted> = self.mutate(|entries| {
            reminders
                .into_iter()
                .filter_map(|reminder| entries.insert(reminder).err())
                .collect()
        });
        Self::report_unpersisted(&rejected);
    }

    fn report_unpersisted(rejected: &[Unpersisted]) {
        for r in rejected {
            log_warn!("Refusing to index unpersisted reminder for user {}", r.user_id);
        }
        debug_assert!(rejected.is_empty(), "reminders must be persisted before indexing");
    }

    /// Every reminder due at or before `now`, earliest first.  Stops at the first record that is
    /// not yet due.
    pub fn all_due(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        self.lock()
            .by_due
            .range(..=(now, i64::MAX))
            .map(|(_, reminder)| reminder.clone())
            .collect()
    }

    pub fn remove_by_id(&self, id: i64) {
        self.mutate(|entries| {
            entries.remove(id);
        });
    }

    /// Hold a reminder back until `until` without removing it.  Ignored for unknown ids and for
    /// reminders already due later than `until`.
    pub fn defer(&self, id: i64, until: DateTime<Utc>) {
        self.mutate(|entries| entries.defer(id, until));
    }

    #[cfg(test)]
    pub fn get(&self, id: i64) -> Option<Reminder> {
        let entries = self.lock();
        let at = *entries.due_by_id.get(&id)?;
        entries.by_due.get(&(at, id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().by_due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until a mutation changes the earliest due time.
    ///
    /// Returns `true` when woken by the signal and `false` when `shutdown` fired first.  Both
    /// branches are cancel safe: an unconsumed signal stays raised for the next call.
    pub async fn wait_for_earlier(&self, shutdown: &mut Shutdown) -> bool {
        tokio::select! {
            _ = self.earlier.notified() => true,
            _ = shutdown.cancelled() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{reminder::testing::*, shutdown};
    use chrono::Duration;
    use std::sync::Arc;

    fn ids(reminders: &[Reminder]) -> Vec<i64> {
        reminders.iter().map(|r| r.id).collect()
    }

    #[test]
    fn all_due_is_ordered_and_bounded() {
        let index = ReminderIndex::new();
        index.insert(reminder(1, t0() + Duration::minutes(1)));
        index.insert(reminder(2, t0() + Duration::minutes(3)));
        index.insert(reminder(3, t0() + Duration::minutes(2)));

        assert_eq!(index.next_due_time(), Some(t0() + Duration::minutes(1)));
        assert_eq!(ids(&index.all_due(t0() + Duration::minutes(2))), vec![1, 3]);
        assert!(index.all_due(t0()).is_empty());
        // Reading does not consume.
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn ties_on_due_time_break_by_id() {
        let index = ReminderIndex::new();
        index.insert_many(vec![
            reminder(9, t0()),
            reminder(4, t0()),
            reminder(7, t0() - Duration::seconds(1)),
        ]);

        assert_eq!(ids(&index.all_due(t0())), vec![7, 4, 9]);
    }

    #[test]
    fn first_insert_of_an_id_wins() {
        let index = ReminderIndex::new();
        index.insert(reminder(1, t0()));

        let mut changed = reminder(1, t0() - Duration::hours(5));
        changed.message = "different".to_owned();
        index.insert(changed);

        assert_eq!(index.len(), 1);
        assert_eq!(index.next_due_time(), Some(t0()));
        assert_eq!(index.get(1).unwrap().message, "reminder 1");
    }

    #[test]
    fn sent_reminders_are_never_held() {
        let index = ReminderIndex::new();
        let mut sent = reminder(1, t0());
        sent.is_sent = true;

        index.insert(sent.clone());
        index.insert_many(vec![sent]);

        assert_eq!(index.next_due_time(), None);
        assert!(index.all_due(t0() + Duration::days(365)).is_empty());
    }

    #[test]
    fn removing_earliest_moves_next_due_time() {
        let index = ReminderIndex::new();
        index.insert(reminder(1, t0()));
        index.insert(reminder(2, t0() + Duration::minutes(5)));

        index.remove_by_id(1);
        assert_eq!(index.next_due_time(), Some(t0() + Duration::minutes(5)));

        index.remove_by_id(2);
        assert_eq!(index.next_due_time(), None);
        assert!(index.is_empty());

        // Missing ids are a no-op.
        index.remove_by_id(42);
    }

    #[tokio::test]
    async fn inserting_an_earlier_reminder_wakes_a_pending_wait() {
        let index = Arc::new(ReminderIndex::new());
        let (_trigger, shutdown) = shutdown::channel();

        index.insert(reminder(1, t0() + Duration::minutes(10)));
        // Drain the raise caused by the first insert.
        assert!(index.wait_for_earlier(&mut shutdown.clone()).await);

        let waiter = {
            let index = index.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move { index.wait_for_earlier(&mut shutdown).await })
        };
        tokio::task::yield_now().await;

        index.insert(reminder(2, t0() + Duration::minutes(1)));

        let woke = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait should resolve")
            .unwrap();
        assert!(woke);
        assert_eq!(index.next_due_time(), Some(t0() + Duration::minutes(1)));
    }

    #[tokio::test]
    async fn later_insert_does_not_raise() {
        let index = ReminderIndex::new();
        let (_trigger, mut shutdown) = shutdown::channel();

        index.insert(reminder(1, t0()));
        assert!(index.wait_for_earlier(&mut shutdown).await);

        index.insert(reminder(2, t0() + Duration::minutes(1)));
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            index.wait_for_earlier(&mut shutdown),
        )
        .await;
        assert!(pending.is_err(), "minimum did not move, no wake expected");
    }

    #[tokio::test]
    async fn concurrent_raises_coalesce_into_one_wake() {
        let index = Arc::new(ReminderIndex::new());
        let (_trigger, mut shutdown) = shutdown::channel();

        let inserters: Vec<_> = (1..=16)
            .map(|id| {
                let index = index.clone();
                tokio::spawn(async move {
                    index.insert(reminder(id, t0() - Duration::seconds(id)));
                })
            })
            .collect();
        for inserter in inserters {
            inserter.await.unwrap();
        }

        // At least one wake is pending...
        assert!(index.wait_for_earlier(&mut shutdown).await);
        // ...and only one.
        let second = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            index.wait_for_earlier(&mut shutdown),
        )
        .await;
        assert!(second.is_err());
        assert_eq!(index.next_due_time(), Some(t0() - Duration::seconds(16)));
    }

    #[tokio::test]
    async fn cancellation_releases_wait() {
        let index = ReminderIndex::new();
        let (trigger, mut shutdown) = shutdown::channel();
        trigger.trigger();

        assert!(!index.wait_for_earlier(&mut shutdown).await);
    }

    #[test]
    fn unpersisted_reminders_are_refused() {
        let mut entries = Entries::default();

        let refused = entries.insert(reminder(0, t0()));

        assert!(matches!(refused, Err(Unpersisted { user_id: 100 })));
        assert!(entries.by_due.is_empty());
        assert!(entries.due_by_id.is_empty());
    }

    #[test]
    fn deferred_reminder_is_due_at_retry_time() {
        let index = ReminderIndex::new();
        index.insert(reminder(1, t0()));
        index.insert(reminder(2, t0() + Duration::minutes(1)));

        index.defer(1, t0() + Duration::minutes(5));

        assert_eq!(index.next_due_time(), Some(t0() + Duration::minutes(1)));
        assert_eq!(ids(&index.all_due(t0() + Duration::minutes(2))), vec![2]);
        assert_eq!(ids(&index.all_due(t0() + Duration::minutes(5))), vec![2, 1]);
        // The record keeps its own due time.
        assert_eq!(index.get(1).unwrap().remind_at, t0());

        // Never moves a reminder earlier, and unknown ids are a no-op.
        index.defer(1, t0() + Duration::minutes(3));
        index.defer(42, t0());
        assert_eq!(ids(&index.all_due(t0() + Duration::minutes(4))), vec![2]);

        index.remove_by_id(1);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn insert_after_deferred_minimum_wakes() {
        let index = ReminderIndex::new();
        let (_trigger, mut shutdown) = shutdown::channel();

        index.insert(reminder(1, t0()));
        index.defer(1, t0() + Duration::minutes(15));
        assert!(index.wait_for_earlier(&mut shutdown).await);

        // Later than the record's own time, earlier than its retry.
        index.insert(reminder(5, t0() + Duration::seconds(1)));

        let woke = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            index.wait_for_earlier(&mut shutdown),
        )
        .await;
        assert_eq!(woke, Ok(true));
    }
}
