use super::{NotificationSink, ReminderIndex, ReminderStore};
use crate::{
    log_error, log_internal, log_warn,
    shutdown::{self, Shutdown, ShutdownTrigger},
};
use chrono::{DateTime, Duration, Utc};
use futures::{stream, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What to do with a delivered reminder whose "sent" flag could not be persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkSentFailure {
    /// Forget it in memory.  The store still has it unsent, so it is delivered again only after a
    /// restart reseeds the index.
    #[default]
    Drop,
    /// Keep it in the index and deliver it again on the next retry.
    Redeliver,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Upper bound on deliveries in flight during one dispatch.
    pub max_concurrent_sends: usize,
    /// Pause before retrying failed deliveries or a failed reload from the store.
    pub retry_delay: Duration,
    pub mark_sent_failure: MarkSentFailure,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_sends: 8,
            retry_delay: Duration::seconds(15),
            mark_sent_failure: MarkSentFailure::Drop,
        }
    }
}

/// Background loop delivering reminders as they come due.
///
/// Seeds the index from the store, then sleeps until the earliest due time or until the index
/// signals that something earlier arrived, whichever comes first.  On wake it delivers everything
/// due through the sink and reconciles successes with the store.
pub struct ReminderScheduler {
    index: Arc<ReminderIndex>,
    store: Arc<dyn ReminderStore>,
    sink: Arc<dyn NotificationSink>,
    settings: SchedulerSettings,
    /// Set while the index could not be loaded from the store.
    reseed_at: Option<DateTime<Utc>>,
}

/// Running scheduler.  `stop` cancels the loop and waits for it to exit.
pub struct SchedulerHandle {
    trigger: ShutdownTrigger,
    task: JoinHandle<()>,
}

enum Wake {
    Due,
    Changed,
    Cancelled,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        self.trigger.trigger();
        if let Err(e) = self.task.await {
            log_error!("Reminder scheduler task ended abnormally: {}", e);
        }
    }
}

impl ReminderScheduler {
    pub fn new(
        index: Arc<ReminderIndex>,
        store: Arc<dyn ReminderStore>,
        sink: Arc<dyn NotificationSink>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            index,
            store,
            sink,
            settings,
            reseed_at: None,
        }
    }

    pub fn start(self) -> SchedulerHandle {
        let (trigger, shutdown) = shutdown::channel();
        let task = tokio::spawn(self.run(shutdown));
        SchedulerHandle { trigger, task }
    }

    pub async fn run(mut self, mut shutdown: Shutdown) {
        log_internal!("Reminder scheduler starting");
        self.seed().await;

        loop {
            match self.idle(&mut shutdown).await {
                Wake::Cancelled => break,
                Wake::Changed => continue,
                Wake::Due => {
                    if self.reseed_at.is_some_and(|at| at <= Utc::now()) {
                        self.seed().await;
                    }
                    self.dispatch(Utc::now()).await;
                }
            }
        }

        log_internal!("Reminder scheduler stopped");
    }

    /// Full reload of unsent reminders.  The index ignores ids it already holds.
    async fn seed(&mut self) {
        match self.store.get_all_unsent().await {
            Ok(reminders) => {
                self.index.insert_many(reminders);
                if !self.index.is_empty() {
                    log_internal!("{} reminder(s) pending", self.index.len());
                }
                self.reseed_at = None;
            }
            Err(e) => {
                log_error!(
                    "Could not load unsent reminders, retrying in {}s: {}",
                    self.settings.retry_delay.num_seconds(),
                    e
                );
                self.reseed_at = Some(Utc::now() + self.settings.retry_delay);
            }
        }
    }

    /// When the loop should next wake on its own, if ever.
    fn deadline(&self) -> Option<DateTime<Utc>> {
        match (self.index.next_due_time(), self.reseed_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn idle(&self, shutdown: &mut Shutdown) -> Wake {
        if shutdown.is_cancelled() {
            return Wake::Cancelled;
        }

        let Some(deadline) = self.deadline() else {
            return match self.index.wait_for_earlier(shutdown).await {
                true => Wake::Changed,
                false => Wake::Cancelled,
            };
        };

        // Negative when already past due.
        let wait = match (deadline - Utc::now()).to_std() {
            Ok(wait) if !wait.is_zero() => wait,
            _ => return Wake::Due,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => Wake::Due,
            woke = self.index.wait_for_earlier(shutdown) => match woke {
                true => Wake::Changed,
                false => Wake::Cancelled,
            },
        }
    }

    async fn dispatch(&mut self, now: DateTime<Utc>) {
        let due = self.index.all_due(now);
        if due.is_empty() {
            return;
        }
        debug_assert!(due.iter().all(|r| r.is_due(now)));
        log_internal!("Delivering {} due reminder(s)", due.len());

        let sink = &self.sink;
        let outcomes: Vec<_> = stream::iter(due)
            .map(|reminder| async move {
                let res = sink.send(reminder.channel_id, &reminder.render()).await;
                (reminder.id, res)
            })
            .buffer_unordered(self.settings.max_concurrent_sends.max(1))
            .collect()
            .await;

        let mut delivered = Vec::with_capacity(outcomes.len());
        let mut undelivered = Vec::new();
        for (id, res) in outcomes {
            match res {
                Ok(()) => delivered.push(id),
                Err(e) => {
                    log_warn!("Could not deliver reminder #{}, will retry: {}", id, e);
                    undelivered.push(id);
                }
            }
        }

        if self.reconcile(&delivered).await {
            undelivered.extend(delivered);
        }

        // Only the failed reminders wait out the retry delay.  Everything else stays on schedule.
        let retry_at = Utc::now() + self.settings.retry_delay;
        for id in undelivered {
            self.index.defer(id, retry_at);
        }
    }

    /// Persist delivery and drop delivered reminders from the index.  Returns whether delivered
    /// reminders were kept in the index for redelivery.
    async fn reconcile(&self, delivered: &[i64]) -> bool {
        if delivered.is_empty() {
            return false;
        }

        if let Err(e) = self.store.mark_sent(delivered).await {
            log_error!(
                "Could not mark {} delivered reminder(s) as sent: {}",
                delivered.len(),
                e
            );
            if self.settings.mark_sent_failure == MarkSentFailure::Redeliver {
                return true;
            }
        }

        for id in delivered {
            self.index.remove_by_id(*id);
        }
        false
    }
}
