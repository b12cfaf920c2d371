use super::ReminderStore;
use crate::reminder::{NewReminder, Reminder};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

pub struct SqliteReminderStore {
    pool: SqlitePool,
}

impl SqliteReminderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Row shape.  Discord snowflakes fit in 63 bits, and sqlite only stores signed integers.
#[derive(Debug, FromRow)]
struct ReminderRaw {
    id: i64,
    user_id: i64,
    channel_id: i64,
    message: String,
    remind_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    is_sent: bool,
}

impl From<ReminderRaw> for Reminder {
    fn from(raw: ReminderRaw) -> Self {
        Reminder {
            id: raw.id,
            user_id: raw.user_id as u64,
            channel_id: raw.channel_id as u64,
            message: raw.message,
            remind_at: raw.remind_at,
            created_at: raw.created_at,
            is_sent: raw.is_sent,
        }
    }
}

#[serenity::async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn schedule_reminder(&self, reminder: NewReminder) -> Result<Reminder> {
        let raw = sqlx::query_as::<_, ReminderRaw>(
            r#"
            INSERT INTO reminders (user_id, channel_id, message, remind_at, created_at, is_sent)
            VALUES (?, ?, ?, ?, ?, FALSE)
            RETURNING *
            "#,
        )
        .bind(reminder.user_id as i64)
        .bind(reminder.channel_id as i64)
        .bind(&reminder.message)
        .bind(reminder.remind_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(raw.into())
    }

    async fn get_all_unsent(&self) -> Result<Vec<Reminder>> {
        let rows = sqlx::query_as::<_, ReminderRaw>(
            r#"
            SELECT * FROM reminders
            WHERE is_sent = FALSE
            ORDER BY remind_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_unsent_for_user(&self, user_id: u64) -> Result<Vec<Reminder>> {
        let rows = sqlx::query_as::<_, ReminderRaw>(
            r#"
            SELECT * FROM reminders
            WHERE is_sent = FALSE AND user_id = ?
            ORDER BY remind_at, id
            "#,
        )
        .bind(user_id as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Reminder>> {
        let row = sqlx::query_as::<_, ReminderRaw>("SELECT * FROM reminders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM reminders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn mark_sent(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE reminders SET is_sent = TRUE WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        query.build().execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_reminder(user_id: u64, minutes: i64) -> NewReminder {
        NewReminder {
            user_id,
            channel_id: 555,
            message: format!("in {} minutes", minutes),
            remind_at: Utc::now() + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn schedule_assigns_ids_and_defaults() {
        let store = SqliteReminderStore::new(crate::db::memory().await.unwrap());

        let first = store.schedule_reminder(new_reminder(1, 10)).await.unwrap();
        let second = store.schedule_reminder(new_reminder(1, 5)).await.unwrap();

        assert!(first.id > 0);
        assert!(second.id > first.id);
        assert!(!first.is_sent);
        assert_eq!(first.channel_id, 555);
        assert_eq!(store.get_by_id(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn unsent_queries_are_ordered_and_exclude_sent() {
        let store = SqliteReminderStore::new(crate::db::memory().await.unwrap());

        let late = store.schedule_reminder(new_reminder(1, 30)).await.unwrap();
        let early = store.schedule_reminder(new_reminder(2, 1)).await.unwrap();
        let sent = store.schedule_reminder(new_reminder(1, 2)).await.unwrap();
        store.mark_sent(&[sent.id]).await.unwrap();

        let all: Vec<i64> = store
            .get_all_unsent()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(all, vec![early.id, late.id]);

        let mine = store.get_unsent_for_user(1).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, late.id);
    }

    #[tokio::test]
    async fn mark_sent_is_idempotent() {
        let store = SqliteReminderStore::new(crate::db::memory().await.unwrap());
        let r = store.schedule_reminder(new_reminder(1, 1)).await.unwrap();

        store.mark_sent(&[r.id]).await.unwrap();
        store.mark_sent(&[r.id, 9999]).await.unwrap();
        store.mark_sent(&[]).await.unwrap();

        assert!(store.get_by_id(r.id).await.unwrap().unwrap().is_sent);
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = SqliteReminderStore::new(crate::db::memory().await.unwrap());
        let r = store.schedule_reminder(new_reminder(1, 1)).await.unwrap();

        assert!(store.delete_by_id(r.id).await.unwrap());
        assert!(!store.delete_by_id(r.id).await.unwrap());
        assert_eq!(store.get_by_id(r.id).await.unwrap(), None);
    }
}
