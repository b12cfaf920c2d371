//! Persistent record of every slash command the bot has been asked to run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionEntry {
    pub user_id: u64,
    pub channel_id: u64,
    pub guild_id: Option<u64>,
    pub command: String,
    /// Human readable `name=value` summary of the options.
    pub options: String,
    pub created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct InteractionRaw {
    user_id: i64,
    channel_id: i64,
    guild_id: Option<i64>,
    command: String,
    options: String,
    created_at: DateTime<Utc>,
}

impl From<InteractionRaw> for InteractionEntry {
    fn from(raw: InteractionRaw) -> Self {
        Self {
            user_id: raw.user_id as u64,
            channel_id: raw.channel_id as u64,
            guild_id: raw.guild_id.map(|id| id as u64),
            command: raw.command,
            options: raw.options,
            created_at: raw.created_at,
        }
    }
}

pub struct InteractionLog {
    pool: SqlitePool,
}

impl InteractionLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: &InteractionEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO interaction_log (user_id, channel_id, guild_id, command, options, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id as i64)
        .bind(entry.channel_id as i64)
        .bind(entry.guild_id.map(|id| id as i64))
        .bind(&entry.command)
        .bind(&entry.options)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest first.
    pub async fn recent_for_user(&self, user_id: u64, limit: u32) -> Result<Vec<InteractionEntry>> {
        let rows = sqlx::query_as::<_, InteractionRaw>(
            r#"
            SELECT user_id, channel_id, guild_id, command, options, created_at
            FROM interaction_log
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
