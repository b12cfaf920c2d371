use crate::{
    command::SlashCommand,
    context::Context,
    helper::{InteractionHelper, OptionsHelper},
    log_internal,
    reminder::{NewReminder, Reminder, ReminderIndex, ReminderStore, TimeResolver},
};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serenity::all::{CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption};

pub struct Remind;

/// Problems with a reminder request that the user can fix.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReminderRequestError {
    #[error("I couldn't work out when `{0}` is.  Try something like `in 2h` or `1h30m`.")]
    UnknownTime(String),
    #[error("<t:{}:F> is already in the past.", .0.timestamp())]
    InPast(DateTime<Utc>),
    #[error("What should I remind you about?")]
    EmptyMessage,
    #[error("That reminder is {len} characters long, the limit is {max}.")]
    TooLong { len: usize, max: usize },
    #[error("You already have {0} pending reminders.  Cancel one with `/remind cancel` first.")]
    TooMany(usize),
    #[error("You have no pending reminder #{0}.")]
    NotFound(i64),
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_pending: usize,
    max_message_length: usize,
}

/// Everything `/remind set` checks before anything is persisted.
#[allow(clippy::too_many_arguments)]
fn prepare(
    user_id: u64,
    channel_id: u64,
    when: &str,
    resolved: Option<DateTime<Utc>>,
    message: &str,
    pending: usize,
    limits: Limits,
    now: DateTime<Utc>,
) -> Result<NewReminder, ReminderRequestError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ReminderRequestError::EmptyMessage);
    }

    let len = message.chars().count();
    if len > limits.max_message_length {
        return Err(ReminderRequestError::TooLong {
            len,
            max: limits.max_message_length,
        });
    }

    if pending >= limits.max_pending {
        return Err(ReminderRequestError::TooMany(pending));
    }

    let remind_at = resolved.ok_or_else(|| ReminderRequestError::UnknownTime(when.to_owned()))?;
    if remind_at <= now {
        return Err(ReminderRequestError::InPast(remind_at));
    }

    Ok(NewReminder {
        user_id,
        channel_id,
        message: message.to_owned(),
        remind_at,
    })
}

#[allow(clippy::too_many_arguments)]
async fn set(
    store: &dyn ReminderStore,
    index: &ReminderIndex,
    time_resolver: &dyn TimeResolver,
    limits: Limits,
    user_id: u64,
    channel_id: u64,
    when: &str,
    message: &str,
) -> Result<Reminder> {
    let pending = store.get_unsent_for_user(user_id).await?.len();
    let now = Utc::now();
    let resolved = time_resolver.resolve(when, now).await;

    let new = prepare(
        user_id, channel_id, when, resolved, message, pending, limits, now,
    )?;
    let reminder = store.schedule_reminder(new).await?;
    index.insert(reminder.clone());

    log_internal!(
        "Reminder #{} set for {}",
        reminder.id,
        reminder.remind_at.to_rfc3339()
    );
    Ok(reminder)
}

async fn cancel(
    store: &dyn ReminderStore,
    index: &ReminderIndex,
    user_id: u64,
    id: i64,
) -> Result<Reminder> {
    let reminder = store
        .get_by_id(id)
        .await?
        .filter(|r| r.user_id == user_id && !r.is_sent)
        .ok_or(ReminderRequestError::NotFound(id))?;

    if !store.delete_by_id(id).await? {
        // Delivered and cleaned up in the meantime
        return Err(ReminderRequestError::NotFound(id).into());
    }
    index.remove_by_id(id);

    log_internal!("Reminder #{} cancelled", id);
    Ok(reminder)
}

fn format_list(reminders: &[Reminder]) -> String {
    if reminders.is_empty() {
        return "You have no pending reminders.".to_owned();
    }

    let mut reply = String::from("Your pending reminders:\n");
    for r in reminders {
        let ts = r.remind_at.timestamp();
        reply.push_str(&format!("`#{}` <t:{}:F> (<t:{}:R>) {}\n", r.id, ts, ts, r.message));
    }
    reply
}

/// User-facing text for a request error, or the error itself if it is not one.
fn explain(err: anyhow::Error) -> Result<String> {
    match err.downcast::<ReminderRequestError>() {
        Ok(request_err) => Ok(request_err.to_string()),
        Err(err) => Err(err),
    }
}

#[serenity::async_trait]
impl SlashCommand for Remind {
    fn name(&self) -> &'static str {
        "remind"
    }

    fn description(&self) -> &'static str {
        "Set, list or cancel reminders"
    }

    fn register(&self) -> CreateCommand {
        let set = CreateCommandOption::new(CommandOptionType::SubCommand, "set", "Set a reminder")
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "when",
                    "e.g. `in 20m`, `1h30m`, `tomorrow at 9am`",
                )
                .required(true),
            )
            .add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "message",
                    "What to remind you about",
                )
                .required(true),
            );
        let list = CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "list",
            "List your pending reminders",
        );
        let cancel = CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "cancel",
            "Cancel a pending reminder",
        )
        .add_sub_option(
            CreateCommandOption::new(CommandOptionType::Integer, "id", "Reminder number")
                .required(true),
        );

        CreateCommand::new(self.name())
            .description(self.description())
            .add_option(set)
            .add_option(list)
            .add_option(cancel)
    }

    async fn run(&self, ctx: &Context<'_>, interaction: &CommandInteraction) -> Result<()> {
        let options = interaction.data.options();
        let (subcommand, options) = options
            .subcommand()
            .ok_or(anyhow!("/remind invoked without a subcommand"))?;
        let user_id = interaction.user.id.get();

        match subcommand {
            "set" => {
                let when = options.string("when").unwrap_or_default();
                let message = options.string("message").unwrap_or_default();
                let limits = {
                    let cfg = ctx.cfg.read().await;
                    Limits {
                        max_pending: cfg.reminders.max_pending_per_user,
                        max_message_length: cfg.reminders.max_message_length,
                    }
                };

                // Resolving free text may take a model round trip.
                interaction.thinking(ctx, true).await?;

                let reply = match set(
                    ctx.store.as_ref(),
                    ctx.index,
                    ctx.time_resolver.as_ref(),
                    limits,
                    user_id,
                    interaction.channel_id.get(),
                    when,
                    message,
                )
                .await
                {
                    Ok(reminder) => {
                        let ts = reminder.remind_at.timestamp();
                        format!(
                            "Reminder `#{}` set for <t:{}:F> (<t:{}:R>).",
                            reminder.id, ts, ts
                        )
                    }
                    Err(err) => explain(err)?,
                };
                interaction.answer(ctx, &reply).await
            }
            "list" => {
                let reminders = ctx.store.get_unsent_for_user(user_id).await?;
                interaction
                    .reply_private(ctx, &format_list(&reminders))
                    .await
            }
            "cancel" => {
                let id = options
                    .integer("id")
                    .ok_or(anyhow!("/remind cancel invoked without an id"))?;
                let reply = match cancel(ctx.store.as_ref(), ctx.index, user_id, id).await {
                    Ok(reminder) => {
                        format!("Cancelled reminder `#{}`: {}", reminder.id, reminder.message)
                    }
                    Err(err) => explain(err)?,
                };
                interaction.reply_private(ctx, &reply).await
            }
            other => Err(anyhow!("Unknown /remind subcommand `{}`", other)),
        }
    }
}
