//! Serenity hands us events through callbacks on [`crate::handler::Handler`].  This module
//! translates them into a single `Event` enum so the handling logic lives in one place.

use crate::{
    context::Context,
    helper::{summarize_options, InteractionHelper},
    interaction_log::InteractionEntry,
    log_error, log_event, log_internal, log_warn,
    logging::{AsyncPrintColor, Glue, PrintColor},
};
use serenity::all::{Command, CommandInteraction, Ready};

const FAILURE_REPLY: &str = "Something went wrong handling that command.  Try again in a bit.";

/// A Discord event
pub enum Event {
    Ready(Ready),
    Command(CommandInteraction),
}

impl Event {
    pub async fn handle(self, ctx: Context<'_>) {
        match self {
            Event::Ready(ready) => on_ready(&ctx, ready).await,
            Event::Command(interaction) => on_command(&ctx, interaction).await,
        }
    }
}

async fn on_ready(ctx: &Context<'_>, ready: Ready) {
    log_event!("Connected as {}", ready.user.color());

    let registrations = crate::command::commands()
        .iter()
        .map(|command| command.register())
        .collect();

    match Command::set_global_commands(ctx.http, registrations).await {
        Ok(registered) => log_internal!("Registered {} slash commands", registered.len()),
        Err(err) => log_error!("Could not register slash commands: {}", err),
    }
}

async fn on_command(ctx: &Context<'_>, interaction: CommandInteraction) {
    let options = summarize_options(&interaction.data.options());

    log_event!(
        "{}{}{}{}{} /{} {}",
        interaction.guild_id.color(ctx.http).await,
        Glue.color(),
        interaction.channel_id.color(ctx.http).await,
        Glue.color(),
        interaction.user.color(),
        interaction.data.name,
        options
    );

    let entry = InteractionEntry {
        user_id: interaction.user.id.get(),
        channel_id: interaction.channel_id.get(),
        guild_id: interaction.guild_id.map(|id| id.get()),
        command: interaction.data.name.clone(),
        options,
        created_at: chrono::Utc::now(),
    };
    if let Err(err) = ctx.interactions.record(&entry).await {
        log_warn!("Could not record interaction: {}", err);
    }

    let Some(command) = crate::command::find(&interaction.data.name) else {
        log_warn!("Unknown command /{}", interaction.data.name);
        return;
    };

    if let Err(err) = command.run(ctx, &interaction).await {
        log_error!("Error in command /{}: {}", command.name(), err);

        // The command may already have deferred or answered, in which case only an edit works.
        if interaction.reply_private(ctx, FAILURE_REPLY).await.is_err() {
            if let Err(err) = interaction.answer(ctx, FAILURE_REPLY).await {
                log_warn!("Could not report failure of /{}: {}", command.name(), err);
            }
        }
    }
}
