use crate::{
    command::SlashCommand,
    context::Context,
    helper::{InteractionHelper, OptionsHelper},
    interaction_log::InteractionEntry,
};
use anyhow::Result;
use serenity::all::{CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 25;

/// Shows the caller their recent slash command history
pub struct Interactions;

fn clamp_limit(requested: Option<i64>) -> u32 {
    requested.map_or(DEFAULT_LIMIT, |n| n.clamp(1, MAX_LIMIT as i64) as u32)
}

fn format_history(entries: &[InteractionEntry]) -> String {
    if entries.is_empty() {
        return "No interactions recorded yet.".to_owned();
    }

    let mut reply = String::from("Your recent commands:\n");
    for entry in entries {
        reply.push_str(&format!(
            "<t:{}:f> `/{}` {}\n",
            entry.created_at.timestamp(),
            entry.command,
            entry.options
        ));
    }
    reply
}

#[serenity::async_trait]
impl SlashCommand for Interactions {
    fn name(&self) -> &'static str {
        "interactions"
    }

    fn description(&self) -> &'static str {
        "Show your recent commands"
    }

    fn register(&self) -> CreateCommand {
        CreateCommand::new(self.name())
            .description(self.description())
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "limit", "How many to show")
                    .min_int_value(1)
                    .max_int_value(MAX_LIMIT.into()),
            )
    }

    async fn run(&self, ctx: &Context<'_>, interaction: &CommandInteraction) -> Result<()> {
        let options = interaction.data.options();
        let limit = clamp_limit(options.integer("limit"));

        let entries = ctx
            .interactions
            .recent_for_user(interaction.user.id.get(), limit)
            .await?;
        interaction
            .reply_private(ctx, &format_history(&entries))
            .await
    }
}
