use crate::{command::SlashCommand, context::Context, helper::InteractionHelper, log_internal};
use anyhow::Result;
use serenity::all::CommandInteraction;

pub struct Reload;

#[serenity::async_trait]
impl SlashCommand for Reload {
    fn name(&self) -> &'static str {
        "reload"
    }

    fn description(&self) -> &'static str {
        "Reload configuration (bot owner only)"
    }

    async fn run(&self, ctx: &Context<'_>, interaction: &CommandInteraction) -> Result<()> {
        if !interaction.is_from_owner(ctx).await {
            return interaction
                .reply_private(ctx, "Only bot owners can reload the configuration.")
                .await;
        }

        // Failures leave the current configuration in place.
        let response = match ctx.cfg.write().await.reload().await {
            Ok(()) => {
                log_internal!("Configuration reloaded by {}", interaction.user.name);
                "Configuration reloaded successfully".to_owned()
            }
            Err(err) => format!("Could not reload configuration: {}", err),
        };

        interaction.reply_private(ctx, &response).await
    }
}
