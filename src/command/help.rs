use crate::{command::SlashCommand, context::Context, helper::InteractionHelper};
use anyhow::Result;
use serenity::all::CommandInteraction;

pub struct Help;

fn usage() -> String {
    let mut reply = String::new();
    reply.push_str("```\n");
    reply.push_str("Commands:\n");
    for command in crate::command::commands() {
        reply.push_str(&format!("/{} - {}\n", command.name(), command.description()));
    }
    reply.push_str("```\n");
    reply
}

#[serenity::async_trait]
impl SlashCommand for Help {
    fn name(&self) -> &'static str {
        "help"
    }

    fn description(&self) -> &'static str {
        "Show this help message"
    }

    async fn run(&self, ctx: &Context<'_>, interaction: &CommandInteraction) -> Result<()> {
        interaction.reply_private(ctx, &usage()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_command() {
        let usage = usage();
        for command in crate::command::commands() {
            assert!(usage.contains(&format!("/{} - ", command.name())));
        }
    }
}
