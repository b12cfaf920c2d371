use crate::context::Context;
use anyhow::Result;
use serenity::all::{CommandInteraction, CreateCommand};

mod ask;
mod caption;
mod choose;
mod help;
mod interactions;
mod reload;
mod remind;

#[serenity::async_trait]
pub trait SlashCommand: Sync + Send {
    /// Command name as typed after the slash.  Must be unique.
    fn name(&self) -> &'static str;
    /// One line shown in Discord's command picker and in `/help`.
    fn description(&self) -> &'static str;
    /// Registration payload pushed to Discord on ready.
    fn register(&self) -> CreateCommand {
        CreateCommand::new(self.name()).description(self.description())
    }
    /// Answer the interaction.  Errors are logged and reported to the user by the caller.
    async fn run(&self, ctx: &Context<'_>, interaction: &CommandInteraction) -> Result<()>;
}

/// Ordered list of available commands
pub fn commands() -> Vec<Box<dyn SlashCommand>> {
    vec![
        // Reminders
        Box::new(remind::Remind),
        // LLM
        Box::new(ask::Ask),
        Box::new(caption::Caption),
        // Random stuff
        Box::new(choose::Choose),
        // Core bot operations
        Box::new(interactions::Interactions),
        Box::new(help::Help),
        Box::new(reload::Reload),
    ]
}

pub fn find(name: &str) -> Option<Box<dyn SlashCommand>> {
    commands().into_iter().find(|command| command.name() == name)
}
