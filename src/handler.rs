use crate::{
    config::Config,
    context::Context,
    event::Event,
    interaction_log::InteractionLog,
    llm::ChatClient,
    reminder::{ReminderIndex, ReminderStore, TimeResolver},
};
use serenity::all::{Interaction, Ready};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Discord event handler
pub struct Handler {
    cfg: Arc<RwLock<Config>>,
    store: Arc<dyn ReminderStore>,
    index: Arc<ReminderIndex>,
    time_resolver: Arc<dyn TimeResolver>,
    llm: Arc<dyn ChatClient>,
    interactions: InteractionLog,
}

impl<'a> Handler {
    pub fn new(
        cfg: Arc<RwLock<Config>>,
        store: Arc<dyn ReminderStore>,
        index: Arc<ReminderIndex>,
        time_resolver: Arc<dyn TimeResolver>,
        llm: Arc<dyn ChatClient>,
        interactions: InteractionLog,
    ) -> Self {
        Self {
            cfg,
            store,
            index,
            time_resolver,
            llm,
            interactions,
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            store: &self.store,
            index: &self.index,
            time_resolver: &self.time_resolver,
            llm: &self.llm,
            interactions: &self.interactions,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn interaction_create(&self, discord_ctx: serenity::all::Context, interaction: Interaction) {
        // Only slash commands are registered, so nothing else should arrive.
        if let Interaction::Command(command) = interaction {
            Event::Command(command)
                .handle(self.ctx(&discord_ctx))
                .await;
        }
    }
}
