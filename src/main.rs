mod command;
mod config;
mod context;
mod db;
mod event;
mod handler;
mod helper;
mod interaction_log;
mod llm;
mod logging;
mod reminder;
mod shutdown;

use crate::{
    config::Config,
    interaction_log::InteractionLog,
    llm::{ChatClient, OllamaClient},
    reminder::{
        DiscordSink, LlmTimeResolver, ReminderIndex, ReminderScheduler, ReminderStore,
        SqliteReminderStore, TimeResolver,
    },
};
use serenity::{all::GatewayIntents, Client};
use std::sync::Arc;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().await?;
    logging::init(&cfg.general.log_filter)?;

    let token = cfg.general.discord_token.clone();
    let scheduler_settings = cfg.reminders.scheduler_settings();
    let pool = db::connect(&cfg.database.url).await?;
    let cfg = Arc::new(RwLock::new(cfg));

    let store: Arc<dyn ReminderStore> = Arc::new(SqliteReminderStore::new(pool.clone()));
    let index = Arc::new(ReminderIndex::new());
    let llm: Arc<dyn ChatClient> = Arc::new(OllamaClient::new(cfg.clone()));
    let time_resolver: Arc<dyn TimeResolver> =
        Arc::new(LlmTimeResolver::new(llm.clone(), cfg.clone()));
    let handler = handler::Handler::new(
        cfg,
        store.clone(),
        index.clone(),
        time_resolver,
        llm,
        InteractionLog::new(pool),
    );

    // Slash commands arrive as interactions, which need no privileged intents.
    let intents = GatewayIntents::GUILDS;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;

    let sink = Arc::new(DiscordSink::new(client.http.clone()));
    let scheduler = ReminderScheduler::new(index, store, sink, scheduler_settings).start();

    let shard_manager = client.shard_manager.clone();
    let result = tokio::select! {
        result = client.start() => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            log_internal!("Interrupted, shutting down");
            shard_manager.shutdown_all().await;
            Ok(())
        }
    };

    scheduler.stop().await;
    result
}
