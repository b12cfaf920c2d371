use crate::{
    config::Config,
    interaction_log::InteractionLog,
    llm::ChatClient,
    reminder::{ReminderIndex, ReminderStore, TimeResolver},
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Collection of data that is shared across events
pub struct Context<'a> {
    // Chimebot's own context types
    pub cfg: &'a RwLock<Config>,
    pub store: &'a Arc<dyn ReminderStore>,
    pub index: &'a Arc<ReminderIndex>,
    pub time_resolver: &'a Arc<dyn TimeResolver>,
    pub llm: &'a Arc<dyn ChatClient>,
    pub interactions: &'a InteractionLog,
    // Discord/Serenity context types
    pub cache: &'a Arc<serenity::all::Cache>,
    pub http: &'a Arc<serenity::all::Http>,
    pub cache_http: &'a CacheHttp,
}

/// Many Serenity functions take a `impl CacheHttp` in order to first check the cache if the item
/// is available and fall back to an http request otherwise.  The most readily available type that
/// impl's this is named very differently in a way that could be confusing, and so we alias it.
pub type CacheHttp = serenity::all::Context;
