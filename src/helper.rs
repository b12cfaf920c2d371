//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::Result;
use serenity::all::{
    Attachment, CommandInteraction, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse, ResolvedOption, ResolvedValue,
};

/// Discord rejects messages longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Cut `text` down to something Discord will accept, marking the cut.
pub fn fit_discord_message(text: &str) -> String {
    if text.chars().count() <= DISCORD_MESSAGE_LIMIT {
        return text.to_owned();
    }

    let mut fitted: String = text.chars().take(DISCORD_MESSAGE_LIMIT - 1).collect();
    fitted.push('…');
    fitted
}

/// Typed lookups into resolved slash command options.
pub trait OptionsHelper<'a> {
    fn string(&self, name: &str) -> Option<&'a str>;
    fn integer(&self, name: &str) -> Option<i64>;
    fn attachment(&self, name: &str) -> Option<&'a Attachment>;
    /// Name and options of the invoked subcommand, if any.
    fn subcommand(&self) -> Option<(&'a str, &[ResolvedOption<'a>])>;
}

impl<'a> OptionsHelper<'a> for [ResolvedOption<'a>] {
    fn string(&self, name: &str) -> Option<&'a str> {
        self.iter().find_map(|opt| match opt.value {
            ResolvedValue::String(s) if opt.name == name => Some(s),
            _ => None,
        })
    }

    fn integer(&self, name: &str) -> Option<i64> {
        self.iter().find_map(|opt| match opt.value {
            ResolvedValue::Integer(i) if opt.name == name => Some(i),
            _ => None,
        })
    }

    fn attachment(&self, name: &str) -> Option<&'a Attachment> {
        self.iter().find_map(|opt| match opt.value {
            ResolvedValue::Attachment(a) if opt.name == name => Some(a),
            _ => None,
        })
    }

    fn subcommand(&self) -> Option<(&'a str, &[ResolvedOption<'a>])> {
        self.iter().find_map(|opt| match &opt.value {
            ResolvedValue::SubCommand(options) => Some((opt.name, options.as_slice())),
            _ => None,
        })
    }
}

/// One-line `name=value` rendering of options, for logs.
pub fn summarize_options(options: &[ResolvedOption<'_>]) -> String {
    options
        .iter()
        .map(|opt| match &opt.value {
            ResolvedValue::String(s) => format!("{}={:?}", opt.name, s),
            ResolvedValue::Integer(i) => format!("{}={}", opt.name, i),
            ResolvedValue::Number(n) => format!("{}={}", opt.name, n),
            ResolvedValue::Boolean(b) => format!("{}={}", opt.name, b),
            ResolvedValue::Attachment(a) => format!("{}=<{}>", opt.name, a.filename),
            ResolvedValue::User(u, _) => format!("{}=@{}", opt.name, u.name),
            ResolvedValue::SubCommand(inner) | ResolvedValue::SubCommandGroup(inner) => {
                format!("{} {}", opt.name, summarize_options(inner))
                    .trim_end()
                    .to_owned()
            }
            _ => format!("{}=?", opt.name),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[serenity::async_trait]
pub trait InteractionHelper {
    /// Answer immediately.
    async fn reply(&self, ctx: &Context, content: &str) -> Result<()>;
    /// Answer immediately, visible only to the caller.
    async fn reply_private(&self, ctx: &Context, content: &str) -> Result<()>;
    /// Tell Discord an answer is coming.  Required before anything slow, e.g. LLM calls.
    async fn thinking(&self, ctx: &Context, private: bool) -> Result<()>;
    /// Fill in the answer after `thinking`.
    async fn answer(&self, ctx: &Context, content: &str) -> Result<()>;
    async fn is_from_owner(&self, ctx: &Context) -> bool;
}

#[serenity::async_trait]
impl InteractionHelper for CommandInteraction {
    async fn reply(&self, ctx: &Context, content: &str) -> Result<()> {
        let message = CreateInteractionResponseMessage::new().content(fit_discord_message(content));
        self.create_response(ctx.cache_http, CreateInteractionResponse::Message(message))
            .await?;
        Ok(())
    }

    async fn reply_private(&self, ctx: &Context, content: &str) -> Result<()> {
        let message = CreateInteractionResponseMessage::new()
            .content(fit_discord_message(content))
            .ephemeral(true);
        self.create_response(ctx.cache_http, CreateInteractionResponse::Message(message))
            .await?;
        Ok(())
    }

    async fn thinking(&self, ctx: &Context, private: bool) -> Result<()> {
        if private {
            self.defer_ephemeral(ctx.cache_http).await?;
        } else {
            self.defer(ctx.cache_http).await?;
        }
        Ok(())
    }

    async fn answer(&self, ctx: &Context, content: &str) -> Result<()> {
        let edit = EditInteractionResponse::new().content(fit_discord_message(content));
        self.edit_response(ctx.cache_http, edit).await?;
        Ok(())
    }

    async fn is_from_owner(&self, ctx: &Context) -> bool {
        ctx.cfg
            .read()
            .await
            .general
            .bot_owners
            .contains(&self.user.name)
    }
}
