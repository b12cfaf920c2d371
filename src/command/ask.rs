use crate::{
    command::SlashCommand,
    context::Context,
    helper::{InteractionHelper, OptionsHelper},
    llm::{ChatClient, LlmChatRequest, LlmSettings},
};
use anyhow::{anyhow, Result};
use serenity::all::{CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption};

/// Free-form question answered by the `llm_ask` model
pub struct Ask;

async fn ask(
    llm: &dyn ChatClient,
    settings: &LlmSettings<'_>,
    bot_name: &str,
    user_name: &str,
    question: &str,
) -> Result<String> {
    let request = LlmChatRequest::new(settings, &[("bot", bot_name), ("user", user_name)])
        .user(question);
    let answer = llm.chat(&request).await?;

    let answer = answer.trim();
    if answer.is_empty() {
        return Err(anyhow!("LLM returned an empty answer"));
    }
    Ok(answer.to_owned())
}

#[serenity::async_trait]
impl SlashCommand for Ask {
    fn name(&self) -> &'static str {
        "ask"
    }

    fn description(&self) -> &'static str {
        "Ask the bot a question"
    }

    fn register(&self) -> CreateCommand {
        CreateCommand::new(self.name())
            .description(self.description())
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "question", "Your question")
                    .required(true),
            )
    }

    async fn run(&self, ctx: &Context<'_>, interaction: &CommandInteraction) -> Result<()> {
        let options = interaction.data.options();
        let question = options
            .string("question")
            .ok_or(anyhow!("/ask invoked without a question"))?;

        // Model responses can take a while; Discord wants an acknowledgement within 3 seconds.
        interaction.thinking(ctx, false).await?;

        let bot_name = ctx.cache.current_user().name.clone();
        let prompt = ctx.cfg.read().await.llm_ask.clone();
        let answer = ask(
            ctx.llm.as_ref(),
            &prompt.as_llm_settings(),
            &bot_name,
            interaction.user.display_name(),
            question,
        )
        .await?;

        interaction.answer(ctx, &answer).await
    }
}
