use crate::{
    command::SlashCommand,
    context::Context,
    helper::{InteractionHelper, OptionsHelper},
    llm::{ChatClient, LlmChatRequest, LlmSettings},
};
use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serenity::all::{CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption};

const DEFAULT_PROMPT: &str = "Describe this image.";

/// Describes an uploaded image with the `llm_caption` model
pub struct Caption;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
enum ImageRejected {
    #[error("That doesn't look like an image.")]
    NotAnImage,
    #[error("That image is {size} bytes, the limit is {max}.")]
    TooLarge { size: u32, max: u32 },
}

fn check_image(content_type: Option<&str>, size: u32, max: u32) -> Result<(), ImageRejected> {
    if !content_type.is_some_and(|t| t.starts_with("image/")) {
        return Err(ImageRejected::NotAnImage);
    }
    if size > max {
        return Err(ImageRejected::TooLarge { size, max });
    }
    Ok(())
}

async fn caption(
    llm: &dyn ChatClient,
    settings: &LlmSettings<'_>,
    user_name: &str,
    prompt: &str,
    image: &[u8],
) -> Result<String> {
    let request = LlmChatRequest::new(settings, &[("user", user_name)])
        .user_with_images(prompt, vec![BASE64.encode(image)]);
    let answer = llm.chat(&request).await?;
    Ok(answer.trim().to_owned())
}

#[serenity::async_trait]
impl SlashCommand for Caption {
    fn name(&self) -> &'static str {
        "caption"
    }

    fn description(&self) -> &'static str {
        "Describe an image"
    }

    fn register(&self) -> CreateCommand {
        CreateCommand::new(self.name())
            .description(self.description())
            .add_option(
                CreateCommandOption::new(CommandOptionType::Attachment, "image", "Image to describe")
                    .required(true),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::String,
                "prompt",
                "What to ask about the image",
            ))
    }

    async fn run(&self, ctx: &Context<'_>, interaction: &CommandInteraction) -> Result<()> {
        let options = interaction.data.options();
        let image = options
            .attachment("image")
            .ok_or(anyhow!("/caption invoked without an image"))?;
        let prompt = options.string("prompt").unwrap_or(DEFAULT_PROMPT);

        let max = ctx.cfg.read().await.caption.max_image_bytes;
        if let Err(rejected) = check_image(image.content_type.as_deref(), image.size, max) {
            return interaction.reply_private(ctx, &rejected.to_string()).await;
        }

        interaction.thinking(ctx, false).await?;

        let bytes = image.download().await?;
        let settings = ctx.cfg.read().await.llm_caption.clone();
        let answer = caption(
            ctx.llm.as_ref(),
            &settings.as_llm_settings(),
            interaction.user.display_name(),
            prompt,
            &bytes,
        )
        .await?;

        interaction.answer(ctx, &answer).await
    }
}
