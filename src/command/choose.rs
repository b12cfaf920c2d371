use crate::{
    command::SlashCommand,
    context::Context,
    helper::{InteractionHelper, OptionsHelper},
};
use anyhow::{anyhow, Result};
use rand::{seq::SliceRandom, Rng};
use serenity::all::{CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption};

/// Picks one of several comma separated options
pub struct Choose;

/// `None` unless there are at least two non-empty options.
fn pick<'a>(options: &'a str, rng: &mut impl Rng) -> Option<&'a str> {
    let options: Vec<&str> = options
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();

    if options.len() < 2 {
        return None;
    }
    options.choose(rng).copied()
}

/// `pick` with the thread-local generator, which is released before returning.
fn pick_random(options: &str) -> Option<&str> {
    pick(options, &mut rand::thread_rng())
}

#[serenity::async_trait]
impl SlashCommand for Choose {
    fn name(&self) -> &'static str {
        "choose"
    }

    fn description(&self) -> &'static str {
        "Pick one of several options"
    }

    fn register(&self) -> CreateCommand {
        CreateCommand::new(self.name())
            .description(self.description())
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "options",
                    "Comma separated, e.g. `pizza, tacos, sushi`",
                )
                .required(true),
            )
    }

    async fn run(&self, ctx: &Context<'_>, interaction: &CommandInteraction) -> Result<()> {
        let options = interaction.data.options();
        let choices = options
            .string("options")
            .ok_or(anyhow!("/choose invoked without options"))?;

        let picked = pick_random(choices);
        match picked {
            Some(choice) => interaction.reply(ctx, choice).await,
            None => {
                interaction
                    .reply_private(ctx, "Give me at least two comma separated options.")
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn needs_two_options() {
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(pick("pizza", &mut rng), None);
        assert_eq!(pick("pizza, ,", &mut rng), None);
        assert_eq!(pick("", &mut rng), None);
    }

    #[test]
    fn picks_a_trimmed_option() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let choice = pick(" pizza ,tacos,  sushi", &mut rng).unwrap();
            assert!(["pizza", "tacos", "sushi"].contains(&choice));
        }
    }

    #[test]
    fn random_pick_can_be_held_across_awaits() {
        fn assert_send<F: std::future::Future + Send>(_: F) {}

        assert_send(async {
            let picked = pick_random("a,b");
            tokio::task::yield_now().await;
            picked
        });
        assert!(matches!(pick_random("a,b"), Some("a" | "b")));
    }

    #[test]
    fn every_option_can_win() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();

        for _ in 0..200 {
            seen.insert(pick("a,b,c", &mut rng).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }
}
