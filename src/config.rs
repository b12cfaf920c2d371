use crate::{
    llm::LlmSettings,
    reminder::{MarkSentFailure, SchedulerSettings},
};
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/chimebot/config.toml";
const CONFIG_PATH_ENV: &str = "CHIMEBOT_CONFIG";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    pub database: Database,
    pub llm_general: LlmGeneral,
    pub llm_ask: LlmPrompt,
    pub llm_caption: LlmPrompt,
    pub llm_time: LlmPrompt,
    #[serde(default)]
    pub reminders: Reminders,
    #[serde(default)]
    pub caption: Caption,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    pub bot_owners: Vec<String>,
    /// `tracing_subscriber::EnvFilter` directives.  `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Database {
    /// e.g. `sqlite://chimebot.db`
    pub url: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct LlmGeneral {
    pub chat_url: String,
}

/// Model and prompt for one kind of LLM request.  `{{name}}` placeholders in `system` are filled
/// in per request.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct LlmPrompt {
    pub model_name: String,
    pub system: String,
    pub context_size: usize,
    pub temperature: f32,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Reminders {
    pub max_concurrent_sends: usize,
    pub retry_delay_seconds: u64,
    pub mark_sent_failure: MarkSentFailure,
    pub max_pending_per_user: usize,
    pub max_message_length: usize,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Caption {
    pub max_image_bytes: u32,
}

fn default_log_filter() -> String {
    "info".to_owned()
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            max_concurrent_sends: 8,
            retry_delay_seconds: 15,
            mark_sent_failure: MarkSentFailure::Drop,
            max_pending_per_user: 25,
            max_message_length: 1500,
        }
    }
}

impl Default for Caption {
    fn default() -> Self {
        Self {
            max_image_bytes: 8 * 1024 * 1024,
        }
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }
}

impl<'a> LlmPrompt {
    pub fn as_llm_settings(&'a self) -> LlmSettings<'a> {
        LlmSettings {
            model_name: &self.model_name,
            system: &self.system,
            context_size: self.context_size,
            temperature: self.temperature,
        }
    }
}

impl Reminders {
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            max_concurrent_sends: self.max_concurrent_sends,
            // Zero would retry failing sends in a tight loop.
            retry_delay: chrono::Duration::seconds(
                self.retry_delay_seconds.clamp(1, 86_400) as i64,
            ),
            mark_sent_failure: self.mark_sent_failure,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_sections_default() {
        let cfg = testing::config();

        assert_eq!(cfg.general.log_filter, "info");
        assert_eq!(cfg.reminders.max_concurrent_sends, 8);
        assert_eq!(cfg.reminders.mark_sent_failure, MarkSentFailure::Drop);
        assert_eq!(cfg.caption.max_image_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn reminder_section_overrides() {
        let contents = format!(
            "{}\n[reminders]\nretry_delay_seconds = 3\nmark_sent_failure = \"redeliver\"\n",
            testing::SAMPLE
        );
        let cfg = Config::parse(&contents).unwrap();
        let settings = cfg.reminders.scheduler_settings();

        assert_eq!(settings.retry_delay, chrono::Duration::seconds(3));
        assert_eq!(settings.mark_sent_failure, MarkSentFailure::Redeliver);
        // Unset keys keep their defaults.
        assert_eq!(cfg.reminders.max_pending_per_user, 25);
    }

    #[test]
    fn retry_delay_is_kept_within_bounds() {
        let parse = |seconds: u64| {
            let contents = format!(
                "{}\n[reminders]\nretry_delay_seconds = {}\n",
                testing::SAMPLE,
                seconds
            );
            Config::parse(&contents)
                .unwrap()
                .reminders
                .scheduler_settings()
                .retry_delay
        };

        assert_eq!(parse(0), chrono::Duration::seconds(1));
        assert_eq!(parse(1_000_000), chrono::Duration::days(1));
    }

    #[test]
    fn missing_required_section_is_an_error() {
        assert!(Config::parse("[general]\ndiscord_token = \"t\"\nbot_owners = []\n").is_err());
    }
}
