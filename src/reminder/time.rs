//! Turning what users type ("in 20m", "tomorrow at 9") into an absolute UTC time.

use crate::{
    config::Config,
    llm::{ChatClient, LlmChatRequest},
    log_internal, log_warn,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;

#[serenity::async_trait]
pub trait TimeResolver: Send + Sync {
    /// `None` when the expression is ambiguous or cannot be understood.
    async fn resolve(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

static RELATIVE_WHOLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:in\s+)?(?:\d+\s*[a-z]+\s*)+$").expect("relative time pattern is valid")
});
static RELATIVE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*([a-z]+)").expect("relative part pattern is valid"));

/// Parse short relative durations: `30s`, `10m`, `2h`, `1d`, `1w`, compounds like `1h30m`, spelled
/// out units like `5 minutes`, optionally prefixed with `in`.
pub fn parse_relative(text: &str) -> Option<Duration> {
    let text = text.trim().to_ascii_lowercase();
    if !RELATIVE_WHOLE.is_match(&text) {
        return None;
    }

    let mut total = Duration::zero();
    for part in RELATIVE_PART.captures_iter(&text) {
        let value: i64 = part[1].parse().ok()?;
        let unit = match &part[2] {
            "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(value)?,
            "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(value)?,
            "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(value)?,
            "d" | "day" | "days" => Duration::try_days(value)?,
            "w" | "week" | "weeks" => Duration::try_weeks(value)?,
            // "in" is only allowed as the prefix
            _ => return None,
        };
        total = total.checked_add(&unit)?;
    }

    (total > Duration::zero()).then_some(total)
}

/// Resolves relative durations locally and hands everything else to the `llm_time` model, which
/// is asked to answer with a single RFC 3339 timestamp or `NONE`.
pub struct LlmTimeResolver {
    llm: Arc<dyn ChatClient>,
    cfg: Arc<RwLock<Config>>,
}

impl LlmTimeResolver {
    pub fn new(llm: Arc<dyn ChatClient>, cfg: Arc<RwLock<Config>>) -> Self {
        Self { llm, cfg }
    }

    async fn ask_model(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let now_str = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let request = {
            let cfg = self.cfg.read().await;
            LlmChatRequest::new(&cfg.llm_time.as_llm_settings(), &[("now", &now_str)]).user(text)
        };

        let answer = match self.llm.chat(&request).await {
            Ok(answer) => answer,
            Err(e) => {
                log_warn!("Time resolution request failed: {}", e);
                return None;
            }
        };

        let parsed = parse_model_answer(&answer);
        log_internal!("Resolved \"{}\" to {:?}", text, parsed);
        parsed
    }
}

/// Models like to decorate answers with quotes, code fences or trailing prose.  Take the first
/// token that parses.
fn parse_model_answer(answer: &str) -> Option<DateTime<Utc>> {
    answer
        .split(|c: char| c.is_whitespace() || c == '`' || c == '"')
        .filter(|token| !token.is_empty())
        .find_map(|token| DateTime::parse_from_rfc3339(token).ok())
        .map(|at| at.with_timezone(&Utc))
}

#[serenity::async_trait]
impl TimeResolver for LlmTimeResolver {
    async fn resolve(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(offset) = parse_relative(text) {
            return now.checked_add_signed(offset);
        }
        self.ask_model(text, now).await
    }
}
