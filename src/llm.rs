use crate::{config::Config, log_internal};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

/// LLM generation settings
pub struct LlmSettings<'a> {
    pub model_name: &'a str,
    pub system: &'a str,
    pub context_size: usize,
    pub temperature: f32,
}

#[derive(serde::Serialize)]
pub struct LlmChatRequest {
    /// LLM model name
    model: String,
    /// Whether to stream one token at a time, or return entire response is one go
    stream: bool,
    /// Chat conversation to continue.
    messages: Vec<ChatMessage>,
    options: ChatOptions,
}

#[derive(serde::Serialize)]
struct ChatOptions {
    /// Context size
    num_ctx: usize,
    /// LLM temperature
    temperature: f32,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ChatMessage {
    role: ChatMessageRole,
    content: String,
    /// Base64 encoded images, for multimodal models.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[allow(non_camel_case_types)] // Serialized literally; case matters
#[derive(serde::Serialize, serde::Deserialize)]
enum ChatMessageRole {
    system,
    user,
    assistant,
}

#[derive(serde::Deserialize)]
struct LlmChatResponse {
    message: ChatMessage,
}

impl LlmChatRequest {
    /// Start a conversation.  `{{name}}` placeholders in the system prompt are replaced from
    /// `vars`.
    pub fn new(settings: &LlmSettings<'_>, vars: &[(&str, &str)]) -> Self {
        let system = vars.iter().fold(settings.system.to_owned(), |acc, (k, v)| {
            acc.replace(&format!("{{{{{}}}}}", k), v)
        });

        Self {
            model: settings.model_name.to_owned(),
            stream: false,
            messages: vec![ChatMessage {
                role: ChatMessageRole::system,
                content: system,
                images: Vec::new(),
            }],
            options: ChatOptions {
                num_ctx: settings.context_size,
                temperature: settings.temperature,
            },
        }
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.user_with_images(content, Vec::new())
    }

    pub fn user_with_images(mut self, content: impl Into<String>, images: Vec<String>) -> Self {
        self.messages.push(ChatMessage {
            role: ChatMessageRole::user,
            content: content.into(),
            images,
        });
        self
    }
}

/// Anything that can answer a chat request.
#[serenity::async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, request: &LlmChatRequest) -> Result<String>;
}

/// Ollama-compatible `/api/chat` endpoint from `llm_general.chat_url`.
pub struct OllamaClient {
    http: reqwest::Client,
    cfg: Arc<RwLock<Config>>,
}

impl OllamaClient {
    pub fn new(cfg: Arc<RwLock<Config>>) -> Self {
        Self {
            http: reqwest::Client::new(),
            cfg,
        }
    }
}

#[serenity::async_trait]
impl ChatClient for OllamaClient {
    async fn chat(&self, request: &LlmChatRequest) -> Result<String> {
        // Don't hold the config lock across the request.
        let url = self.cfg.read().await.llm_general.chat_url.clone();

        log_internal!("Sending request to chat endpoint {}... ", url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<LlmChatResponse>()
            .await?;
        log_internal!("Sending request to chat endpoint {}... done", url);

        Ok(response.message.content)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned answers and records the requests it saw.
    #[derive(Default)]
    pub struct FakeChat {
        pub answers: Mutex<Vec<Result<String>>>,
        pub requests: Mutex<Vec<serde_json::Value>>,
    }

    impl FakeChat {
        pub fn answering(answer: &str) -> Self {
            Self {
                answers: Mutex::new(vec![Ok(answer.to_owned())]),
                ..Self::default()
            }
        }
    }

    #[serenity::async_trait]
    impl ChatClient for FakeChat {
        async fn chat(&self, request: &LlmChatRequest) -> Result<String> {
            self.requests
                .lock()
                .unwrap()
                .push(serde_json::to_value(request)?);
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no answer queued")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LlmSettings<'static> {
        LlmSettings {
            model_name: "llava",
            system: "You are {{bot}}. It is {{now}}.",
            context_size: 4096,
            temperature: 0.3,
        }
    }

    #[test]
    fn system_prompt_is_templated() {
        let request = LlmChatRequest::new(&settings(), &[("bot", "chime"), ("now", "noon")])
            .user("hello");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "llava");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_ctx"], 4096);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "You are chime. It is noon.");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn images_are_only_sent_when_present() {
        let request = LlmChatRequest::new(&settings(), &[])
            .user_with_images("what is this?", vec!["aGVsbG8=".to_owned()]);
        let json = serde_json::to_value(&request).unwrap();

        assert!(json["messages"][0].get("images").is_none());
        assert_eq!(json["messages"][1]["images"][0], "aGVsbG8=");
    }
}
