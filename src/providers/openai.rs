//! `OpenAI` chat completions client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::LanguageModel;
use crate::conversation::Message;
use crate::{Error, Result};

/// Default API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat completions over the `OpenAI` HTTP API
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiChat {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, base_url: Option<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::MissingCredential("OPENAI_API_KEY"));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn complete(&self, messages: &[Message], model: &str) -> Result<String> {
        tracing::debug!(model, messages = messages.len(), "chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&ChatRequest { model, messages })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Llm(format!("chat API error {status}: {body}")));
        }

        let result: ChatResponse = response.json().await?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm("chat API returned no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_missing_credential() {
        let err = OpenAiChat::new(SecretString::from(String::new()), None)
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingCredential("OPENAI_API_KEY")));
    }

    #[test]
    fn request_serializes_openai_shape() {
        let messages = [Message::system("be brief"), Message::user("hello")];
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
        })
        .unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[test]
    fn response_content_is_extracted() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Roger."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Roger."));
    }

    #[test]
    fn trailing_slash_trimmed_from_base_url() {
        let chat = OpenAiChat::new(
            SecretString::from("sk-test".to_string()),
            Some("http://localhost:8080/v1/".to_string()),
        )
        .unwrap();
        assert_eq!(chat.base_url, "http://localhost:8080/v1");
    }
}
