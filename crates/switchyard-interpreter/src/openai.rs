use crate::commands::{
    build_system_prompt, extension_for_content_type, normalize_language, parse_commands,
};
use crate::error::InterpreterError;
use crate::http::{check_status, read_json, request_error};
use crate::{Interpretation, Interpreter, TranscribeOptions, Transcription};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use switchyard_types::Instruction;
use tracing::debug;

const OPERATION_TRANSCRIBE: &str = "transcription";
const OPERATION_CHAT: &str = "chat completion";

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_transcription_model() -> String {
    "gpt-4o-transcribe".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o".to_string()
}

/// Hosted OpenAI settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Bearer token. `${VAR}` references are resolved by the config loader.
    #[serde(default)]
    pub api_key: String,
    /// API root; point it at any OpenAI-compatible gateway.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_completion_model")]
    pub completion_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            transcription_model: default_transcription_model(),
            completion_model: default_completion_model(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("transcription_model", &self.transcription_model)
            .field("completion_model", &self.completion_model)
            .finish()
    }
}

/// Interpreter backed by the OpenAI transcription and chat completion APIs.
#[derive(Clone)]
pub struct OpenAiInterpreter {
    client: Client,
    config: OpenAiConfig,
}

impl std::fmt::Debug for OpenAiInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiInterpreter")
            .field("config", &self.config)
            .finish()
    }
}

impl OpenAiInterpreter {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&str, InterpreterError> {
        let key = self.config.api_key.trim();
        if key.is_empty() {
            return Err(InterpreterError::Config(
                "OpenAI API key not configured".to_string(),
            ));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranscriptionResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[async_trait]
impl Interpreter for OpenAiInterpreter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        content_type: &str,
        options: &TranscribeOptions,
    ) -> Result<Transcription, InterpreterError> {
        let api_key = self.api_key()?;

        let filename = format!("audio.{}", extension_for_content_type(content_type));
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.config.transcription_model.clone());

        let mut form = Form::new()
            .part("file", Part::bytes(audio.to_vec()).file_name(filename))
            .text("model", model)
            .text("response_format", "verbose_json");
        if let Some(language) = options.language.clone().filter(|l| !l.is_empty()) {
            form = form.text("language", language);
        }
        if let Some(prompt) = options.prompt.clone().filter(|p| !p.is_empty()) {
            form = form.text("prompt", prompt);
        }

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(request_error(OPERATION_TRANSCRIBE))?;
        let response = check_status(OPERATION_TRANSCRIBE, response).await?;
        let result: TranscriptionResponse = read_json(OPERATION_TRANSCRIBE, response).await?;

        let language = result.language.as_deref().and_then(normalize_language);
        debug!(
            text_length = result.text.len(),
            language = ?language,
            "transcription complete"
        );
        Ok(Transcription {
            text: result.text,
            language,
        })
    }

    async fn interpret(
        &self,
        text: &str,
        instruction: &Instruction,
    ) -> Result<Interpretation, InterpreterError> {
        let api_key = self.api_key()?;
        let system_prompt = build_system_prompt(instruction);

        let request = ChatRequest {
            model: &self.config.completion_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature: 0.2,
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_error(OPERATION_CHAT))?;
        let response = check_status(OPERATION_CHAT, response).await?;
        let chat: ChatResponse = read_json(OPERATION_CHAT, response).await?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| InterpreterError::Decode {
                operation: OPERATION_CHAT,
                message: "no choices returned".to_string(),
            })?;

        let interpretation = parse_commands(&content)?;
        debug!(
            commands = interpretation.commands.len(),
            has_response = interpretation.response_text.is_some(),
            "interpretation complete"
        );
        Ok(interpretation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_api_key() {
        let interpreter = OpenAiInterpreter::new(OpenAiConfig {
            api_key: "sk-super-secret".to_string(),
            ..OpenAiConfig::default()
        });
        let debug_output = format!("{:?}", interpreter);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk-super-secret"));
    }

    #[test]
    fn url_joins_base() {
        let interpreter = OpenAiInterpreter::new(OpenAiConfig {
            base_url: "http://localhost:9000/v1/".to_string(),
            ..OpenAiConfig::default()
        });
        assert_eq!(
            interpreter.url("chat/completions"),
            "http://localhost:9000/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_request() {
        let interpreter = OpenAiInterpreter::new(OpenAiConfig::default());
        let err = interpreter
            .interpret("turn on the light", &Instruction::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InterpreterError::Config(_)));
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn config_defaults_from_toml() {
        let config: OpenAiConfig = toml::from_str(r#"api_key = "k""#).unwrap();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.transcription_model, "gpt-4o-transcribe");
        assert_eq!(config.completion_model, "gpt-4o");
    }
}
