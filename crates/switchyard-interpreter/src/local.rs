//! Self-hosted backend: any Whisper-compatible transcription server plus an
//! OpenAI-compatible chat endpoint or Ollama's `/api/generate`.

use crate::commands::{
    build_system_prompt, extension_for_content_type, normalize_language, parse_commands,
};
use crate::error::InterpreterError;
use crate::http::{check_status, read_json, read_text, request_error};
use crate::openai::TranscriptionResponse;
use crate::{Interpretation, Interpreter, TranscribeOptions, Transcription};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use switchyard_types::Instruction;
use tracing::debug;

const OPERATION_TRANSCRIBE: &str = "local transcription";
const OPERATION_LLM: &str = "local LLM";

/// Suffix selecting Ollama's native generate format.
const OLLAMA_GENERATE_SUFFIX: &str = "/api/generate";

/// Wire flavour of the transcription server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperType {
    /// OpenAI-compatible `/v1/audio/transcriptions` (whisper.cpp, faster-whisper).
    #[default]
    Openai,
    /// whisper-asr-webservice `POST /asr` with query parameters.
    Asr,
}

fn default_whisper_endpoint() -> String {
    "http://localhost:8000/v1/audio/transcriptions".to_string()
}

fn default_llm_endpoint() -> String {
    "http://localhost:11434/api/generate".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_whisper_endpoint")]
    pub whisper_endpoint: String,
    #[serde(default)]
    pub whisper_type: WhisperType,
    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    /// Asks the ASR service to drop silent segments. Ignored by the
    /// `openai` flavour.
    #[serde(default)]
    pub vad_filter: bool,
    /// Language used when a call passes none.
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            whisper_endpoint: default_whisper_endpoint(),
            whisper_type: WhisperType::default(),
            llm_endpoint: default_llm_endpoint(),
            llm_model: default_llm_model(),
            vad_filter: false,
            language: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalInterpreter {
    client: Client,
    config: LocalConfig,
}

impl LocalInterpreter {
    pub fn new(config: LocalConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn language<'a>(&'a self, options: &'a TranscribeOptions) -> Option<&'a str> {
        let non_empty = |l: &&str| !l.trim().is_empty();
        options
            .language
            .as_deref()
            .filter(non_empty)
            .or(self.config.language.as_deref().filter(non_empty))
    }

    fn uses_ollama_generate(&self) -> bool {
        self.config
            .llm_endpoint
            .trim_end_matches('/')
            .ends_with(OLLAMA_GENERATE_SUFFIX)
    }

    async fn transcribe_openai(
        &self,
        audio: &[u8],
        content_type: &str,
        options: &TranscribeOptions,
    ) -> Result<reqwest::Response, InterpreterError> {
        let filename = format!("audio.{}", extension_for_content_type(content_type));
        let mut form = Form::new().part("file", Part::bytes(audio.to_vec()).file_name(filename));
        if let Some(model) = options.model.clone().filter(|m| !m.is_empty()) {
            form = form.text("model", model);
        }
        if let Some(language) = self.language(options) {
            form = form.text("language", language.to_string());
        }
        form = form.text("response_format", "verbose_json");

        self.client
            .post(&self.config.whisper_endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(request_error(OPERATION_TRANSCRIBE))
    }

    async fn transcribe_asr(
        &self,
        audio: &[u8],
        content_type: &str,
        options: &TranscribeOptions,
    ) -> Result<reqwest::Response, InterpreterError> {
        let filename = format!("audio.{}", extension_for_content_type(content_type));
        let form = Form::new().part("audio_file", Part::bytes(audio.to_vec()).file_name(filename));

        let mut query: Vec<(&str, &str)> = vec![
            ("task", "transcribe"),
            ("output", "verbose_json"),
            ("encode", "true"),
        ];
        if let Some(language) = self.language(options) {
            query.push(("language", language));
        }
        if let Some(prompt) = options.prompt.as_deref().filter(|p| !p.is_empty()) {
            query.push(("initial_prompt", prompt));
        }
        if self.config.vad_filter {
            query.push(("vad_filter", "true"));
        }

        debug!(endpoint = %self.config.whisper_endpoint, "whisper-asr request");
        self.client
            .post(&self.config.whisper_endpoint)
            .query(&query)
            .multipart(form)
            .send()
            .await
            .map_err(request_error(OPERATION_TRANSCRIBE))
    }

    fn llm_request_body(&self, system_prompt: &str, text: &str) -> Value {
        if self.uses_ollama_generate() {
            json!({
                "model": self.config.llm_model,
                "system": system_prompt,
                "prompt": text,
                "stream": false,
                "format": "json",
            })
        } else {
            json!({
                "model": self.config.llm_model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": text},
                ],
                "temperature": 0.2,
                "stream": false,
            })
        }
    }
}

/// Pulls the model text out of a chat, Ollama, or plain-text reply.
pub fn extract_content(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(content) = value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
        {
            return content.to_string();
        }
        if let Some(response) = value
            .get("response")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
        {
            return response.to_string();
        }
    }
    body.to_string()
}

#[async_trait]
impl Interpreter for LocalInterpreter {
    fn name(&self) -> &str {
        "local"
    }

    async fn transcribe(
        &self,
        audio: &[u8],
        content_type: &str,
        options: &TranscribeOptions,
    ) -> Result<Transcription, InterpreterError> {
        let response = match self.config.whisper_type {
            WhisperType::Openai => self.transcribe_openai(audio, content_type, options).await?,
            WhisperType::Asr => self.transcribe_asr(audio, content_type, options).await?,
        };
        let response = check_status(OPERATION_TRANSCRIBE, response).await?;
        let result: TranscriptionResponse = read_json(OPERATION_TRANSCRIBE, response).await?;

        let language = result.language.as_deref().and_then(normalize_language);
        debug!(
            text_length = result.text.len(),
            language = ?language,
            flavour = ?self.config.whisper_type,
            "local transcription complete"
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
        let system_prompt = build_system_prompt(instruction);
        let body = self.llm_request_body(&system_prompt, text);

        let response = self
            .client
            .post(&self.config.llm_endpoint)
            .json(&body)
            .send()
            .await
            .map_err(request_error(OPERATION_LLM))?;
        let response = check_status(OPERATION_LLM, response).await?;
        let raw = read_text(OPERATION_LLM, response).await?;

        let content = extract_content(&raw);
        if content.trim().is_empty() {
            return Err(InterpreterError::Decode {
                operation: OPERATION_LLM,
                message: "empty response".to_string(),
            });
        }

        let interpretation = parse_commands(&content)?;
        debug!(
            commands = interpretation.commands.len(),
            has_response = interpretation.response_text.is_some(),
            "local interpretation complete"
        );
        Ok(interpretation)
    }
}
