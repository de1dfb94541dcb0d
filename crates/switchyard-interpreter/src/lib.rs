//! Speech-to-command interpretation.
//!
//! An [`Interpreter`] turns audio into a transcript and a transcript plus an
//! [`Instruction`] into structured [`Command`]s. Two backends ship:
//! [`OpenAiInterpreter`] for the hosted OpenAI APIs and [`LocalInterpreter`]
//! for self-hosted Whisper and Ollama-style model servers.

pub mod commands;
pub mod error;
mod http;
pub mod local;
pub mod openai;

use async_trait::async_trait;
use switchyard_types::{Command, Instruction};

pub use commands::{build_system_prompt, normalize_language, parse_commands};
pub use error::InterpreterError;
pub use local::{LocalConfig, LocalInterpreter, WhisperType};
pub use openai::{OpenAiConfig, OpenAiInterpreter};

/// Per-call transcription hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscribeOptions {
    /// ISO-639-1 code guiding recognition.
    pub language: Option<String>,
    /// Domain vocabulary to improve recognition.
    pub prompt: Option<String>,
    /// Overrides the backend's configured model.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    /// ISO-639-1 code, when the backend reports one.
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    pub commands: Vec<Command>,
    /// Short confirmation in the user's language.
    pub response_text: Option<String>,
}

/// Audio transcription and command generation backend.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Backend identifier (`openai`, `local`).
    fn name(&self) -> &str;

    async fn transcribe(
        &self,
        audio: &[u8],
        content_type: &str,
        options: &TranscribeOptions,
    ) -> Result<Transcription, InterpreterError>;

    async fn interpret(
        &self,
        text: &str,
        instruction: &Instruction,
    ) -> Result<Interpretation, InterpreterError>;

    async fn close(&self) -> Result<(), InterpreterError> {
        Ok(())
    }
}
