//! Message, instruction, command and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output the caller wants back besides the dispatched commands.
///
/// The caller declares the desired modalities in the request; the dispatcher
/// populates or omits the response fields of [`DispatchResult`] accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseMode {
    /// No natural-language output, dispatch results only.
    #[serde(rename = "none")]
    None,
    /// Text response only.
    #[serde(rename = "text")]
    Text,
    /// Synthesized audio only.
    #[serde(rename = "audio")]
    Audio,
    /// Both text and synthesized audio.
    #[serde(rename = "text+audio")]
    TextAudio,
}

impl ResponseMode {
    /// Returns the wire label for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Text => "text",
            Self::Audio => "audio",
            Self::TextAudio => "text+audio",
        }
    }

    /// True for `text` and `text+audio`.
    pub fn wants_text(self) -> bool {
        matches!(self, Self::Text | Self::TextAudio)
    }

    /// True for `audio` and `text+audio`.
    pub fn wants_audio(self) -> bool {
        matches!(self, Self::Audio | Self::TextAudio)
    }
}

impl std::fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResponseMode {
    type Err = ParseResponseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "text" => Ok(Self::Text),
            "audio" => Ok(Self::Audio),
            "text+audio" => Ok(Self::TextAudio),
            _ => Err(ParseResponseModeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized response mode string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized response mode: {0:?}")]
pub struct ParseResponseModeError(pub String);

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// An inbound request received by a delivery channel.
///
/// Audio and text are alternative inputs. Audio wins when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (UUID v4 when the sender supplies none).
    #[serde(default = "new_message_id")]
    pub id: String,
    /// Sender identifier (e.g. `robot-arm-01`, `phone-alice`).
    #[serde(default)]
    pub source: String,
    /// Raw audio payload; empty for text-only messages.
    #[serde(
        default,
        with = "crate::encoding::base64_bytes",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub audio: Vec<u8>,
    /// MIME type of `audio` (e.g. `audio/wav`, `audio/ogg`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Pre-transcribed text input, bypasses transcription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// How to interpret and route the message.
    #[serde(default)]
    pub instruction: Instruction,
    /// When the message was received.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a text message received now.
    pub fn from_text(
        source: impl Into<String>,
        text: impl Into<String>,
        instruction: Instruction,
    ) -> Self {
        Self {
            id: new_message_id(),
            source: source.into(),
            audio: Vec::new(),
            content_type: None,
            text: Some(text.into()),
            instruction,
            timestamp: Utc::now(),
        }
    }

    /// Creates an audio message received now.
    pub fn from_audio(
        source: impl Into<String>,
        audio: Vec<u8>,
        content_type: impl Into<String>,
        instruction: Instruction,
    ) -> Self {
        Self {
            id: new_message_id(),
            source: source.into(),
            audio,
            content_type: Some(content_type.into()),
            text: None,
            instruction,
            timestamp: Utc::now(),
        }
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Returns the text input when it is present and non-empty.
    pub fn text_input(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }

    /// Returns the audio MIME type, or an empty string when unknown.
    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or_default()
    }
}

/// Per-message directive: routing targets, command schema and response mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Services that receive the interpreted commands. The sender always
    /// receives the result regardless of this list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,
    /// Desired command schema (e.g. `homeassistant`, `json`, `ros2`).
    #[serde(default)]
    pub command_format: String,
    /// Requested response mode, kept verbatim. Unrecognized values resolve
    /// to the dispatcher default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_mode: String,
    /// Additional context for the interpreter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Instruction {
    /// Returns the requested mode when it is one of the recognized values.
    pub fn requested_response_mode(&self) -> Option<ResponseMode> {
        self.response_mode.parse().ok()
    }
}

/// A downstream service that should receive the dispatch result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Human-readable identifier (e.g. `homeassistant`, `robot`).
    pub service_name: String,
    /// Address understood by the delivery channel.
    pub endpoint: String,
    /// Delivery channel name (`http`, `grpc`, `mqtt`).
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_template: Option<String>,
}

/// A single structured command produced by the interpreter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command verb (e.g. `turn_on`, `move_to`).
    pub action: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
    /// The object exactly as the interpreter produced it, forwarded verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl Command {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Outcome of running one [`Message`] through the pipeline.
///
/// Filled progressively by the dispatcher and returned to the sender once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// ISO-639-1 code detected during transcription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub commands: Vec<Command>,
    /// Service names of the targets that accepted the result, in target order.
    #[serde(default)]
    pub routed_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    /// Synthesized reply, base64 in JSON.
    #[serde(
        default,
        with = "crate::encoding::base64_bytes_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_audio: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_content_type: Option<String>,
    /// Set when a terminal stage failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            ..Self::default()
        }
    }

    /// Attaches synthesized audio. Empty audio leaves the result untouched.
    pub fn set_response_audio(&mut self, audio: Vec<u8>, content_type: impl Into<String>) {
        if !audio.is_empty() {
            self.response_audio = Some(audio);
            self.response_content_type = Some(content_type.into());
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
