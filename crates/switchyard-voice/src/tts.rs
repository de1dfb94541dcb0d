use crate::error::VoiceError;
use async_trait::async_trait;
use bytes::Bytes;

/// Per-call synthesis parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizeOptions {
    /// ISO-639-1 code used to pick the voice and endpoint.
    pub language: String,
    /// Explicit voice name; bypasses the language table.
    pub voice: Option<String>,
}

impl SynthesizeOptions {
    pub fn for_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            voice: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }
}

impl Default for SynthesizeOptions {
    fn default() -> Self {
        Self::for_language(switchyard_types::DEFAULT_LANGUAGE)
    }
}

/// A complete audio clip ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub audio: Bytes,
    pub content_type: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Text-to-speech backend.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// `false` for the placeholder used when synthesis is switched off.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesizeOptions,
    ) -> Result<SynthesizedAudio, VoiceError>;

    async fn close(&self) -> Result<(), VoiceError> {
        Ok(())
    }
}

/// Stands in for a synthesizer when `tts.enabled = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSynthesizer;

#[async_trait]
impl Synthesizer for DisabledSynthesizer {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn synthesize(
        &self,
        _text: &str,
        _options: &SynthesizeOptions,
    ) -> Result<SynthesizedAudio, VoiceError> {
        Err(VoiceError::Disabled)
    }
}
