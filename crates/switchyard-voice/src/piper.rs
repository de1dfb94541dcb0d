use crate::config::PiperConfig;
use crate::error::VoiceError;
use crate::tts::{SynthesizeOptions, SynthesizedAudio, Synthesizer};
use crate::wav::{pcm_to_wav, PcmFormat};
use crate::wyoming::{
    read_event, write_event, Event, EVENT_AUDIO_CHUNK, EVENT_AUDIO_START, EVENT_AUDIO_STOP,
    EVENT_ERROR,
};
use async_trait::async_trait;
use bytes::BytesMut;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Maximum text input size for TTS (64 KiB).
pub const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Built-in voice per ISO-639-1 language code.
pub const DEFAULT_VOICES: &[(&str, &str)] = &[
    ("en", "en_US-lessac-medium"),
    ("fr", "fr_FR-siwis-medium"),
    ("es", "es_ES-mls_10246-low"),
    ("de", "de_DE-thorsten-medium"),
    ("it", "it_IT-riccardo-x_low"),
    ("pt", "pt_BR-faber-medium"),
    ("nl", "nl_NL-mls-medium"),
    ("pl", "pl_PL-darkman-medium"),
    ("ru", "ru_RU-ruslan-medium"),
    ("ja", "ja_JP-amitaro-medium"),
    ("ko", "ko_KR-kss-x_low"),
    ("zh", "zh_CN-huayan-medium"),
];

fn clean_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    let endpoint = endpoint.strip_prefix("tcp://").unwrap_or(endpoint);
    let endpoint = endpoint.strip_prefix("http://").unwrap_or(endpoint);
    endpoint.trim_end_matches('/').to_string()
}

/// Synthesizer backed by a Piper server speaking the Wyoming protocol.
///
/// Every call opens its own connection; nothing is pooled. Voice and
/// endpoint tables are fixed at construction.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    endpoint: Option<String>,
    endpoints: HashMap<String, String>,
    voices: HashMap<String, String>,
    default_language: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl PiperSynthesizer {
    pub fn new(config: &PiperConfig) -> Self {
        let mut voices: HashMap<String, String> = DEFAULT_VOICES
            .iter()
            .map(|(lang, voice)| (lang.to_string(), voice.to_string()))
            .collect();
        voices.extend(
            config
                .voices
                .iter()
                .map(|(lang, voice)| (lang.clone(), voice.clone())),
        );

        let endpoint = config
            .endpoint
            .as_deref()
            .map(clean_endpoint)
            .filter(|endpoint| !endpoint.is_empty());
        let endpoints = config
            .endpoints
            .iter()
            .map(|(lang, endpoint)| (lang.clone(), clean_endpoint(endpoint)))
            .filter(|(_, endpoint)| !endpoint.is_empty())
            .collect();

        Self {
            endpoint,
            endpoints,
            voices,
            default_language: config.default_language.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            io_timeout: Duration::from_secs(config.io_timeout_secs),
        }
    }

    /// Explicit voice, else the language's voice, else the default language's.
    pub fn resolve_voice(&self, options: &SynthesizeOptions) -> Result<String, VoiceError> {
        if let Some(voice) = options.voice.as_deref().filter(|v| !v.is_empty()) {
            return Ok(voice.to_string());
        }
        self.voices
            .get(&options.language)
            .or_else(|| self.voices.get(&self.default_language))
            .cloned()
            .ok_or_else(|| {
                VoiceError::Config(format!(
                    "no piper voice for language {:?} or default language {:?}",
                    options.language, self.default_language
                ))
            })
    }

    /// Per-language endpoint, else the fallback endpoint.
    pub fn resolve_endpoint(&self, language: &str) -> Result<&str, VoiceError> {
        self.endpoints
            .get(language)
            .or(self.endpoint.as_ref())
            .map(String::as_str)
            .ok_or_else(|| {
                VoiceError::Config(format!(
                    "no piper endpoint configured for language {:?}",
                    language
                ))
            })
    }

    async fn connect(&self, endpoint: &str) -> Result<TcpStream, VoiceError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(VoiceError::Connect {
                endpoint: endpoint.to_string(),
                source,
            }),
            Err(_) => Err(VoiceError::Timeout(self.connect_timeout.as_secs())),
        }
    }
}

fn validate_text(text: &str) -> Result<(), VoiceError> {
    if text.trim().is_empty() {
        return Err(VoiceError::InvalidInput("empty text for synthesis".to_string()));
    }
    if text.len() > MAX_TTS_INPUT_BYTES {
        return Err(VoiceError::InvalidInput(format!(
            "text exceeds maximum size: {} bytes (limit: {} bytes)",
            text.len(),
            MAX_TTS_INPUT_BYTES
        )));
    }
    Ok(())
}

/// Reads a positive `audio-start` field that fits the target type; anything
/// else keeps the default.
fn audio_param<T: TryFrom<u64>>(event: &Event, key: &str) -> Option<T> {
    event
        .data_u64(key)
        .filter(|value| *value > 0)
        .and_then(|value| T::try_from(value).ok())
}

/// Runs one synthesize exchange over an already-open stream and returns the
/// WAV-wrapped result.
pub async fn run_session<S>(
    stream: &mut S,
    text: &str,
    voice: &str,
) -> Result<SynthesizedAudio, VoiceError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    write_event(stream, &Event::synthesize(text, voice)).await?;

    let mut format = PcmFormat::default();
    let mut pcm = BytesMut::new();

    loop {
        let event = read_event(stream).await?;
        match event.event_type.as_str() {
            EVENT_AUDIO_START => {
                let defaults = PcmFormat::default();
                format = PcmFormat::new(
                    audio_param(&event, "rate").unwrap_or(defaults.sample_rate),
                    audio_param(&event, "channels").unwrap_or(defaults.channels),
                    audio_param(&event, "width").unwrap_or(defaults.sample_width),
                );
                debug!(
                    rate = format.sample_rate,
                    channels = format.channels,
                    width = format.sample_width,
                    "piper audio-start"
                );
            }
            EVENT_AUDIO_CHUNK => pcm.extend_from_slice(&event.payload),
            EVENT_AUDIO_STOP => {
                debug!(pcm_bytes = pcm.len(), "piper audio-stop");
                return Ok(SynthesizedAudio {
                    audio: pcm_to_wav(&pcm, format),
                    content_type: switchyard_types::CONTENT_TYPE_WAV.to_string(),
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                });
            }
            EVENT_ERROR => {
                let message = event.data_str("text").unwrap_or("unknown error");
                return Err(VoiceError::Protocol(format!("piper error: {}", message)));
            }
            other => debug!(event_type = other, "ignoring piper event"),
        }
    }
}

#[async_trait]
impl Synthesizer for PiperSynthesizer {
    fn name(&self) -> &str {
        "piper"
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesizeOptions,
    ) -> Result<SynthesizedAudio, VoiceError> {
        validate_text(text)?;
        let voice = self.resolve_voice(options)?;
        let endpoint = self.resolve_endpoint(&options.language)?;

        debug!(
            text_length = text.len(),
            voice = %voice,
            language = %options.language,
            endpoint,
            "piper synthesize"
        );

        let stream = self.connect(endpoint).await?;
        let mut stream = BufReader::new(stream);

        tokio::time::timeout(self.io_timeout, run_session(&mut stream, text, &voice))
            .await
            .map_err(|_| VoiceError::Timeout(self.io_timeout.as_secs()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(language: &str) -> SynthesizeOptions {
        SynthesizeOptions::for_language(language)
    }

    #[test]
    fn endpoints_are_normalised() {
        let mut config = PiperConfig::new("tcp://piper:10200");
        config
            .endpoints
            .insert("fr".to_string(), "http://piper-fr:10200/".to_string());
        let synth = PiperSynthesizer::new(&config);

        assert_eq!(synth.resolve_endpoint("en").unwrap(), "piper:10200");
        assert_eq!(synth.resolve_endpoint("fr").unwrap(), "piper-fr:10200");
        assert_eq!(synth.resolve_endpoint("de").unwrap(), "piper:10200");
    }

    #[test]
    fn missing_endpoint_is_config_error() {
        let mut config = PiperConfig::default();
        config
            .endpoints
            .insert("en".to_string(), "hostA:10200".to_string());
        let synth = PiperSynthesizer::new(&config);

        assert_eq!(synth.resolve_endpoint("en").unwrap(), "hostA:10200");
        assert!(matches!(
            synth.resolve_endpoint("fr"),
            Err(VoiceError::Config(msg)) if msg.contains("\"fr\"")
        ));
    }

    #[test]
    fn voice_resolution_order() {
        let mut config = PiperConfig::new("piper:10200");
        config
            .voices
            .insert("fr".to_string(), "fr_FR-upmc-medium".to_string());
        let synth = PiperSynthesizer::new(&config);

        assert_eq!(synth.resolve_voice(&options("fr")).unwrap(), "fr_FR-upmc-medium");
        assert_eq!(synth.resolve_voice(&options("de")).unwrap(), "de_DE-thorsten-medium");
        assert_eq!(synth.resolve_voice(&options("xx")).unwrap(), "en_US-lessac-medium");
        assert_eq!(
            synth
                .resolve_voice(&options("fr").with_voice("my-voice"))
                .unwrap(),
            "my-voice"
        );
    }

    #[test]
    fn unknown_default_language_is_config_error() {
        let mut config = PiperConfig::new("piper:10200");
        config.default_language = "xx".to_string();
        let synth = PiperSynthesizer::new(&config);
        assert!(matches!(
            synth.resolve_voice(&options("yy")),
            Err(VoiceError::Config(_))
        ));
    }

    #[test]
    fn text_validation() {
        assert!(matches!(validate_text(""), Err(VoiceError::InvalidInput(_))));
        assert!(matches!(validate_text("  "), Err(VoiceError::InvalidInput(_))));
        let big = "a".repeat(MAX_TTS_INPUT_BYTES + 1);
        assert!(matches!(validate_text(&big), Err(VoiceError::InvalidInput(_))));
        assert!(validate_text("hello").is_ok());
    }
}
