//! Switchyard server: wires configuration into an interpreter, a synthesizer
//! and the enabled delivery channels, then runs them until shutdown.

pub mod config;

use futures_util::future::join_all;
use std::sync::Arc;
use switchyard_channels::{
    DeliveryChannel, GrpcChannel, HttpChannel, MessageHandler, MqttChannel,
};
use switchyard_dispatch::Dispatcher;
use switchyard_interpreter::{Interpreter, LocalInterpreter, OpenAiInterpreter};
use switchyard_voice::{DisabledSynthesizer, PiperSynthesizer, Synthesizer};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use config::{load_config, Config, ConfigError};

use config::{ChannelsConfig, InterpreterConfig, TtsConfig};

/// Reasons the server refuses to start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no channels enabled, enable at least one under [channels]")]
    NoChannels,

    #[error("unknown interpreter backend: {0:?}")]
    UnknownInterpreter(String),

    #[error("unknown tts backend: {0:?}")]
    UnknownSynthesizer(String),

    /// Every enabled channel stopped with an error before shutdown.
    #[error("all {0} enabled channels failed")]
    AllChannelsFailed(usize),
}

/// Builds the interpreter named by `config.backend`.
pub fn build_interpreter(config: &InterpreterConfig) -> Result<Arc<dyn Interpreter>, StartupError> {
    match config.backend.as_str() {
        "openai" => {
            if config.openai.api_key.is_empty() {
                tracing::warn!("interpreter.openai.api_key is empty, requests will fail");
            }
            tracing::info!(
                transcription_model = %config.openai.transcription_model,
                completion_model = %config.openai.completion_model,
                "using OpenAI interpreter"
            );
            Ok(Arc::new(OpenAiInterpreter::new(config.openai.clone())))
        }
        "local" => {
            tracing::info!(
                whisper = %config.local.whisper_endpoint,
                llm = %config.local.llm_endpoint,
                "using local interpreter"
            );
            Ok(Arc::new(LocalInterpreter::new(config.local.clone())))
        }
        other => Err(StartupError::UnknownInterpreter(other.to_string())),
    }
}

/// Builds the synthesizer, or a disabled stand-in when `tts.enabled` is off.
pub fn build_synthesizer(config: &TtsConfig) -> Result<Arc<dyn Synthesizer>, StartupError> {
    if !config.enabled {
        tracing::info!("speech synthesis disabled");
        return Ok(Arc::new(DisabledSynthesizer));
    }
    match config.backend.as_str() {
        "piper" => {
            tracing::info!(
                endpoint = config.piper.endpoint.as_deref().unwrap_or("<none>"),
                languages = config.piper.endpoints.len(),
                "using Piper synthesizer"
            );
            Ok(Arc::new(PiperSynthesizer::new(&config.piper)))
        }
        other => Err(StartupError::UnknownSynthesizer(other.to_string())),
    }
}

/// Instantiates every enabled channel.
pub fn build_channels(config: &ChannelsConfig) -> Vec<Arc<dyn DeliveryChannel>> {
    let mut channels: Vec<Arc<dyn DeliveryChannel>> = Vec::new();
    if config.http.enabled {
        channels.push(Arc::new(HttpChannel::new(config.http.clone())));
    }
    if config.mqtt.enabled {
        channels.push(Arc::new(MqttChannel::new(config.mqtt.clone())));
    }
    if config.grpc.enabled {
        channels.push(Arc::new(GrpcChannel::new(config.grpc.clone())));
    }
    channels
}

/// Runs every enabled channel until `shutdown` is cancelled, then closes the
/// channels, the interpreter and the synthesizer.
///
/// A channel whose listener fails is logged and left stopped while the others
/// keep running. When every listener has failed before shutdown, the
/// components are closed and [`StartupError::AllChannelsFailed`] is returned.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), StartupError> {
    if !config.channels.any_enabled() {
        return Err(StartupError::NoChannels);
    }
    let interpreter = build_interpreter(&config.interpreter)?;
    let synthesizer = build_synthesizer(&config.tts)?;
    let channels = build_channels(&config.channels);

    let dispatcher = Arc::new(Dispatcher::new(
        interpreter.clone(),
        channels.iter().cloned(),
        synthesizer.clone(),
    ));
    tracing::debug!(?dispatcher, "dispatcher ready");
    let handler: Arc<dyn MessageHandler> = dispatcher;

    let listeners = channels.iter().map(|channel| {
        let channel = channel.clone();
        let handler = handler.clone();
        let shutdown = shutdown.clone();
        async move {
            tracing::info!(channel = channel.name(), "starting channel");
            let outcome = channel.listen(handler, shutdown).await;
            if let Err(e) = &outcome {
                tracing::error!(channel = channel.name(), error = %e, "channel failed");
            }
            outcome
        }
    });
    tracing::info!(channels = channels.len(), "switchyard ready");
    let outcomes = join_all(listeners).await;

    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    let all_failed = !shutdown.is_cancelled() && failed == outcomes.len();
    if !all_failed {
        // Channels closed from outside still wait for the signal.
        shutdown.cancelled().await;
    }

    tracing::info!("shutting down, closing components");
    for channel in &channels {
        if let Err(e) = channel.close().await {
            tracing::error!(channel = channel.name(), error = %e, "channel close error");
        }
    }
    if let Err(e) = interpreter.close().await {
        tracing::error!(error = %e, "interpreter close error");
    }
    if let Err(e) = synthesizer.close().await {
        tracing::error!(error = %e, "synthesizer close error");
    }

    if all_failed {
        return Err(StartupError::AllChannelsFailed(failed));
    }
    Ok(())
}
