use crate::mode::resolve_response_mode;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use switchyard_channels::{DeliveryChannel, MessageHandler};
use switchyard_interpreter::{Interpreter, TranscribeOptions};
use switchyard_types::{
    DispatchContext, DispatchResult, Interrupted, Message, ResponseMode, Target,
    DEFAULT_LANGUAGE,
};
use switchyard_voice::{SynthesizeOptions, Synthesizer};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Why a single pipeline stage produced no output.
#[derive(Debug, Error)]
enum StageError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
    #[error(transparent)]
    Failed(E),
}

/// Runs one stage future under `ctx`, folding interruption into the error.
async fn run_stage<T, E, F>(ctx: &DispatchContext, stage: F) -> Result<T, StageError<E>>
where
    E: std::error::Error + 'static,
    F: Future<Output = Result<T, E>>,
{
    ctx.run(stage).await?.map_err(StageError::Failed)
}

/// Routes messages through interpretation, synthesis and delivery.
///
/// All state is read-only after construction, so one dispatcher serves any
/// number of concurrent messages.
pub struct Dispatcher {
    interpreter: Arc<dyn Interpreter>,
    channels: HashMap<String, Arc<dyn DeliveryChannel>>,
    synthesizer: Arc<dyn Synthesizer>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut protocols: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        protocols.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("interpreter", &self.interpreter.name())
            .field("channels", &protocols)
            .field("synthesizer", &self.synthesizer.name())
            .finish()
    }
}

impl Dispatcher {
    /// Channels are keyed by [`DeliveryChannel::name`]; a later channel with
    /// the same name replaces an earlier one.
    pub fn new(
        interpreter: Arc<dyn Interpreter>,
        channels: impl IntoIterator<Item = Arc<dyn DeliveryChannel>>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        let channels = channels
            .into_iter()
            .map(|channel| (channel.name().to_string(), channel))
            .collect();
        Self {
            interpreter,
            channels,
            synthesizer,
        }
    }

    /// Protocol identifiers this dispatcher can deliver to.
    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Runs `message` through the whole pipeline under `ctx`.
    pub async fn handle(&self, message: &Message, ctx: &DispatchContext) -> DispatchResult {
        let span = info_span!(
            "dispatch",
            message_id = %message.id,
            source = %message.source,
        );
        self.run_pipeline(message, ctx).instrument(span).await
    }

    async fn run_pipeline(&self, message: &Message, ctx: &DispatchContext) -> DispatchResult {
        let started = Instant::now();
        let instruction = &message.instruction;
        let mode = resolve_response_mode(&instruction.response_mode, self.synthesizer.is_enabled());
        info!(response_mode = %mode, targets = instruction.targets.len(), "dispatch started");

        let mut result = DispatchResult::new(message.id.clone());

        let transcript = if message.has_audio() {
            debug!(
                content_type = message.content_type(),
                bytes = message.audio.len(),
                "transcribing audio"
            );
            let options = TranscribeOptions {
                prompt: instruction.prompt.clone(),
                ..TranscribeOptions::default()
            };
            let transcription = match run_stage(
                ctx,
                self.interpreter
                    .transcribe(&message.audio, message.content_type(), &options),
            )
            .await
            {
                Ok(transcription) => transcription,
                Err(e) => {
                    error!(error = %e, "transcription failed");
                    result.error = Some(format!("transcription failed: {}", e));
                    return result;
                }
            };
            info!(
                text_length = transcription.text.len(),
                language = transcription.language.as_deref().unwrap_or_default(),
                "transcription complete"
            );
            result.language = transcription.language;
            transcription.text
        } else if let Some(text) = message.text_input() {
            debug!("using text input directly");
            text.to_string()
        } else {
            result.error = Some("message has no audio and no text".to_string());
            return result;
        };
        result.transcript = Some(transcript.clone());

        let interpretation =
            match run_stage(ctx, self.interpreter.interpret(&transcript, instruction)).await {
                Ok(interpretation) => interpretation,
                Err(e) => {
                    error!(error = %e, "interpretation failed");
                    result.error = Some(format!("interpretation failed: {}", e));
                    return result;
                }
            };
        info!(commands = interpretation.commands.len(), "interpretation complete");
        result.commands = interpretation.commands;

        let response_text = interpretation
            .response_text
            .filter(|text| !text.trim().is_empty());
        if mode.wants_text() {
            result.response_text = response_text.clone();
        }

        if let Some(text) = response_text.as_deref() {
            self.synthesize_reply(mode, text, ctx, &mut result).await;
        }

        let payload = match serde_json::to_vec(&result) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "encoding dispatch result failed");
                result.error = Some(format!("encoding result failed: {}", e));
                return result;
            }
        };
        result.routed_to = self.route(&instruction.targets, &payload, ctx).await;

        info!(
            duration_ms = started.elapsed().as_millis() as u64,
            routed_to = result.routed_to.len(),
            "dispatch complete"
        );
        result
    }

    /// Attaches synthesized audio when the mode asks for it. Failures are
    /// logged and leave the result without audio.
    async fn synthesize_reply(
        &self,
        mode: ResponseMode,
        text: &str,
        ctx: &DispatchContext,
        result: &mut DispatchResult,
    ) {
        if !mode.wants_audio() || !self.synthesizer.is_enabled() {
            return;
        }

        let language = result.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
        let options = SynthesizeOptions::for_language(language);
        debug!(language, text_length = text.len(), "synthesizing response");

        match run_stage(ctx, self.synthesizer.synthesize(text, &options)).await {
            Ok(audio) => {
                info!(audio_bytes = audio.audio.len(), "synthesis complete");
                result.set_response_audio(audio.audio.to_vec(), audio.content_type);
            }
            Err(e) => warn!(error = %e, "synthesis failed, continuing without audio"),
        }
    }

    /// Delivers `payload` to every target in order and returns the names of
    /// those that accepted it.
    async fn route(
        &self,
        targets: &[Target],
        payload: &[u8],
        ctx: &DispatchContext,
    ) -> Vec<String> {
        let this = self;
        stream::iter(targets)
            .fold(Vec::new(), move |mut routed, target| async move {
                if this.deliver(target, payload, ctx).await {
                    routed.push(target.service_name.clone());
                }
                routed
            })
            .await
    }

    async fn deliver(&self, target: &Target, payload: &[u8], ctx: &DispatchContext) -> bool {
        let Some(channel) = self.channels.get(&target.protocol) else {
            warn!(
                target = %target.service_name,
                protocol = %target.protocol,
                "no channel for target protocol"
            );
            return false;
        };

        match run_stage(ctx, channel.send(target, payload)).await {
            Ok(()) => {
                info!(target = %target.service_name, protocol = %target.protocol, "routed to target");
                true
            }
            Err(e) => {
                error!(
                    target = %target.service_name,
                    protocol = %target.protocol,
                    error = %e,
                    "failed to send to target"
                );
                false
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, message: Message, ctx: DispatchContext) -> DispatchResult {
        Dispatcher::handle(self, &message, &ctx).await
    }
}
