//! Shared types for the Switchyard dispatch pipeline.
//!
//! This crate defines the data flowing between the delivery channels, the
//! interpreter, the synthesizer and the dispatch engine: inbound [`Message`]s
//! with their [`Instruction`], the structured [`Command`]s produced by the
//! interpreter, and the [`DispatchResult`] returned to every sender.
//!
//! It also carries [`DispatchContext`], the cancellation and deadline scope a
//! single dispatch runs under. Every blocking stage of the pipeline is driven
//! through it so that a cancelled request or an expired deadline aborts the
//! stage that is currently in flight.

pub mod context;
mod encoding;
pub mod message;

pub use context::{DispatchContext, Interrupted};
pub use message::{
    Command, DispatchResult, Instruction, Message, ParseResponseModeError, ResponseMode, Target,
};

/// MIME type of the WAV container produced by the synthesizer.
pub const CONTENT_TYPE_WAV: &str = "audio/wav";

/// Language used for synthesis when transcription detected none.
pub const DEFAULT_LANGUAGE: &str = "en";
