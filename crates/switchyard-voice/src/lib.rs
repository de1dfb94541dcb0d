//! Speech synthesis for Switchyard replies.
//!
//! Synthesis talks to a Piper server over the Wyoming event protocol: a
//! fresh TCP connection per call, one `synthesize` event out, a stream of
//! `audio-start` / `audio-chunk` / `audio-stop` events back. The raw PCM is
//! wrapped in a WAV container before it is handed to the dispatcher.
//!
//! The [`Synthesizer`] trait is the seam the dispatcher consumes. Two
//! implementations ship: [`PiperSynthesizer`] and [`DisabledSynthesizer`],
//! used when synthesis is turned off in configuration.

pub mod config;
pub mod error;
pub mod piper;
pub mod tts;
pub mod wav;
pub mod wyoming;

pub use config::PiperConfig;
pub use error::VoiceError;
pub use piper::PiperSynthesizer;
pub use tts::{DisabledSynthesizer, SynthesizeOptions, SynthesizedAudio, Synthesizer};
pub use wav::{pcm_to_wav, PcmFormat, WavInfo};
