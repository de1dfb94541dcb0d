use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed framing or an `error` event reported by the server.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("TTS timed out after {0} seconds")]
    Timeout(u64),

    #[error("TTS is disabled")]
    Disabled,
}
