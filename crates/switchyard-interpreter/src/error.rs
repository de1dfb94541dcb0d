use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterpreterError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{operation} request failed: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx reply. `body` holds at most the first 2 KiB.
    #[error("{operation} failed (status {status}): {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Decoding {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// The model output could not be turned into commands.
    #[error("Could not parse model output as commands: {0}")]
    Parse(String),
}
