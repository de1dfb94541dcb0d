use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Delivery to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The target answered with status >= 400. `body` holds at most 1 KiB.
    #[error("Delivery to {endpoint} rejected (status {status}): {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The channel cannot deliver outbound payloads.
    #[error("{0} channel does not support outbound delivery")]
    Unsupported(String),
}
