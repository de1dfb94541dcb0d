//! Wyoming event framing.
//!
//! Every event on the wire is:
//!
//! ```text
//! <json_length> <payload_length>\n
//! <json_length bytes of JSON>\n
//! <payload_length raw bytes>          (only when payload_length > 0)
//! ```
//!
//! The JSON object carries a `type` string and an optional `data` object.

use crate::error::VoiceError;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Longest accepted header line, newline included.
pub const MAX_HEADER_LINE_BYTES: usize = 64;

/// Largest accepted JSON body.
pub const MAX_JSON_BYTES: usize = 1024 * 1024;

/// Largest accepted binary payload.
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

pub const EVENT_SYNTHESIZE: &str = "synthesize";
pub const EVENT_AUDIO_START: &str = "audio-start";
pub const EVENT_AUDIO_CHUNK: &str = "audio-chunk";
pub const EVENT_AUDIO_STOP: &str = "audio-stop";
pub const EVENT_ERROR: &str = "error";

/// One decoded protocol event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: String,
    /// The `data` object; empty when the event carries none.
    pub data: Map<String, Value>,
    pub payload: Bytes,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: Map::new(),
            payload: Bytes::new(),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// The `synthesize` request: `data = {text, voice: {name}}`.
    pub fn synthesize(text: &str, voice: &str) -> Self {
        let mut voice_data = Map::new();
        voice_data.insert("name".to_string(), Value::String(voice.to_string()));

        let mut data = Map::new();
        data.insert("text".to_string(), Value::String(text.to_string()));
        data.insert("voice".to_string(), Value::Object(voice_data));

        Self::new(EVENT_SYNTHESIZE).with_data(data)
    }

    /// Reads a non-negative integer field from `data`.
    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(Value::as_u64)
    }

    /// Reads a string field from `data`.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[derive(Serialize, Deserialize)]
struct EventHeader {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
}

fn protocol(message: impl Into<String>) -> VoiceError {
    VoiceError::Protocol(message.into())
}

/// Serializes `event` into one complete frame.
pub fn encode_event(event: &Event) -> Result<Bytes, VoiceError> {
    let header = EventHeader {
        event_type: event.event_type.clone(),
        data: (!event.data.is_empty()).then(|| event.data.clone()),
    };
    let json = serde_json::to_vec(&header)
        .map_err(|e| protocol(format!("encoding event JSON: {}", e)))?;
    let line = format!("{} {}\n", json.len(), event.payload.len());

    let mut frame = BytesMut::with_capacity(line.len() + json.len() + 1 + event.payload.len());
    frame.put_slice(line.as_bytes());
    frame.put_slice(&json);
    frame.put_u8(b'\n');
    frame.put_slice(&event.payload);
    Ok(frame.freeze())
}

/// Writes one event and flushes the writer.
pub async fn write_event<W>(writer: &mut W, event: &Event) -> Result<(), VoiceError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_event(event)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Parses `"<json_length> <payload_length>"` (newline already stripped).
fn parse_header_line(line: &[u8]) -> Result<(usize, usize), VoiceError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| protocol("event header is not valid UTF-8"))?;
    let (json_len, payload_len) = text
        .split_once(' ')
        .ok_or_else(|| protocol(format!("invalid event header: {:?}", text)))?;

    let json_len = json_len
        .trim()
        .parse::<usize>()
        .map_err(|e| protocol(format!("parsing json_length in {:?}: {}", text, e)))?;
    let payload_len = payload_len
        .trim()
        .parse::<usize>()
        .map_err(|e| protocol(format!("parsing payload_length in {:?}: {}", text, e)))?;

    if json_len > MAX_JSON_BYTES {
        return Err(protocol(format!(
            "event JSON too large: {} bytes (limit: {} bytes)",
            json_len, MAX_JSON_BYTES
        )));
    }
    if payload_len > MAX_PAYLOAD_BYTES {
        return Err(protocol(format!(
            "event payload too large: {} bytes (limit: {} bytes)",
            payload_len, MAX_PAYLOAD_BYTES
        )));
    }
    Ok((json_len, payload_len))
}

/// Reads exactly one event.
///
/// Every framing problem, including the peer closing the stream mid-event,
/// is reported as [`VoiceError::Protocol`].
pub async fn read_event<R>(reader: &mut R) -> Result<Event, VoiceError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(32);
    let read = (&mut *reader)
        .take(MAX_HEADER_LINE_BYTES as u64)
        .read_until(b'\n', &mut line)
        .await
        .map_err(|e| protocol(format!("reading event header: {}", e)))?;

    if read == 0 {
        return Err(protocol("connection closed before event header"));
    }
    if line.last() != Some(&b'\n') {
        return Err(if read >= MAX_HEADER_LINE_BYTES {
            protocol(format!(
                "event header exceeds {} bytes",
                MAX_HEADER_LINE_BYTES
            ))
        } else {
            protocol("connection closed inside event header")
        });
    }
    line.pop();

    let (json_len, payload_len) = parse_header_line(&line)?;

    let mut json = vec![0u8; json_len + 1];
    reader
        .read_exact(&mut json)
        .await
        .map_err(|e| protocol(format!("reading {} bytes of event JSON: {}", json_len, e)))?;
    if json.pop() != Some(b'\n') {
        return Err(protocol("event JSON is not terminated by a newline"));
    }

    let header: EventHeader = serde_json::from_slice(&json)
        .map_err(|e| protocol(format!("decoding event JSON: {}", e)))?;

    let payload = if payload_len > 0 {
        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload).await.map_err(|e| {
            protocol(format!("reading {} bytes of event payload: {}", payload_len, e))
        })?;
        Bytes::from(payload)
    } else {
        Bytes::new()
    };

    Ok(Event {
        event_type: header.event_type,
        data: header.data.unwrap_or_default(),
        payload,
    })
}
