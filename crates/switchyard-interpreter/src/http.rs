//! Response handling shared by the HTTP-backed interpreters.

use crate::error::InterpreterError;
use reqwest::Response;
use serde::de::DeserializeOwned;

/// Largest error body kept in [`InterpreterError::Status`].
pub const MAX_ERROR_BODY_BYTES: usize = 2048;

/// Truncates `body` to at most `max` bytes on a char boundary.
pub(crate) fn truncate_body(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

pub(crate) fn request_error(operation: &'static str) -> impl FnOnce(reqwest::Error) -> InterpreterError {
    move |source| InterpreterError::Request { operation, source }
}

/// Passes 2xx responses through and turns anything else into
/// [`InterpreterError::Status`].
pub(crate) async fn check_status(
    operation: &'static str,
    response: Response,
) -> Result<Response, InterpreterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(InterpreterError::Status {
        operation,
        status: status.as_u16(),
        body: truncate_body(&body, MAX_ERROR_BODY_BYTES),
    })
}

/// Reads the whole body as text.
pub(crate) async fn read_text(
    operation: &'static str,
    response: Response,
) -> Result<String, InterpreterError> {
    response.text().await.map_err(|e| InterpreterError::Decode {
        operation,
        message: e.to_string(),
    })
}

/// Reads the whole body and decodes it as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, InterpreterError> {
    let body = read_text(operation, response).await?;
    serde_json::from_str(&body).map_err(|e| InterpreterError::Decode {
        operation,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_body("short", 10), "short");
        assert_eq!(truncate_body("abcdef", 3), "abc");
        // "é" is two bytes; cutting inside it backs off to the previous boundary.
        assert_eq!(truncate_body("aé", 2), "a");
    }
}
