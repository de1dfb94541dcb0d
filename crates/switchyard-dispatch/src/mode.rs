use switchyard_types::ResponseMode;

/// Effective response mode for a request.
///
/// A recognised `requested` value wins. Anything else (including empty)
/// falls back to `text+audio` when a synthesizer is available, `text`
/// otherwise.
pub fn resolve_response_mode(requested: &str, synthesizer_present: bool) -> ResponseMode {
    match requested.parse() {
        Ok(mode) => mode,
        Err(_) if synthesizer_present => ResponseMode::TextAudio,
        Err(_) => ResponseMode::Text,
    }
}
