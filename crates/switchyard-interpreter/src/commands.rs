//! Prompt construction and model-output parsing shared by every backend.

use crate::error::InterpreterError;
use crate::Interpretation;
use serde_json::{Map, Value};
use switchyard_types::{Command, Instruction};

/// Characters of unparseable output echoed back in the error.
const PARSE_ERROR_PREVIEW_CHARS: usize = 200;

/// System prompt telling the model which JSON shape to answer with.
pub fn build_system_prompt(instruction: &Instruction) -> String {
    let mut prompt = String::from(
        "You are a voice command interpreter for a home automation and robotics system.\n\
         Interpret the user's transcribed speech and return structured commands as JSON.\n\n",
    );

    if !instruction.command_format.is_empty() {
        prompt.push_str(&format!("Output format: {}\n", instruction.command_format));
    }
    if let Some(context) = instruction.prompt.as_deref().filter(|p| !p.is_empty()) {
        prompt.push_str(&format!("Additional context: {}\n", context));
    }

    prompt.push_str(
        "\nReturn a JSON object with:\n\
         - \"commands\": array of commands, each with \"action\" and \"params\"\n\
         - \"response\": a short confirmation sentence in the SAME language the user spoke\n\
         \nExample: {\"commands\": [{\"action\": \"turn_on\", \"params\": {\"entity\": \"light.living_room\"}}], \
         \"response\": \"Turning on the living room light\"}\n",
    );
    prompt
}

/// Removes a surrounding Markdown code fence, which small local models like
/// to add around JSON.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = inner.strip_suffix("```") else {
        return trimmed;
    };
    // Drop an info string such as `json` on the opening line.
    match inner.split_once('\n') {
        Some((info, body)) if !info.trim().contains(' ') => body.trim(),
        _ => inner.trim(),
    }
}

/// Builds a command from one JSON object, keeping the object as `raw`.
fn command_from_object(object: &Map<String, Value>) -> Option<Command> {
    let action = object.get("action")?.as_str()?.trim();
    if action.is_empty() {
        return None;
    }
    let params = match object.get("params") {
        Some(Value::Object(params)) => params.clone(),
        _ => Map::new(),
    };
    Some(Command {
        action: action.to_string(),
        params,
        raw: Some(Value::Object(object.clone())),
    })
}

fn parse_error(content: &str) -> InterpreterError {
    let preview: String = content.chars().take(PARSE_ERROR_PREVIEW_CHARS).collect();
    InterpreterError::Parse(preview)
}

/// Parses model output into commands plus an optional spoken reply.
///
/// Accepts `{"commands": [...], "response": "..."}` or a single bare
/// `{"action": ..., "params": ...}` object.
pub fn parse_commands(content: &str) -> Result<Interpretation, InterpreterError> {
    let body = strip_code_fence(content);
    let value: Value = serde_json::from_str(body).map_err(|_| parse_error(content))?;
    let Value::Object(object) = value else {
        return Err(parse_error(content));
    };

    if let Some(Value::Array(items)) = object.get("commands") {
        let commands = items
            .iter()
            .map(|item| item.as_object().and_then(command_from_object))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| parse_error(content))?;
        let response_text = object
            .get("response")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        return Ok(Interpretation {
            commands,
            response_text,
        });
    }

    command_from_object(&object)
        .map(|command| Interpretation {
            commands: vec![command],
            response_text: None,
        })
        .ok_or_else(|| parse_error(content))
}

/// File extension used for the multipart upload.
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("wav") {
        "wav"
    } else if ct.contains("ogg") || ct.contains("opus") {
        "ogg"
    } else if ct.contains("mp3") || ct.contains("mpeg") {
        "mp3"
    } else if ct.contains("flac") {
        "flac"
    } else if ct.contains("webm") {
        "webm"
    } else if ct.contains("m4a") || ct.contains("mp4") {
        "m4a"
    } else {
        "wav"
    }
}

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("english", "en"),
    ("french", "fr"),
    ("spanish", "es"),
    ("german", "de"),
    ("italian", "it"),
    ("portuguese", "pt"),
    ("dutch", "nl"),
    ("polish", "pl"),
    ("russian", "ru"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("chinese", "zh"),
    ("arabic", "ar"),
    ("hindi", "hi"),
    ("turkish", "tr"),
];

/// Maps a detected language (`"english"`, `"EN"`, `"fr"`) to ISO-639-1.
/// Unknown names are returned lowercased; blank input yields `None`.
pub fn normalize_language(language: &str) -> Option<String> {
    let lower = language.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    let code = LANGUAGE_NAMES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, code)| code.to_string());
    Some(code.unwrap_or(lower))
}
