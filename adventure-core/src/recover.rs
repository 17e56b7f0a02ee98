//! Recovery of structured results from raw model output.
//!
//! Models wrap the requested JSON in prose more often than not. The turn
//! path trims to the outermost brace pair (first `{` to last `}`) and then
//! insists on the full `{story, choices}` shape: either the whole payload
//! is accepted or nothing is. The ending path is plain text cleanup and
//! never fails.

use crate::story::Choice;
use serde::Deserialize;
use thiserror::Error;

/// The structured payload required from a non-ending turn.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnPayload {
    pub story: String,
    pub choices: Vec<Choice>,
}

/// Why a turn payload could not be recovered.
#[derive(Debug, Error)]
pub enum RecoverError {
    #[error("no JSON payload found in the model output")]
    MissingPayload,

    #[error("malformed story payload: {0}")]
    Malformed(String),

    #[error("expected exactly 3 choices, got {0}")]
    WrongChoiceCount(usize),
}

/// Recover the `{story, choices}` payload from a turn response.
///
/// Prose before the first `{` and after the last `}` is discarded; the
/// remainder must parse as the full payload or recovery fails outright.
pub fn recover_turn(raw: &str) -> Result<TurnPayload, RecoverError> {
    let start = raw.find('{').ok_or(RecoverError::MissingPayload)?;
    let end = raw.rfind('}').ok_or(RecoverError::MissingPayload)?;
    if end < start {
        return Err(RecoverError::MissingPayload);
    }

    let mut payload: TurnPayload = serde_json::from_str(&raw[start..=end])
        .map_err(|e| RecoverError::Malformed(e.to_string()))?;

    if payload.choices.len() != 3 {
        return Err(RecoverError::WrongChoiceCount(payload.choices.len()));
    }

    payload.story = payload.story.trim().to_string();
    Ok(payload)
}

/// Clean up an ending response into display text.
///
/// Strips one leading and one trailing quote character if present, expands
/// literal `\n` escapes into real line breaks, and trims. Never fails: the
/// worst case returns the input largely unchanged.
pub fn recover_ending(raw: &str) -> String {
    let text = raw.trim();
    let text = text
        .strip_prefix('"')
        .or_else(|| text.strip_prefix('\''))
        .unwrap_or(text);
    let text = text
        .strip_suffix('"')
        .or_else(|| text.strip_suffix('\''))
        .unwrap_or(text);
    text.replace("\\n", "\n").trim().to_string()
}
