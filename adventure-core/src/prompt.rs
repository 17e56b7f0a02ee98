//! Prompt assembly for the narrator.
//!
//! Pure string building: deterministic given its inputs, no I/O. The theme
//! is embedded verbatim; the story context is bounded by [`MAX_CONTEXT`]
//! characters and never truncated below that bound.

use crate::acts::Act;
use crate::story::ChoiceLabel;

/// Trailing window of story text carried into the next generation.
///
/// Full history is never resent; only the last `MAX_CONTEXT` characters.
pub const MAX_CONTEXT: usize = 500;

/// The last `MAX_CONTEXT` characters of the story, on a char boundary.
pub fn trailing_context(story: &str) -> &str {
    match story.char_indices().rev().nth(MAX_CONTEXT - 1) {
        Some((start, _)) => &story[start..],
        None => story,
    }
}

/// Build the instruction for a regular decision turn.
///
/// `last_choice` is `None` only for the opening generation.
pub fn build_turn_prompt(
    theme: &str,
    context: &str,
    act: Act,
    last_choice: Option<ChoiceLabel>,
) -> String {
    let chosen = last_choice.map(|label| label.to_string()).unwrap_or_default();

    format!(
        r#"You are the narrator of an interactive fiction text game.
YOUR TASK:
1. Continue the PREVIOUS story in exactly 4-5 sentences.
2. Keep the plot connected and follow the direction for ACT {act_number}: {act_guidance}
3. Invent the next 3 actions YOURSELF:
   - Action descriptions must NOT contain the letters A/B/C or any other tag.
   - Pure short narration (2-4 words) or a brief sentence.
Output ONLY JSON:
{{"story":"<continuation>","choices":[{{"label":"A","desc":"<pure action>"}},{{"label":"B","desc":"<pure action>"}},{{"label":"C","desc":"<pure action>"}}]}}
THEME: {theme}
LATEST CONTEXT: {context}
CHOSEN ACTION: {chosen}"#,
        act_number = act.number(),
        act_guidance = act.guidance(),
    )
}

/// Build the instruction for the closing epilogue.
pub fn build_ending_prompt(context: &str) -> String {
    format!(
        "You are a fiction writer. Write a 4-5 sentence epilogue WITHOUT the word \"replay\" \
         that closes the story reflectively or on a small open note, based on: {context}"
    )
}
