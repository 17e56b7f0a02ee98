//! Story data model: choices, phases, and the presentation snapshot.

use crate::acts::Act;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of choice labels offered each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceLabel {
    A,
    B,
    C,
}

impl ChoiceLabel {
    /// All labels, in presentation order.
    pub const ALL: [ChoiceLabel; 3] = [ChoiceLabel::A, ChoiceLabel::B, ChoiceLabel::C];
}

impl fmt::Display for ChoiceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            ChoiceLabel::A => "A",
            ChoiceLabel::B => "B",
            ChoiceLabel::C => "C",
        };
        f.write_str(letter)
    }
}

impl FromStr for ChoiceLabel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(ChoiceLabel::A),
            "B" | "b" => Ok(ChoiceLabel::B),
            "C" | "c" => Ok(ChoiceLabel::C),
            _ => Err(()),
        }
    }
}

/// One selectable action offered to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: ChoiceLabel,
    pub desc: String,
}

/// Where a playthrough currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    NotStarted,
    InProgress,
    Ended,
}

/// A read-only snapshot of the engine state for the presentation layer.
///
/// Cloned out of the engine on request; nothing in it can mutate the
/// playthrough.
#[derive(Debug, Clone)]
pub struct StoryView {
    pub phase: GamePhase,
    pub theme: String,
    pub turn: u32,
    pub act: Act,
    /// Most recent narrative continuation. Empty before the opening lands.
    pub story: String,
    /// Current turn's choices. Regenerated every turn, empty once ended.
    pub choices: Vec<Choice>,
    /// The closing epilogue. Non-empty exactly when `phase` is `Ended`.
    pub ending: String,
    /// A generation is in flight.
    pub loading: bool,
    /// Last generation failure, if any. Cleared on every new attempt.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_display_round_trips_from_str() {
        for label in ChoiceLabel::ALL {
            assert_eq!(label.to_string().parse::<ChoiceLabel>(), Ok(label));
        }
    }

    #[test]
    fn test_label_from_str_rejects_unknown() {
        assert!("D".parse::<ChoiceLabel>().is_err());
        assert!("".parse::<ChoiceLabel>().is_err());
    }

    #[test]
    fn test_label_serde_uses_bare_letters() {
        assert_eq!(serde_json::to_string(&ChoiceLabel::B).unwrap(), "\"B\"");
        let label: ChoiceLabel = serde_json::from_str("\"C\"").unwrap();
        assert_eq!(label, ChoiceLabel::C);
    }
}
