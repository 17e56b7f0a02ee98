//! The fixed three-act schedule.
//!
//! A playthrough is six decision turns split across three dramatic acts.
//! The act is always derived from the turn counter; it is never stored.

/// Decision turns allotted to each act, in act order.
pub const TURNS_PER_ACT: [u32; 3] = [2, 3, 1];

/// Total decision turns in a playthrough.
pub const TOTAL_DECISION_TURNS: u32 = 6;

// The schedule and the total must agree.
const _: () = assert!(
    TURNS_PER_ACT[0] + TURNS_PER_ACT[1] + TURNS_PER_ACT[2] == TOTAL_DECISION_TURNS
);

/// One of the three dramatic acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Act {
    One,
    Two,
    Three,
}

impl Act {
    /// The act's 1-based number, as shown to the player.
    pub fn number(self) -> u8 {
        match self {
            Act::One => 1,
            Act::Two => 2,
            Act::Three => 3,
        }
    }

    /// Thematic direction handed to the narrator for this act.
    pub fn guidance(self) -> &'static str {
        match self {
            Act::One => {
                "Act 1 - Introduction: introduce the protagonist and setting, plant the seed of a conflict."
            }
            Act::Two => "Act 2 - Conflict: the problem deepens, tension rises.",
            Act::Three => {
                "Act 3 - Climax & Resolution: a critical decision, its consequences, a small open ending."
            }
        }
    }
}

impl std::fmt::Display for Act {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// The act a given turn belongs to.
///
/// Pure cumulative scan over [`TURNS_PER_ACT`]; turns past the end of the
/// schedule clamp to the final act.
pub fn act_for(turn: u32) -> Act {
    let mut cumulative = 0;
    for (act, quota) in [Act::One, Act::Two, Act::Three].into_iter().zip(TURNS_PER_ACT) {
        cumulative += quota;
        if turn < cumulative {
            return act;
        }
    }
    Act::Three
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_act_boundaries() {
        assert_eq!(act_for(0), Act::One);
        assert_eq!(act_for(1), Act::One);
        assert_eq!(act_for(2), Act::Two);
        assert_eq!(act_for(3), Act::Two);
        assert_eq!(act_for(4), Act::Two);
        assert_eq!(act_for(5), Act::Three);
    }

    #[test]
    fn test_act_is_monotonic_over_the_schedule() {
        let acts: Vec<Act> = (0..TOTAL_DECISION_TURNS).map(act_for).collect();
        assert!(acts.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_past_schedule_clamps_to_final_act() {
        assert_eq!(act_for(6), Act::Three);
        assert_eq!(act_for(100), Act::Three);
    }

    #[test]
    fn test_act_numbers() {
        assert_eq!(Act::One.number(), 1);
        assert_eq!(Act::Two.number(), 2);
        assert_eq!(Act::Three.number(), 3);
    }
}
