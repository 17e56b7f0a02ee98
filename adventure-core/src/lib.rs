//! Three-act interactive adventure engine.
//!
//! This crate provides:
//! - A fixed three-act schedule over six decision turns
//! - Prompt assembly for an external text-generation service
//! - Recovery of structured results from noisy model output
//! - A narrative state machine that orchestrates a playthrough
//!
//! # Quick Start
//!
//! ```ignore
//! use adventure_core::StoryEngine;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = StoryEngine::from_env()?;
//!     engine.start("a forgetful wizard").await?;
//!
//!     let view = engine.view();
//!     println!("{}", view.story);
//!     for choice in &view.choices {
//!         println!("{}: {}", choice.label, choice.desc);
//!     }
//!     Ok(())
//! }
//! ```

pub mod acts;
pub mod engine;
pub mod prompt;
pub mod recover;
pub mod story;
pub mod storyteller;
pub mod testing;

// Primary public API
pub use acts::{act_for, Act, TOTAL_DECISION_TURNS, TURNS_PER_ACT};
pub use engine::{EngineError, StoryEngine};
pub use recover::{recover_ending, recover_turn, RecoverError, TurnPayload};
pub use story::{Choice, ChoiceLabel, GamePhase, StoryView};
pub use storyteller::{GenerationParams, NarrateError, Storyteller};
pub use testing::{RecordedCall, ScriptedStoryteller};
