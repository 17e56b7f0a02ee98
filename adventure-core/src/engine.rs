//! The narrative state machine.
//!
//! One `StoryEngine` owns one playthrough: theme, turn counter, story text,
//! choices, and the ending. The presentation layer drives it through
//! `start`, `choose`, `retry`, and `reset`, and reads it through `view`.
//!
//! A single generation is in flight at a time; reentrant `start`/`choose`
//! calls are rejected while loading. Every generation carries the epoch it
//! was issued under, and a result whose epoch no longer matches the live
//! state is discarded wholesale, so a reset mid-generation can never be
//! overwritten by the stale response when it finally lands.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::acts::{act_for, Act, TOTAL_DECISION_TURNS};
use crate::prompt::{build_ending_prompt, build_turn_prompt, trailing_context};
use crate::recover::{recover_ending, recover_turn};
use crate::story::{Choice, ChoiceLabel, GamePhase, StoryView};
use crate::storyteller::{GenerationParams, Storyteller};

/// Errors from invalid engine calls.
///
/// Generation failures are not `Err` returns: they surface as the pending
/// error on [`StoryView`], where the presentation layer offers a retry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a theme is required to start a story")]
    EmptyTheme,

    #[error("a story is already in progress")]
    AlreadyPlaying,

    #[error("no story is in progress")]
    NotPlaying,

    #[error("the story has already ended")]
    GameOver,

    #[error("a generation is already in flight")]
    Busy,

    #[error("no such choice is on offer: {0}")]
    UnknownChoice(ChoiceLabel),

    #[error("there is no failed request to retry")]
    NothingToRetry,

    #[error("no API token configured - set REPLICATE_API_TOKEN")]
    NoApiToken,
}

/// Whether a request expects a structured turn payload or a plain epilogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Turn,
    Ending,
}

/// A fully composed generation request, kept for exact replay on retry.
#[derive(Debug, Clone)]
struct StoryRequest {
    prompt: String,
    params: GenerationParams,
    kind: RequestKind,
}

/// Everything one playthrough owns, behind a single lock.
struct EngineState {
    phase: GamePhase,
    theme: String,
    turn: u32,
    story: String,
    choices: Vec<Choice>,
    ending: String,
    error: Option<String>,
    loading: bool,
    /// Bumped on every reset/restart; stale generation results are
    /// recognized by a mismatched epoch and dropped.
    epoch: u64,
    /// Cancels the in-flight generation, if any. Replaced on reset.
    cancel: CancellationToken,
    /// The last issued request, retained until it has been applied.
    last_request: Option<StoryRequest>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            phase: GamePhase::NotStarted,
            theme: String::new(),
            turn: 0,
            story: String::new(),
            choices: Vec::new(),
            ending: String::new(),
            error: None,
            loading: false,
            epoch: 0,
            cancel: CancellationToken::new(),
            last_request: None,
        }
    }

    /// Wipe the playthrough: cancel anything in flight, bump the epoch,
    /// and return every field to its initial value.
    fn clear(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.epoch += 1;
        self.phase = GamePhase::NotStarted;
        self.theme.clear();
        self.turn = 0;
        self.story.clear();
        self.choices.clear();
        self.ending.clear();
        self.error = None;
        self.loading = false;
        self.last_request = None;
    }
}

/// The narrative generation engine for one playthrough.
///
/// Cheap to clone; clones share the same playthrough, which is how a
/// presentation layer calls `reset` while a generation is outstanding.
#[derive(Clone)]
pub struct StoryEngine {
    backend: Arc<dyn Storyteller>,
    state: Arc<Mutex<EngineState>>,
}

impl StoryEngine {
    /// Create an engine over the given backend.
    pub fn new(backend: Arc<dyn Storyteller>) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(EngineState::new())),
        }
    }

    /// Create an engine over a Replicate backend configured from
    /// the REPLICATE_API_TOKEN environment variable.
    pub fn from_env() -> Result<Self, EngineError> {
        let backend = replicate::Replicate::from_env().map_err(|_| EngineError::NoApiToken)?;
        Ok(Self::new(Arc::new(backend)))
    }

    /// Begin a new playthrough with the given theme.
    ///
    /// Valid from `NotStarted` or `Ended` (restart implies a reset). The
    /// call suspends until the opening generation has been applied.
    pub async fn start(&self, theme: &str) -> Result<(), EngineError> {
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(EngineError::EmptyTheme);
        }

        let (request, epoch, cancel) = {
            let mut state = self.state();
            if state.phase == GamePhase::InProgress {
                return Err(EngineError::AlreadyPlaying);
            }
            state.clear();
            state.phase = GamePhase::InProgress;
            state.theme = theme.to_string();

            let request = StoryRequest {
                prompt: build_turn_prompt(theme, "", Act::One, None),
                params: GenerationParams::turn(),
                kind: RequestKind::Turn,
            };
            state.loading = true;
            state.last_request = Some(request.clone());
            (request, state.epoch, state.cancel.clone())
        };

        self.generate(request, epoch, cancel).await;
        Ok(())
    }

    /// Play the choice carrying the given label.
    ///
    /// Rejected while a generation is in flight or once the story has
    /// ended; a rejection has no observable effect. Advances the turn
    /// counter by exactly one and issues the ending generation when the
    /// counter reaches the final decision turn.
    pub async fn choose(&self, label: ChoiceLabel) -> Result<(), EngineError> {
        let (request, epoch, cancel) = {
            let mut state = self.state();
            match state.phase {
                GamePhase::NotStarted => return Err(EngineError::NotPlaying),
                GamePhase::Ended => return Err(EngineError::GameOver),
                GamePhase::InProgress => {}
            }
            if state.loading {
                return Err(EngineError::Busy);
            }
            if !state.choices.iter().any(|c| c.label == label) {
                return Err(EngineError::UnknownChoice(label));
            }

            // The prompt names the act the decision was made in, so it is
            // taken before the counter advances.
            let act = act_for(state.turn);
            state.turn += 1;
            let is_ending = state.turn >= TOTAL_DECISION_TURNS;

            let context = trailing_context(&state.story).to_string();
            let request = if is_ending {
                StoryRequest {
                    prompt: build_ending_prompt(&context),
                    params: GenerationParams::ending(),
                    kind: RequestKind::Ending,
                }
            } else {
                StoryRequest {
                    prompt: build_turn_prompt(&state.theme, &context, act, Some(label)),
                    params: GenerationParams::turn(),
                    kind: RequestKind::Turn,
                }
            };
            state.error = None;
            state.loading = true;
            state.last_request = Some(request.clone());
            (request, state.epoch, state.cancel.clone())
        };

        self.generate(request, epoch, cancel).await;
        Ok(())
    }

    /// Re-issue the exact request that last failed.
    ///
    /// The stored prompt and parameters are replayed byte for byte; the
    /// pending error is cleared for the new attempt.
    pub async fn retry(&self) -> Result<(), EngineError> {
        let (request, epoch, cancel) = {
            let mut state = self.state();
            if state.phase != GamePhase::InProgress {
                return Err(EngineError::NotPlaying);
            }
            if state.loading {
                return Err(EngineError::Busy);
            }
            let request = state
                .last_request
                .clone()
                .ok_or(EngineError::NothingToRetry)?;
            state.error = None;
            state.loading = true;
            (request, state.epoch, state.cancel.clone())
        };

        self.generate(request, epoch, cancel).await;
        Ok(())
    }

    /// Abandon the playthrough and return to `NotStarted`.
    ///
    /// Valid from any state, idempotent, and safe to call while a
    /// generation is outstanding: the in-flight result will be discarded.
    pub fn reset(&self) {
        self.state().clear();
    }

    /// Snapshot the current state for the presentation layer.
    pub fn view(&self) -> StoryView {
        let state = self.state();
        StoryView {
            phase: state.phase,
            theme: state.theme.clone(),
            turn: state.turn,
            act: act_for(state.turn),
            story: state.story.clone(),
            choices: state.choices.clone(),
            ending: state.ending.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.state().phase
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn turn(&self) -> u32 {
        self.state().turn
    }

    pub fn act(&self) -> Act {
        act_for(self.state().turn)
    }

    /// Run one generation and apply its outcome.
    ///
    /// The lock is never held across the await. On completion the epoch is
    /// checked first: a mismatch means the playthrough this request was
    /// issued for no longer exists, and the result is dropped untouched.
    async fn generate(&self, request: StoryRequest, epoch: u64, cancel: CancellationToken) {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.backend.generate(&request.prompt, request.params) => Some(result),
        };

        let mut state = self.state();
        if state.epoch != epoch {
            log::debug!("discarding generation result issued for a superseded playthrough");
            return;
        }
        state.loading = false;

        let result = match outcome {
            Some(result) => result,
            None => return,
        };

        match result {
            Ok(raw) => match request.kind {
                RequestKind::Ending => {
                    state.ending = recover_ending(&raw);
                    state.choices.clear();
                    state.phase = GamePhase::Ended;
                    state.last_request = None;
                }
                RequestKind::Turn => match recover_turn(&raw) {
                    Ok(payload) => {
                        state.story = payload.story;
                        state.choices = payload.choices;
                        state.last_request = None;
                    }
                    Err(err) => {
                        // No partial commit: story and choices are left as
                        // they were, the request stays replayable.
                        log::warn!("generation produced an unusable payload: {err}");
                        state.error = Some(err.to_string());
                    }
                },
            },
            Err(err) => {
                log::warn!("generation failed: {err}");
                state.error = Some(err.to_string());
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedStoryteller;

    #[test]
    fn test_fresh_engine_view() {
        let engine = StoryEngine::new(Arc::new(ScriptedStoryteller::new()));
        let view = engine.view();

        assert_eq!(view.phase, GamePhase::NotStarted);
        assert_eq!(view.turn, 0);
        assert_eq!(view.act, Act::One);
        assert!(view.story.is_empty());
        assert!(view.choices.is_empty());
        assert!(view.ending.is_empty());
        assert!(!view.loading);
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn test_start_rejects_blank_theme() {
        let engine = StoryEngine::new(Arc::new(ScriptedStoryteller::new()));
        assert!(matches!(
            engine.start("   ").await,
            Err(EngineError::EmptyTheme)
        ));
        assert_eq!(engine.phase(), GamePhase::NotStarted);
    }

    #[tokio::test]
    async fn test_choose_before_start_is_rejected() {
        let engine = StoryEngine::new(Arc::new(ScriptedStoryteller::new()));
        assert!(matches!(
            engine.choose(ChoiceLabel::A).await,
            Err(EngineError::NotPlaying)
        ));
    }
}
