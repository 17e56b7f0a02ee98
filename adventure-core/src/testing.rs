//! Testing utilities for the adventure engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedStoryteller` for deterministic testing without API calls
//! - Payload builders for well-formed raw responses
//! - Assertion helpers for verifying engine state

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::engine::StoryEngine;
use crate::story::GamePhase;
use crate::storyteller::{GenerationParams, NarrateError, Storyteller};

/// One scripted backend reply.
pub enum ScriptedReply {
    /// Resolve with this raw output text.
    Text(String),
    /// Resolve with a generation failure carrying this message.
    Failure(String),
    /// Resolve with a timeout.
    Timeout,
    /// Hold the inner reply until the gate is notified.
    Gated(Arc<Notify>, Box<ScriptedReply>),
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub params: GenerationParams,
}

/// A mock storyteller that returns scripted replies in order.
///
/// Every call is recorded (prompt and parameters) before its reply
/// resolves, so tests can count submissions even while a gated reply is
/// still held open. An exhausted script resolves as a failure.
#[derive(Default)]
pub struct ScriptedStoryteller {
    replies: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedStoryteller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw-text reply.
    pub fn script_text(&self, text: impl Into<String>) {
        self.push(ScriptedReply::Text(text.into()));
    }

    /// Queue a well-formed turn payload built from a story line and three
    /// choice descriptions.
    pub fn script_turn(&self, story: &str, descs: [&str; 3]) {
        self.push(ScriptedReply::Text(turn_payload(story, descs)));
    }

    /// Queue a failure reply.
    pub fn script_failure(&self, message: impl Into<String>) {
        self.push(ScriptedReply::Failure(message.into()));
    }

    /// Queue a reply that is held open until the returned gate is notified.
    pub fn script_gated_text(&self, text: impl Into<String>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push(ScriptedReply::Gated(
            gate.clone(),
            Box::new(ScriptedReply::Text(text.into())),
        ));
        gate
    }

    /// Queue a gated well-formed turn payload.
    pub fn script_gated_turn(&self, story: &str, descs: [&str; 3]) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push(ScriptedReply::Gated(
            gate.clone(),
            Box::new(ScriptedReply::Text(turn_payload(story, descs))),
        ));
        gate
    }

    /// Queue an arbitrary reply.
    pub fn push(&self, reply: ScriptedReply) {
        self.lock_replies().push_back(reply);
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock_calls().clone()
    }

    /// How many generations have been submitted.
    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptedReply>> {
        self.replies.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl Storyteller for ScriptedStoryteller {
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, NarrateError> {
        self.lock_calls().push(RecordedCall {
            prompt: prompt.to_string(),
            params,
        });

        let mut reply = self
            .lock_replies()
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::Failure("script exhausted".to_string()));

        while let ScriptedReply::Gated(gate, inner) = reply {
            gate.notified().await;
            reply = *inner;
        }

        match reply {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Failure(message) => Err(NarrateError::Failed(message)),
            ScriptedReply::Timeout => Err(NarrateError::Timeout),
            ScriptedReply::Gated(..) => unreachable!("gates are unwrapped above"),
        }
    }
}

/// Build a valid raw turn response with the given story and descriptions.
pub fn turn_payload(story: &str, descs: [&str; 3]) -> String {
    serde_json::json!({
        "story": story,
        "choices": [
            { "label": "A", "desc": descs[0] },
            { "label": "B", "desc": descs[1] },
            { "label": "C", "desc": descs[2] },
        ],
    })
    .to_string()
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the engine is in the given phase.
#[track_caller]
pub fn assert_phase(engine: &StoryEngine, phase: GamePhase) {
    let actual = engine.phase();
    assert_eq!(actual, phase, "Expected phase {phase:?}, got {actual:?}");
}

/// Assert the engine is showing a pending error.
#[track_caller]
pub fn assert_has_error(engine: &StoryEngine) {
    let view = engine.view();
    assert!(
        view.error.is_some(),
        "Expected a pending error, state is clean"
    );
}

/// Assert the engine has no pending error.
#[track_caller]
pub fn assert_no_error(engine: &StoryEngine) {
    let view = engine.view();
    assert!(
        view.error.is_none(),
        "Expected no pending error, got {:?}",
        view.error
    );
}
