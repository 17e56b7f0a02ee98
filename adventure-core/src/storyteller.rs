//! The generation port: the seam between the engine and its backend.

use async_trait::async_trait;
use thiserror::Error;

/// Sampling parameters for one generation request.
///
/// These are fixed constants of the game, not runtime knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl GenerationParams {
    /// Parameters for a regular decision turn.
    pub fn turn() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.75,
            top_p: 0.92,
        }
    }

    /// Parameters for the closing epilogue.
    pub fn ending() -> Self {
        Self {
            max_tokens: 220,
            ..Self::turn()
        }
    }
}

/// Errors a backend can report for one generation.
///
/// Parse failures are not represented here: they belong to the recovery
/// layer, after the backend has handed back raw text.
#[derive(Debug, Error)]
pub enum NarrateError {
    #[error("could not submit the generation request: {0}")]
    Submission(String),

    #[error("the generation service reported a failure: {0}")]
    Failed(String),

    #[error("the generation did not finish in time")]
    Timeout,
}

impl From<replicate::Error> for NarrateError {
    fn from(err: replicate::Error) -> Self {
        match err {
            replicate::Error::Failed(message) => NarrateError::Failed(message),
            replicate::Error::Timeout => NarrateError::Timeout,
            other => NarrateError::Submission(other.to_string()),
        }
    }
}

/// A backend that turns an instruction prompt into raw narrative text.
///
/// Implementations return the service's output already joined and trimmed;
/// the engine performs structural recovery on top.
#[async_trait]
pub trait Storyteller: Send + Sync {
    async fn generate(&self, prompt: &str, params: GenerationParams)
        -> Result<String, NarrateError>;
}

#[async_trait]
impl Storyteller for replicate::Replicate {
    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, NarrateError> {
        let input = replicate::GenerationInput {
            prompt: prompt.to_string(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };
        Ok(self.run(&input).await?)
    }
}
