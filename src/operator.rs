//! Operator interaction seam.
//!
//! The core asks yes/no questions in two places: when the target directory
//! is missing and when a transfer is interrupted. How the question reaches a
//! human is up to the caller.

use async_trait::async_trait;
use thiserror::Error;

/// Failure to obtain an answer.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// No interactive terminal, or the prompt itself failed.
    #[error("operator prompt unavailable: {0}")]
    Unavailable(String),
}

/// Answers binary questions.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Asks `prompt` and returns the operator's choice.
    async fn confirm(&self, prompt: &str) -> Result<bool, OperatorError>;
}

/// Operator that gives the same answer to every question without prompting.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Operator for FixedAnswer {
    async fn confirm(&self, _prompt: &str) -> Result<bool, OperatorError> {
        Ok(self.0)
    }
}
