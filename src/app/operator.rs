//! Interactive operator backed by `dialoguer`.

use async_trait::async_trait;
use catalog_sync_core::{Operator, OperatorError};
use dialoguer::Confirm;

/// Asks yes/no questions on the controlling terminal. Defaults to "no".
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalOperator;

#[async_trait]
impl Operator for TerminalOperator {
    async fn confirm(&self, prompt: &str) -> Result<bool, OperatorError> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(prompt)
                .show_default(true)
                .default(false)
                .interact()
        })
        .await
        .map_err(|e| OperatorError::Unavailable(e.to_string()))?
        .map_err(|e| OperatorError::Unavailable(e.to_string()))
    }
}
