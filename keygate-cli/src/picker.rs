//! Terminal key prompt.

use async_trait::async_trait;
use keygate_core::{KeyPicker, KeyStoreError, Provider, Secret};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Reads a key from standard input.
///
/// An empty line or end of input dismisses the prompt.
#[derive(Debug, Default)]
pub struct StdinPicker;

#[async_trait]
impl KeyPicker for StdinPicker {
    async fn pick_key(&self, provider: Provider) -> Result<Option<Secret>, KeyStoreError> {
        let prompt = format!(
            "Enter your {} API key (empty to cancel): ",
            provider.display_name()
        );

        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(prompt.as_bytes())
            .await
            .map_err(prompt_error)?;
        stderr.flush().await.map_err(prompt_error)?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let line = lines.next_line().await.map_err(prompt_error)?;

        Ok(line
            .map(|l| Secret::new(l.trim()))
            .filter(|secret| !secret.is_blank()))
    }
}

fn prompt_error(e: std::io::Error) -> KeyStoreError {
    KeyStoreError::Prompt {
        message: e.to_string(),
    }
}
