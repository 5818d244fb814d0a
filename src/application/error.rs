use thiserror::Error;

use crate::{
    application::{batch::BatchError, options::OptionsError},
    infra::error::InfraError,
};

/// Top-level failure surfaced by the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Error message followed by each of its causes, outermost first.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = std::error::Error::source(self);
        while let Some(inner) = current {
            let message = inner.to_string();
            if !messages.iter().any(|seen| seen.contains(&message)) {
                messages.push(message);
            }
            current = inner.source();
        }
        messages
    }
}
