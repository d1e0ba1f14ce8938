//! Recoverable collaborator results.

use tracing::warn;

use super::StageName;
use crate::errors::CollaboratorError;

/// Result of a collaborator call as seen from inside a stage.
///
/// `Fallback` carries the reason; the stage decides what value replaces the
/// missing one, so the degraded path stays visible in its own control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Ok(T),
    Fallback(String),
}

impl<T> Attempt<T> {
    /// Validate or transform a successful value; a rejection becomes a fallback.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, String>) -> Attempt<U> {
        match self {
            Attempt::Ok(value) => match f(value) {
                Ok(next) => Attempt::Ok(next),
                Err(reason) => Attempt::Fallback(reason),
            },
            Attempt::Fallback(reason) => Attempt::Fallback(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Attempt::Fallback(_))
    }
}

/// Convert a collaborator result, logging the failure at warn level.
pub fn attempt<T>(stage: StageName, what: &str, result: Result<T, CollaboratorError>) -> Attempt<T> {
    match result {
        Ok(value) => Attempt::Ok(value),
        Err(err) => {
            warn!(stage = %stage, error = %err, "{} failed, using fallback", what);
            Attempt::Fallback(err.to_string())
        }
    }
}
