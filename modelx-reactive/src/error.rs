//! Errors reported by the observable graph

use thiserror::Error;

/// Errors raised while flushing reactions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    #[error("Reactions did not settle after {rounds} rounds, probably a reaction cycle")]
    ReactionCycle { rounds: usize },
}

pub type ReactiveResult<T> = Result<T, ReactiveError>;
