//! Domain errors returned by the game actors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actors::{ActorError, ActorStateError};

use super::ids::PlayerId;

/// Errors returned by game actor operations.
///
/// Serializable so a failure inside one actor reaches the caller unchanged
/// as the reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum GameError {
    /// The player has no entry in the leaderboard's ranking.
    #[error("player {0} is not ranked on this leaderboard")]
    NotFound(PlayerId),

    /// Score and rank operations require a prior `JoinGame`.
    #[error("player has not joined a leaderboard")]
    NotJoined,

    /// A join was attempted while no leaderboard window is open.
    #[error("no leaderboard window is open")]
    NoActiveWindow,

    /// The leaderboard was never initialized.
    #[error("leaderboard {0} is not initialized")]
    UnknownLeaderboard(String),

    /// The window duration is negative or its end is not representable.
    #[error("invalid window: start {start}, duration {duration_ms}ms")]
    InvalidWindow {
        /// Requested opening instant.
        start: DateTime<Utc>,
        /// Requested duration in milliseconds.
        duration_ms: i64,
    },

    /// The player actor was addressed before `CreatePlayer`.
    #[error("player {0} does not exist")]
    UnknownPlayer(String),

    /// A player actor key is not a valid player id.
    #[error("invalid player identity: {0}")]
    InvalidIdentity(String),

    /// Applying the delta would take the score below zero.
    #[error("score {current} cannot absorb delta {delta}")]
    ScoreUnderflow {
        /// Score before the delta.
        current: u64,
        /// The rejected delta.
        delta: i64,
    },

    /// Persisting actor state failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The actor runtime failed to deliver the call.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<ActorError> for GameError {
    fn from(err: ActorError) -> Self {
        GameError::Runtime(err.to_string())
    }
}

impl From<ActorStateError> for GameError {
    fn from(err: ActorStateError) -> Self {
        GameError::Storage(err.to_string())
    }
}
