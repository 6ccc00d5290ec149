//! Game-level settings shared by the actors and the gateway.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::GameError;

const DEFAULT_NEIGHBOUR_COUNT: usize = 3;
const DEFAULT_REGISTRY_IDENTITY: &str = "registry";
const DEFAULT_HOST_IDENTITY: &str = "game-host";

/// What `AddScore` does when a negative delta exceeds the current score.
///
/// Positive deltas saturate at `u64::MAX` under `Reject` and `Clamp`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreUnderflowPolicy {
    /// Fail with [`GameError::ScoreUnderflow`] and leave the score untouched.
    #[default]
    Reject,
    /// Stop at zero.
    Clamp,
    /// Wrapping unsigned arithmetic.
    Wrap,
}

impl ScoreUnderflowPolicy {
    /// Apply `delta` to `current` under this policy.
    pub fn apply(self, current: u64, delta: i64) -> Result<u64, GameError> {
        match self {
            ScoreUnderflowPolicy::Reject => {
                if delta < 0 && delta.unsigned_abs() > current {
                    return Err(GameError::ScoreUnderflow { current, delta });
                }
                Ok(current.saturating_add_signed(delta))
            }
            ScoreUnderflowPolicy::Clamp => Ok(current.saturating_add_signed(delta)),
            ScoreUnderflowPolicy::Wrap => Ok(current.wrapping_add_signed(delta)),
        }
    }
}

impl fmt::Display for ScoreUnderflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreUnderflowPolicy::Reject => "reject",
            ScoreUnderflowPolicy::Clamp => "clamp",
            ScoreUnderflowPolicy::Wrap => "wrap",
        };
        f.write_str(name)
    }
}

impl FromStr for ScoreUnderflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(ScoreUnderflowPolicy::Reject),
            "clamp" => Ok(ScoreUnderflowPolicy::Clamp),
            "wrap" => Ok(ScoreUnderflowPolicy::Wrap),
            other => Err(format!(
                "unknown underflow policy '{other}' (expected reject, clamp or wrap)"
            )),
        }
    }
}

/// Game configuration.
///
/// # Example
///
/// ```rust
/// use moonpool_leaderboard::game::{GameConfig, ScoreUnderflowPolicy};
///
/// let config = GameConfig::builder()
///     .underflow_policy(ScoreUnderflowPolicy::Clamp)
///     .build();
/// assert_eq!(config.neighbour_count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct GameConfig {
    underflow_policy: ScoreUnderflowPolicy,
    neighbour_count: usize,
    registry_identity: String,
    host_identity: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig::builder().build()
    }
}

impl GameConfig {
    /// Start building a game configuration.
    pub fn builder() -> GameConfigBuilder {
        GameConfigBuilder::default()
    }

    /// Policy applied by players to negative deltas.
    pub fn underflow_policy(&self) -> ScoreUnderflowPolicy {
        self.underflow_policy
    }

    /// How many neighbours `GetAboveMe3Players` / `GetBelowMe3Players` return.
    pub fn neighbour_count(&self) -> usize {
        self.neighbour_count
    }

    /// Key of the single player registry actor.
    pub fn registry_identity(&self) -> &str {
        &self.registry_identity
    }

    /// Key of the single game host actor.
    pub fn host_identity(&self) -> &str {
        &self.host_identity
    }
}

/// Builder for [`GameConfig`].
#[derive(Debug, Clone, Default)]
pub struct GameConfigBuilder {
    underflow_policy: ScoreUnderflowPolicy,
    neighbour_count: Option<usize>,
    registry_identity: Option<String>,
    host_identity: Option<String>,
}

impl GameConfigBuilder {
    /// Set the score underflow policy.
    pub fn underflow_policy(mut self, policy: ScoreUnderflowPolicy) -> Self {
        self.underflow_policy = policy;
        self
    }

    /// Set the neighbour count.
    pub fn neighbour_count(mut self, count: usize) -> Self {
        self.neighbour_count = Some(count);
        self
    }

    /// Set the registry actor key.
    pub fn registry_identity(mut self, identity: impl Into<String>) -> Self {
        self.registry_identity = Some(identity.into());
        self
    }

    /// Set the game host actor key.
    pub fn host_identity(mut self, identity: impl Into<String>) -> Self {
        self.host_identity = Some(identity.into());
        self
    }

    /// Build the configuration (infallible).
    pub fn build(self) -> GameConfig {
        GameConfig {
            underflow_policy: self.underflow_policy,
            neighbour_count: self.neighbour_count.unwrap_or(DEFAULT_NEIGHBOUR_COUNT),
            registry_identity: self
                .registry_identity
                .unwrap_or_else(|| DEFAULT_REGISTRY_IDENTITY.to_string()),
            host_identity: self
                .host_identity
                .unwrap_or_else(|| DEFAULT_HOST_IDENTITY.to_string()),
        }
    }
}
