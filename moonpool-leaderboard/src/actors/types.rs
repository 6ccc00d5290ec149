//! Core virtual actor types.
//!
//! These types form the messaging contract between actor callers and handlers.
//! The dispatch queues treat the body of an `ActorMessage` as opaque bytes, so
//! the same message could be carried by a network transport unchanged.
//!
//! # Design
//!
//! - `ActorType` is a u64 tag per entity kind.
//! - `ActorId` is `ActorType` + a string identity (e.g., a player uuid).
//! - `ActorMessage` carries the target identity, method discriminant, and
//!   serialized body. Only the handler knows which method is being called.
//! - `ActorResponse` wraps the serialized response body or the error the
//!   handler (or the runtime) produced.
//!
//! # Orleans Reference
//!
//! This follows Orleans' GrainReference pattern: the caller builds an
//! `ActorMessage` with identity + method + body and the host routes by
//! identity.

use serde::{Deserialize, Serialize};

use super::router::ActorError;

/// Identifies an actor TYPE.
///
/// This is a stable identifier for a class of actors, not a specific
/// instance. `LeaderboardActor` and `PlayerActor` each have their own
/// `ActorType`.
///
/// # Convention
///
/// Use a hex constant:
/// ```rust
/// use moonpool_leaderboard::actors::ActorType;
/// const LEADERBOARD: ActorType = ActorType(0x1EAD_B0A2);
/// ```
#[derive(Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct ActorType(pub u64);

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Full virtual actor address = type + string identity.
///
/// # Examples
///
/// ```rust
/// use moonpool_leaderboard::actors::{ActorId, ActorType};
///
/// let player = ActorId::new(ActorType(0x504C_4159), "player-42");
/// assert_eq!(player.identity, "player-42");
/// ```
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct ActorId {
    /// The type of actor (identifies the handler).
    pub actor_type: ActorType,
    /// The specific instance identity.
    pub identity: String,
}

impl ActorId {
    /// Create a new actor ID.
    pub fn new(actor_type: ActorType, identity: impl Into<String>) -> Self {
        Self {
            actor_type,
            identity: identity.into(),
        }
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.actor_type, self.identity)
    }
}

/// Message payload for virtual actor calls.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ActorMessage {
    /// The target actor instance.
    pub target: ActorId,
    /// Optional sender actor (for actor-to-actor calls).
    pub sender: Option<ActorId>,
    /// Method discriminant within the actor type (1, 2, 3, …).
    pub method: u32,
    /// Serialized method-specific request body.
    pub body: Vec<u8>,
    /// Number of times this message has been bounced between activations
    /// (prevents loops during deactivation races).
    pub forward_count: u8,
}

/// Response from a virtual actor.
///
/// The caller decodes the body using the expected response type for the
/// method called, or propagates the error.
#[derive(Debug)]
pub struct ActorResponse {
    /// Serialized method-specific response body, or the failure.
    pub body: Result<Vec<u8>, ActorError>,
}

/// Unique identifier for a specific actor activation.
///
/// When an actor is activated it gets a unique `ActivationId`. If it is
/// deactivated and later re-activated, it gets a new one. This
/// distinguishes stale directory entries from current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationId(pub u64);

impl ActivationId {
    /// Create a new activation ID from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ActivationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "act-{:016x}", self.0)
    }
}

/// Full address of an actor activation: identity + hosting node + activation.
///
/// This is the value stored in the directory. It tells you not just
/// *which* actor and *where* it lives, but *which specific activation*
/// is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorAddress {
    /// The actor's identity (type + key).
    pub actor_id: ActorId,
    /// Name of the node hosting this activation.
    pub node: String,
    /// Unique identifier for this specific activation.
    pub activation_id: ActivationId,
}

impl ActorAddress {
    /// Create a new actor address.
    pub fn new(actor_id: ActorId, node: impl Into<String>, activation_id: ActivationId) -> Self {
        Self {
            actor_id,
            node: node.into(),
            activation_id,
        }
    }
}
