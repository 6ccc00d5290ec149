//! Typed actor reference construction trait.
//!
//! [`ActorRef`] enables the `node.actor_ref::<LeaderboardRef>("id")` and
//! `ctx.actor_ref::<PlayerRef<C>>("id")` patterns. Building a reference is
//! pure addressing: nothing is sent until a method is called on it.

use std::rc::Rc;

use super::codec::{JsonCodec, MessageCodec};
use super::router::ActorRouter;
use super::types::ActorId;

/// Trait for constructing typed actor references from a router.
///
/// The codec parameter defaults to [`JsonCodec`] for external usage
/// (e.g. `node.actor_ref()`), but can be any codec when used inside
/// actors via `ctx.actor_ref()`.
pub trait ActorRef<C: MessageCodec = JsonCodec>: Sized {
    /// Create a reference to the actor with the given identity.
    ///
    /// `caller` is recorded as the sender of every request made through the
    /// reference; it is `None` outside of actor turns.
    fn from_router(
        identity: impl Into<String>,
        router: &Rc<ActorRouter<C>>,
        caller: Option<&ActorId>,
    ) -> Self;
}
