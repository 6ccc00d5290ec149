//! Actor router: caller-side request dispatch.
//!
//! The `ActorRouter` is the only way into the actor runtime. It serializes
//! the request body, hands an `ActorMessage` to the dispatch queue of the
//! target actor type, and awaits the reply.
//!
//! # Flow
//!
//! 1. Encode the method-specific request with the router's codec
//! 2. Build `ActorMessage` with target identity, method, and body
//! 3. Push it onto the queue registered for `target.actor_type`
//! 4. Await the `ActorResponse` on a oneshot channel, decode the body
//!
//! The host behind the queue activates the target on first use, so callers
//! never resolve or create actors themselves.
//!
//! # Orleans Reference
//!
//! This corresponds to Orleans' OutsideRuntimeClient / GrainReference:
//! the caller-side proxy that locates grains and sends messages.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::codec::{CodecError, JsonCodec, MessageCodec};
use super::directory::DirectoryError;
use super::state::ActorStateError;
use super::types::{ActorId, ActorMessage, ActorResponse, ActorType};

/// Errors from the actor runtime.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    /// No host is registered for this actor type.
    #[error("unknown actor type: {0}")]
    UnknownActorType(ActorType),

    /// The node is not running (not started yet, or shut down).
    #[error("node is not accepting requests")]
    NodeStopped,

    /// The activation went away without replying.
    #[error("activation of {0} dropped the request")]
    MailboxClosed(ActorId),

    /// The actor could not be brought into memory.
    #[error("activation of {id} failed: {reason}")]
    ActivationFailed {
        /// The actor that failed to activate.
        id: ActorId,
        /// Why activation failed.
        reason: String,
    },

    /// The message was bounced between activations too many times.
    #[error("too many forwards for {id} (max: {max})")]
    TooManyForwards {
        /// The target actor.
        id: ActorId,
        /// The configured limit.
        max: u8,
    },

    /// Codec serialization/deserialization error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The method discriminant is not recognized by the actor handler.
    #[error("unknown method: {0}")]
    UnknownMethod(u32),

    /// Reading or writing actor state failed.
    #[error("state error: {0}")]
    State(#[from] ActorStateError),

    /// The node was started without a state store.
    #[error("no state store configured")]
    StateStoreMissing,

    /// Directory registration failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

/// A message in flight together with the channel its reply goes to.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) message: ActorMessage,
    pub(crate) reply: oneshot::Sender<ActorResponse>,
}

impl Envelope {
    /// Answer the caller with an error, dropping the message.
    pub(crate) fn fail(self, error: ActorError) {
        let _ = self.reply.send(ActorResponse { body: Err(error) });
    }
}

/// Caller-side actor request router.
///
/// # Example
///
/// ```rust,ignore
/// let rank: Result<u64, GameError> = router
///     .send_actor_request(&board_id, None, leaderboard_methods::GET_PLAYER_RANK, &player_id)
///     .await?;
/// ```
pub struct ActorRouter<C: MessageCodec = JsonCodec> {
    queues: RefCell<HashMap<ActorType, mpsc::UnboundedSender<Envelope>>>,
    codec: C,
}

impl<C: MessageCodec> ActorRouter<C> {
    /// Create a router with no actor types registered.
    pub fn new(codec: C) -> Self {
        Self {
            queues: RefCell::new(HashMap::new()),
            codec,
        }
    }

    /// Get a reference to the codec used by this router.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub(crate) fn register_queue(
        &self,
        actor_type: ActorType,
        queue: mpsc::UnboundedSender<Envelope>,
    ) {
        self.queues.borrow_mut().insert(actor_type, queue);
    }

    /// Drop every dispatch queue; later requests fail with `NodeStopped`.
    pub(crate) fn close(&self) {
        self.queues.borrow_mut().clear();
    }

    /// Send a request to a virtual actor and await its reply.
    ///
    /// # Arguments
    ///
    /// * `target` - The target actor identity
    /// * `sender` - The calling actor, when the call is made from inside a turn
    /// * `method` - Method discriminant (1, 2, 3, …)
    /// * `req` - The method-specific request payload
    pub async fn send_actor_request<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        target: &ActorId,
        sender: Option<&ActorId>,
        method: u32,
        req: &Req,
    ) -> Result<Resp, ActorError> {
        let body = self.codec.encode(req)?;

        let message = ActorMessage {
            target: target.clone(),
            sender: sender.cloned(),
            method,
            body,
            forward_count: 0,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(Envelope {
            message,
            reply: reply_tx,
        })?;

        let response = reply_rx
            .await
            .map_err(|_| ActorError::MailboxClosed(target.clone()))?;

        let body = response.body?;
        Ok(self.codec.decode(&body)?)
    }

    fn enqueue(&self, envelope: Envelope) -> Result<(), ActorError> {
        let queues = self.queues.borrow();
        if queues.is_empty() {
            return Err(ActorError::NodeStopped);
        }
        let actor_type = envelope.message.target.actor_type;
        let queue = queues
            .get(&actor_type)
            .ok_or(ActorError::UnknownActorType(actor_type))?;
        queue.send(envelope).map_err(|_| ActorError::NodeStopped)
    }
}

impl<C: MessageCodec> std::fmt::Debug for ActorRouter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRouter")
            .field("actor_types", &self.queues.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
