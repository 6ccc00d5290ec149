//! ActorHost: server-side runtime for virtual actors.
//!
//! Each registered actor type gets a dispatch loop. The loop owns one
//! mailbox per live activation and routes every incoming message by
//! identity, activating the target on first use. Each activation is its own
//! local task that loads state, then drains its mailbox one message at a
//! time.
//!
//! # Orleans Model
//!
//! Turn-based concurrency: one message at a time per actor instance. A turn
//! that awaits another actor suspends only its own activation, so other
//! instances (of any type) keep serving requests meanwhile.
//!
//! # Deactivation
//!
//! An activation stops when its mailbox closes (node shutdown), when it has
//! been idle for the configured timeout, or after a turn that called
//! [`ActorContext::deactivate_on_idle`]. Messages that reach a stopping
//! activation are bounced back to the dispatch loop and served by a fresh
//! activation.
//!
//! Bounced messages go on their own queue, which the dispatch loop drains
//! before taking anything new from the type inbox. Messages for one identity
//! therefore keep their arrival order across a deactivation.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::actor_ref::ActorRef;
use super::codec::{JsonCodec, MessageCodec};
use super::directory::ActorDirectory;
use super::router::{ActorError, ActorRouter, Envelope};
use super::state::ActorStateStore;
use super::types::{ActivationId, ActorAddress, ActorId, ActorResponse, ActorType};

/// Upper bound on how often a message may be bounced between activations.
const MAX_FORWARDS: u8 = 8;

/// Context provided to actor methods during dispatch.
///
/// Gives the actor access to its own identity, the state store, and a
/// router for calling other actors.
pub struct ActorContext<C: MessageCodec = JsonCodec> {
    /// The identity of the actor currently being invoked.
    pub id: ActorId,
    /// The activation serving this actor.
    pub activation_id: ActivationId,
    /// Router for calling other actors.
    pub router: Rc<ActorRouter<C>>,
    state_store: Option<Rc<dyn ActorStateStore>>,
    sender: RefCell<Option<ActorId>>,
    deactivate_requested: Cell<bool>,
}

impl<C: MessageCodec> ActorContext<C> {
    /// The node's state store.
    pub fn state_store(&self) -> Result<Rc<dyn ActorStateStore>, ActorError> {
        self.state_store.clone().ok_or(ActorError::StateStoreMissing)
    }

    /// The codec used for request and response bodies.
    pub fn codec(&self) -> &C {
        self.router.codec()
    }

    /// The actor that sent the message of the current turn, if any.
    ///
    /// `None` for calls made from outside an actor.
    pub fn sender(&self) -> Option<ActorId> {
        self.sender.borrow().clone()
    }

    /// Typed reference to another actor, recording this actor as the sender.
    pub fn actor_ref<R: ActorRef<C>>(&self, identity: impl Into<String>) -> R {
        R::from_router(identity, &self.router, Some(&self.id))
    }

    /// Ask the host to deactivate this activation once the current turn ends.
    ///
    /// Anything not yet written to the state store is lost.
    pub fn deactivate_on_idle(&self) {
        self.deactivate_requested.set(true);
    }

    fn take_deactivation_request(&self) -> bool {
        self.deactivate_requested.replace(false)
    }
}

/// Trait implemented by each actor type for method dispatch.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Counter { value: i64 }
///
/// #[async_trait(?Send)]
/// impl ActorHandler for Counter {
///     fn actor_type() -> ActorType { ActorType(0xC0_FFEE) }
///
///     async fn dispatch<C: MessageCodec>(
///         &mut self,
///         ctx: &ActorContext<C>,
///         method: u32,
///         body: &[u8],
///     ) -> Result<Vec<u8>, ActorError> {
///         match method {
///             1 => { /* increment */ }
///             _ => Err(ActorError::UnknownMethod(method)),
///         }
///     }
/// }
/// ```
#[async_trait::async_trait(?Send)]
pub trait ActorHandler: 'static {
    /// The actor type ID served by this handler.
    fn actor_type() -> ActorType;

    /// Called once per activation before the first message is dispatched.
    ///
    /// Load persisted state here. An error fails every request queued for
    /// this activation; the next request tries again.
    async fn on_activate<C: MessageCodec>(
        &mut self,
        _ctx: &ActorContext<C>,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    /// Called once when the activation stops.
    async fn on_deactivate<C: MessageCodec>(
        &mut self,
        _ctx: &ActorContext<C>,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    /// Dispatch one method call (one turn).
    ///
    /// # Arguments
    ///
    /// * `ctx` - Context with the actor's identity, state store and router
    /// * `method` - Method discriminant (1, 2, 3, …)
    /// * `body` - Serialized method-specific request body
    async fn dispatch<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        method: u32,
        body: &[u8],
    ) -> Result<Vec<u8>, ActorError>;
}

/// Builds a fresh handler instance for each activation.
pub(crate) type HandlerFactory<H> = Rc<dyn Fn() -> H>;

/// Everything a dispatch loop shares with the node.
pub(crate) struct HostParts<C: MessageCodec> {
    pub(crate) node_name: Rc<str>,
    pub(crate) router: Rc<ActorRouter<C>>,
    pub(crate) directory: Rc<dyn ActorDirectory>,
    pub(crate) state_store: Option<Rc<dyn ActorStateStore>>,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) activation_counter: Rc<Cell<u64>>,
    pub(crate) pending_tasks: Rc<Cell<usize>>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl<C: MessageCodec> Clone for HostParts<C> {
    fn clone(&self) -> Self {
        Self {
            node_name: self.node_name.clone(),
            router: self.router.clone(),
            directory: self.directory.clone(),
            state_store: self.state_store.clone(),
            idle_timeout: self.idle_timeout,
            activation_counter: self.activation_counter.clone(),
            pending_tasks: self.pending_tasks.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Decrements the node's pending task count when a host task ends.
struct TaskGuard(Rc<Cell<usize>>);

impl TaskGuard {
    fn new(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        Self(counter.clone())
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// Start serving actor type `H`: register its queue and spawn its dispatch loop.
///
/// Must be called from inside a `tokio::task::LocalSet`.
pub(crate) fn start_actor_type<H: ActorHandler, C: MessageCodec>(
    factory: HandlerFactory<H>,
    parts: HostParts<C>,
) {
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    parts.router.register_queue(H::actor_type(), inbox_tx);

    let guard = TaskGuard::new(&parts.pending_tasks);
    tokio::task::spawn_local(async move {
        let _guard = guard;
        dispatch_loop(factory, parts, inbox_rx).await;
    });
}

/// Routes messages for one actor type to per-activation mailboxes.
async fn dispatch_loop<H: ActorHandler, C: MessageCodec>(
    factory: HandlerFactory<H>,
    parts: HostParts<C>,
    mut inbox: mpsc::UnboundedReceiver<Envelope>,
) {
    let actor_type = H::actor_type();
    let (bounce_tx, mut bounced) = mpsc::unbounded_channel();
    let mut dispatcher = Dispatcher {
        factory,
        parts,
        bounce_tx,
        mailboxes: HashMap::new(),
    };
    let mut shutdown = dispatcher.parts.shutdown.clone();

    tracing::debug!(actor_type = %actor_type, node = %dispatcher.parts.node_name, "dispatch loop started");

    while !*shutdown.borrow() {
        let envelope = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            Some(envelope) = bounced.recv() => envelope,
            envelope = inbox.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };
        dispatcher.route(envelope, &mut bounced);
    }

    inbox.close();
    bounced.close();
    while let Ok(envelope) = bounced.try_recv() {
        envelope.fail(ActorError::NodeStopped);
    }
    while let Ok(envelope) = inbox.try_recv() {
        envelope.fail(ActorError::NodeStopped);
    }
    // Dropping the mailboxes lets every activation drain and stop.
    drop(dispatcher.mailboxes);

    tracing::debug!(actor_type = %actor_type, node = %dispatcher.parts.node_name, "dispatch loop stopped");
}

/// Mailboxes of the live activations of one actor type.
struct Dispatcher<H: ActorHandler, C: MessageCodec> {
    factory: HandlerFactory<H>,
    parts: HostParts<C>,
    bounce_tx: mpsc::UnboundedSender<Envelope>,
    mailboxes: HashMap<String, mpsc::UnboundedSender<Envelope>>,
}

impl<H: ActorHandler, C: MessageCodec> Dispatcher<H, C> {
    /// Deliver `envelope` to its activation, starting one if needed.
    fn route(&mut self, envelope: Envelope, bounced: &mut mpsc::UnboundedReceiver<Envelope>) {
        let identity = envelope.message.target.identity.clone();
        let envelope = match self.mailboxes.get(&identity) {
            Some(mailbox) => match mailbox.send(envelope) {
                Ok(()) => return,
                Err(mpsc::error::SendError(envelope)) => envelope,
            },
            None => envelope,
        };

        // The activation has stopped and already bounced what it held.
        // Those messages are older than this one, so they go first.
        if self.mailboxes.remove(&identity).is_some() {
            while let Ok(earlier) = bounced.try_recv() {
                self.route(earlier, bounced);
            }
            if let Some(mailbox) = self.mailboxes.get(&identity) {
                if let Err(mpsc::error::SendError(envelope)) = mailbox.send(envelope) {
                    envelope.fail(ActorError::NodeStopped);
                }
                return;
            }
        }

        self.activate(identity, envelope);
    }

    fn activate(&mut self, identity: String, envelope: Envelope) {
        if envelope.message.forward_count > MAX_FORWARDS {
            let id = envelope.message.target.clone();
            tracing::warn!(actor_id = %id, "message bounced too often, dropping");
            envelope.fail(ActorError::TooManyForwards {
                id,
                max: MAX_FORWARDS,
            });
            return;
        }

        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        if let Err(mpsc::error::SendError(envelope)) = mailbox_tx.send(envelope) {
            envelope.fail(ActorError::NodeStopped);
            return;
        }
        self.mailboxes.insert(identity.clone(), mailbox_tx);

        let activation_id = next_activation_id(&self.parts.activation_counter);
        let guard = TaskGuard::new(&self.parts.pending_tasks);
        let activation = run_activation(
            (self.factory)(),
            ActorId::new(H::actor_type(), identity),
            activation_id,
            self.parts.clone(),
            mailbox_rx,
            self.bounce_tx.clone(),
        );
        tokio::task::spawn_local(async move {
            let _guard = guard;
            activation.await;
        });
    }
}

fn next_activation_id(counter: &Cell<u64>) -> ActivationId {
    let next = counter.get() + 1;
    counter.set(next);
    ActivationId::new(next)
}

/// Why an activation left its turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    MailboxClosed,
    Idle,
    Requested,
}

/// One activation: activate, serve turns, deactivate.
async fn run_activation<H: ActorHandler, C: MessageCodec>(
    mut actor: H,
    id: ActorId,
    activation_id: ActivationId,
    parts: HostParts<C>,
    mut mailbox: mpsc::UnboundedReceiver<Envelope>,
    bounce: mpsc::UnboundedSender<Envelope>,
) {
    let ctx = ActorContext {
        id: id.clone(),
        activation_id,
        router: parts.router.clone(),
        state_store: parts.state_store.clone(),
        sender: RefCell::new(None),
        deactivate_requested: Cell::new(false),
    };

    if let Err(err) = actor.on_activate(&ctx).await {
        tracing::warn!(actor_id = %id, activation = %activation_id, error = %err, "activation failed");
        let reason = err.to_string();
        mailbox.close();
        while let Ok(envelope) = mailbox.try_recv() {
            envelope.fail(ActorError::ActivationFailed {
                id: id.clone(),
                reason: reason.clone(),
            });
        }
        return;
    }

    let address = ActorAddress::new(id.clone(), &*parts.node_name, activation_id);
    register_activation(parts.directory.as_ref(), &address).await;
    tracing::debug!(actor_id = %id, activation = %activation_id, "actor activated");

    let reason = loop {
        let next = match parts.idle_timeout {
            Some(idle) => match tokio::time::timeout(idle, mailbox.recv()).await {
                Ok(next) => next,
                Err(_) => break StopReason::Idle,
            },
            None => mailbox.recv().await,
        };
        let Some(envelope) = next else {
            break StopReason::MailboxClosed;
        };

        let Envelope { message, reply } = envelope;
        let sender = message.sender.as_ref().map(ToString::to_string);
        tracing::trace!(
            actor_id = %id,
            sender = sender.as_deref().unwrap_or("client"),
            method = message.method,
            "turn"
        );
        ctx.sender.replace(message.sender);
        let body = actor.dispatch(&ctx, message.method, &message.body).await;
        if let Err(err) = &body {
            tracing::debug!(actor_id = %id, method = message.method, error = %err, "turn failed");
        }
        let _ = reply.send(ActorResponse { body });

        if ctx.take_deactivation_request() {
            break StopReason::Requested;
        }
    };

    if let Err(err) = actor.on_deactivate(&ctx).await {
        tracing::warn!(actor_id = %id, error = %err, "on_deactivate failed");
    }

    mailbox.close();
    while let Ok(mut envelope) = mailbox.try_recv() {
        envelope.message.forward_count = envelope.message.forward_count.saturating_add(1);
        if let Err(mpsc::error::SendError(envelope)) = bounce.send(envelope) {
            envelope.fail(ActorError::NodeStopped);
        }
    }

    if let Err(err) = parts.directory.unregister(&address).await {
        tracing::warn!(actor_id = %id, error = %err, "directory unregister failed");
    }
    tracing::debug!(actor_id = %id, activation = %activation_id, reason = ?reason, "actor deactivated");
}

/// Register `address`, replacing a stale entry left by an earlier activation.
async fn register_activation(directory: &dyn ActorDirectory, address: &ActorAddress) {
    match directory.register(address.clone()).await {
        Ok(existing) if existing.activation_id != address.activation_id => {
            tracing::debug!(
                actor_id = %address.actor_id,
                stale = %existing.activation_id,
                "replacing stale directory entry"
            );
            let replaced = async {
                directory.unregister(&existing).await?;
                directory.register(address.clone()).await
            };
            if let Err(err) = replaced.await {
                tracing::warn!(actor_id = %address.actor_id, error = %err, "directory register failed");
            }
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(actor_id = %address.actor_id, error = %err, "directory register failed");
        }
    }
}
