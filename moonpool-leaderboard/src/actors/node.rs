//! ActorNode: unified actor runtime for a single process.
//!
//! [`ActorNode`] ties together the router, directory, state store and actor
//! hosting into a single entry point and manages the full lifecycle.
//!
//! # Builder API
//!
//! ```rust,ignore
//! let node = ActorNode::builder(NodeConfig::default())
//!     .register::<LeaderboardActor>()
//!     .register_with(move || PlayerActor::new(policy))
//!     .build()?;
//!
//! // inside a tokio LocalSet
//! node.start()?;
//! let board: LeaderboardRef = node.actor_ref("3f1c...");
//! node.shutdown().await?;
//! ```
//!
//! # Lifecycle
//!
//! 1. **Initializing**: router set up, registrations pending
//! 2. **Active**: dispatch loops running, node serving requests
//! 3. **Stopping**: dispatch queues closed, activations draining
//! 4. **Stopped**: every host task has finished

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use tokio::sync::watch;

use super::actor_ref::ActorRef;
use super::codec::{JsonCodec, MessageCodec};
use super::directory::{ActorDirectory, InMemoryDirectory};
use super::host::{start_actor_type, ActorHandler, HostParts};
use super::node_config::NodeConfig;
use super::router::ActorRouter;
use super::types::ActorType;

/// Type alias for a registration closure that starts one actor type.
type RegistrationFn<C> = Box<dyn FnOnce(HostParts<C>)>;

/// Lifecycle state of an [`ActorNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLifecycle {
    /// Built, registrations pending.
    Initializing,
    /// Node is serving requests and processing actor messages.
    Active,
    /// Shutting down: draining pending tasks.
    Stopping,
    /// Every dispatch loop and activation has finished.
    Stopped,
}

impl std::fmt::Display for NodeLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeLifecycle::Initializing => "initializing",
            NodeLifecycle::Active => "active",
            NodeLifecycle::Stopping => "stopping",
            NodeLifecycle::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Errors from [`ActorNode`] operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The operation is not allowed in the node's current lifecycle state.
    #[error("cannot {operation} a node that is {status}")]
    InvalidLifecycle {
        /// What was attempted.
        operation: &'static str,
        /// Where the node was.
        status: NodeLifecycle,
    },

    /// Two handlers were registered for the same actor type.
    #[error("actor type {0} registered twice")]
    DuplicateActorType(ActorType),
}

/// Unified actor runtime for a single process.
///
/// All methods take `&self`, so a node can be shared through an `Rc` between
/// the code that drives its lifecycle and session connectors.
///
/// # Type Parameters
///
/// * `C` - The message codec (defaults to [`JsonCodec`])
pub struct ActorNode<C: MessageCodec = JsonCodec> {
    name: Rc<str>,
    config: NodeConfig,
    router: Rc<ActorRouter<C>>,
    directory: Rc<dyn ActorDirectory>,
    status: Cell<NodeLifecycle>,
    registrations: RefCell<Vec<RegistrationFn<C>>>,
    pending_tasks: Rc<Cell<usize>>,
    activation_counter: Rc<Cell<u64>>,
    shutdown_tx: watch::Sender<bool>,
    connected_clients: Cell<usize>,
}

impl ActorNode {
    /// Create a builder for a node using [`JsonCodec`].
    ///
    /// Call [`ActorNodeBuilder::with_codec`] to override.
    pub fn builder(config: NodeConfig) -> ActorNodeBuilder {
        ActorNodeBuilder {
            config,
            codec: JsonCodec,
            actor_types: Vec::new(),
            registrations: Vec::new(),
        }
    }
}

impl<C: MessageCodec> ActorNode<C> {
    /// Get a typed actor reference by identity.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let registry: PlayerRegistryRef = node.actor_ref("registry");
    /// let alice = registry.create_or_get_player("alice").await?;
    /// ```
    pub fn actor_ref<R: ActorRef<C>>(&self, identity: impl Into<String>) -> R {
        R::from_router(identity, &self.router, None)
    }

    /// Get a reference to the actor router.
    pub fn router(&self) -> &Rc<ActorRouter<C>> {
        &self.router
    }

    /// The directory tracking this node's activations.
    pub fn directory(&self) -> &Rc<dyn ActorDirectory> {
        &self.directory
    }

    /// This node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle status.
    pub fn status(&self) -> NodeLifecycle {
        self.status.get()
    }

    /// Number of client sessions currently open against this node.
    pub fn connected_clients(&self) -> usize {
        self.connected_clients.get()
    }

    pub(crate) fn client_connected(&self) {
        self.connected_clients.set(self.connected_clients.get() + 1);
    }

    pub(crate) fn client_disconnected(&self) {
        self.connected_clients
            .set(self.connected_clients.get().saturating_sub(1));
    }

    /// Spawn the dispatch loop of every registered actor type.
    ///
    /// Must be called from inside a `tokio::task::LocalSet`. The node serves
    /// requests once this returns.
    pub fn start(&self) -> Result<(), NodeError> {
        let status = self.status.get();
        if status != NodeLifecycle::Initializing {
            return Err(NodeError::InvalidLifecycle {
                operation: "start",
                status,
            });
        }

        let parts = HostParts {
            node_name: self.name.clone(),
            router: self.router.clone(),
            directory: self.directory.clone(),
            state_store: self.config.state_store().cloned(),
            idle_timeout: self.config.idle_timeout(),
            activation_counter: self.activation_counter.clone(),
            pending_tasks: self.pending_tasks.clone(),
            shutdown: self.shutdown_tx.subscribe(),
        };

        let registrations = std::mem::take(&mut *self.registrations.borrow_mut());
        let actor_types = registrations.len();
        for registration in registrations {
            registration(parts.clone());
        }

        self.status.set(NodeLifecycle::Active);
        tracing::info!(node = %self.name, actor_types, "node started");
        Ok(())
    }

    /// Gracefully shut down the node.
    ///
    /// Closes all dispatch queues, waits for every activation to finish its
    /// current turn and run `on_deactivate`, then marks the node as stopped.
    /// Requests issued afterwards fail with `ActorError::NodeStopped`.
    ///
    /// Shutting down a node that never started just marks it stopped;
    /// shutting down twice is a no-op.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        match self.status.get() {
            NodeLifecycle::Stopped => return Ok(()),
            NodeLifecycle::Stopping => {
                return Err(NodeError::InvalidLifecycle {
                    operation: "shut down",
                    status: NodeLifecycle::Stopping,
                })
            }
            NodeLifecycle::Initializing => {
                self.registrations.borrow_mut().clear();
                self.status.set(NodeLifecycle::Stopped);
                return Ok(());
            }
            NodeLifecycle::Active => {}
        }

        self.status.set(NodeLifecycle::Stopping);
        tracing::info!(node = %self.name, clients = self.connected_clients.get(), "node stopping");

        self.router.close();
        self.shutdown_tx.send_replace(true);

        // Yield until all dispatch loops and activations finish
        while self.pending_tasks.get() > 0 {
            tokio::task::yield_now().await;
        }

        if let Err(err) = self.directory.unregister_node(&self.name).await {
            tracing::warn!(node = %self.name, error = %err, "directory cleanup failed");
        }

        self.status.set(NodeLifecycle::Stopped);
        tracing::info!(node = %self.name, "node stopped");
        Ok(())
    }
}

impl<C: MessageCodec> Drop for ActorNode<C> {
    fn drop(&mut self) {
        self.router.close();
        self.shutdown_tx.send_replace(true);
    }
}

impl<C: MessageCodec> std::fmt::Debug for ActorNode<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorNode")
            .field("name", &self.name)
            .field("status", &self.status.get())
            .field("pending_tasks", &self.pending_tasks.get())
            .field("connected_clients", &self.connected_clients.get())
            .finish()
    }
}

/// Builder for [`ActorNode`].
///
/// Collects configuration and actor registrations; dispatch loops are only
/// spawned by [`ActorNode::start`].
pub struct ActorNodeBuilder<C: MessageCodec = JsonCodec> {
    config: NodeConfig,
    codec: C,
    actor_types: Vec<ActorType>,
    registrations: Vec<RegistrationFn<C>>,
}

impl<C: MessageCodec> ActorNodeBuilder<C> {
    /// Set a custom message codec.
    pub fn with_codec<C2: MessageCodec>(self, codec: C2) -> ActorNodeBuilder<C2> {
        ActorNodeBuilder {
            config: self.config,
            codec,
            actor_types: Vec::new(),
            registrations: Vec::new(), // type changed, must re-register
        }
    }

    /// Register an actor handler type built with `Default`.
    pub fn register<H: ActorHandler + Default>(self) -> Self {
        self.register_with(H::default)
    }

    /// Register an actor handler type with a factory that builds one handler
    /// per activation. Use this to inject configuration into handlers.
    pub fn register_with<H, F>(mut self, factory: F) -> Self
    where
        H: ActorHandler,
        F: Fn() -> H + 'static,
    {
        self.actor_types.push(H::actor_type());
        self.registrations
            .push(Box::new(move |parts: HostParts<C>| {
                start_actor_type::<H, C>(Rc::new(factory), parts)
            }));
        self
    }

    /// Build the node in the `Initializing` state.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::DuplicateActorType`] if an actor type was
    /// registered more than once.
    pub fn build(self) -> Result<ActorNode<C>, NodeError> {
        let mut seen = HashSet::new();
        for actor_type in &self.actor_types {
            if !seen.insert(*actor_type) {
                return Err(NodeError::DuplicateActorType(*actor_type));
            }
        }

        let directory = self
            .config
            .directory()
            .cloned()
            .unwrap_or_else(|| Rc::new(InMemoryDirectory::new()));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(ActorNode {
            name: Rc::from(self.config.name()),
            router: Rc::new(ActorRouter::new(self.codec)),
            directory,
            config: self.config,
            status: Cell::new(NodeLifecycle::Initializing),
            registrations: RefCell::new(self.registrations),
            pending_tasks: Rc::new(Cell::new(0)),
            activation_counter: Rc::new(Cell::new(0)),
            shutdown_tx,
            connected_clients: Cell::new(0),
        })
    }
}
