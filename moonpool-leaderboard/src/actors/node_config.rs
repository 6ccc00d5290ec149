//! Per-node configuration for [`ActorNode`](super::ActorNode).
//!
//! Separates node-level settings (name, directory, state store, idle
//! deactivation) from the actor registrations made on the node builder.

use std::rc::Rc;
use std::time::Duration;

use super::directory::ActorDirectory;
use super::state::ActorStateStore;

const DEFAULT_NODE_NAME: &str = "local";

/// Per-node configuration for an [`ActorNode`](super::ActorNode).
///
/// # Example
///
/// ```rust,ignore
/// // In-memory directory, no persistence, activations never idle out
/// let config = NodeConfig::default();
///
/// // Full control via builder
/// let config = NodeConfig::builder()
///     .name("leaderboard-1")
///     .state_store(store)
///     .idle_timeout(Duration::from_secs(300))
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    name: Option<String>,
    directory: Option<Rc<dyn ActorDirectory>>,
    state_store: Option<Rc<dyn ActorStateStore>>,
    idle_timeout: Option<Duration>,
}

impl NodeConfig {
    /// Start building a node configuration.
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }

    /// The node's name, used in directory entries and logs.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NODE_NAME)
    }

    /// The actor directory, if explicitly set.
    pub fn directory(&self) -> Option<&Rc<dyn ActorDirectory>> {
        self.directory.as_ref()
    }

    /// The actor state store, if explicitly set.
    pub fn state_store(&self) -> Option<&Rc<dyn ActorStateStore>> {
        self.state_store.as_ref()
    }

    /// How long an activation may sit with an empty mailbox before it is
    /// deactivated. `None` keeps activations alive until shutdown.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }
}

/// Builder for [`NodeConfig`].
#[derive(Debug, Clone, Default)]
pub struct NodeConfigBuilder {
    name: Option<String>,
    directory: Option<Rc<dyn ActorDirectory>>,
    state_store: Option<Rc<dyn ActorStateStore>>,
    idle_timeout: Option<Duration>,
}

impl NodeConfigBuilder {
    /// Set the node's name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the actor directory.
    pub fn directory(mut self, directory: Rc<dyn ActorDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Set the actor state store.
    pub fn state_store(mut self, store: Rc<dyn ActorStateStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Deactivate activations after this much idle time.
    pub fn idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = Some(idle);
        self
    }

    /// Build the node configuration (infallible).
    pub fn build(self) -> NodeConfig {
        NodeConfig {
            name: self.name,
            directory: self.directory,
            state_store: self.state_store,
            idle_timeout: self.idle_timeout,
        }
    }
}
