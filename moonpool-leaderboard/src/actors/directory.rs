//! Actor directory: maps actor identities to their current activation.
//!
//! The directory is the actor system's "phone book": given an `ActorId`,
//! it returns the `ActorAddress` of the activation currently serving it.
//!
//! # Design
//!
//! - `ActorDirectory` is a trait so implementations can range from a simple
//!   in-memory map (single node) to a distributed directory (multi-node).
//! - Registration happens when an activation starts, removal when it stops.
//!   Callers never need the directory to address an actor: building a
//!   reference is pure, the host activates on first message.
//!
//! # Orleans Reference
//!
//! This corresponds to Orleans' `IGrainDirectory`:
//! - `Register(GrainAddress)` → returns existing on conflict
//! - `Lookup(GrainId)` → returns `GrainAddress?`
//! - `Unregister(GrainAddress)` → removes only if activation ID matches
//! - `UnregisterSilos(List<SiloAddress>)` → batch cleanup on node death

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use super::types::{ActorAddress, ActorId};

/// Errors from directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory backend could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Directory for resolving actor identities to their activation addresses.
///
/// # Register Semantics (Orleans-style)
///
/// `register()` is idempotent with conflict detection:
/// - If no entry exists: registers the new address, returns it
/// - If an entry already exists: does NOT overwrite, returns the existing entry
///
/// The caller compares the returned `ActorAddress` with what it tried to
/// register. If they differ, another activation won.
#[async_trait::async_trait(?Send)]
pub trait ActorDirectory: fmt::Debug {
    /// Look up the current address for an actor.
    async fn lookup(&self, id: &ActorId) -> Result<Option<ActorAddress>, DirectoryError>;

    /// Register an actor activation in the directory.
    ///
    /// Returns the registered address, or the existing one on conflict.
    async fn register(&self, address: ActorAddress) -> Result<ActorAddress, DirectoryError>;

    /// Remove an actor from the directory.
    ///
    /// Only removes the entry if the activation ID matches the one
    /// currently registered. Unknown actors are not an error.
    async fn unregister(&self, address: &ActorAddress) -> Result<(), DirectoryError>;

    /// Remove all directory entries hosted on the given node.
    ///
    /// Returns the removed entries.
    async fn unregister_node(&self, node: &str) -> Result<Vec<ActorAddress>, DirectoryError>;

    /// List all actor entries currently in the directory, in unspecified order.
    async fn list_all(&self) -> Result<Vec<ActorAddress>, DirectoryError>;
}

/// Simple in-memory directory for single-node usage and tests.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RefCell<HashMap<ActorId, ActorAddress>>,
}

impl InMemoryDirectory {
    /// Create a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait(?Send)]
impl ActorDirectory for InMemoryDirectory {
    async fn lookup(&self, id: &ActorId) -> Result<Option<ActorAddress>, DirectoryError> {
        Ok(self.entries.borrow().get(id).cloned())
    }

    async fn register(&self, address: ActorAddress) -> Result<ActorAddress, DirectoryError> {
        let mut entries = self.entries.borrow_mut();
        match entries.get(&address.actor_id) {
            Some(existing) => Ok(existing.clone()),
            None => {
                entries.insert(address.actor_id.clone(), address.clone());
                Ok(address)
            }
        }
    }

    async fn unregister(&self, address: &ActorAddress) -> Result<(), DirectoryError> {
        let mut entries = self.entries.borrow_mut();
        let matches = entries
            .get(&address.actor_id)
            .is_some_and(|existing| existing.activation_id == address.activation_id);
        if matches {
            entries.remove(&address.actor_id);
        }
        Ok(())
    }

    async fn unregister_node(&self, node: &str) -> Result<Vec<ActorAddress>, DirectoryError> {
        let mut entries = self.entries.borrow_mut();
        let mut removed = Vec::new();
        entries.retain(|_id, addr| {
            if addr.node == node {
                removed.push(addr.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    async fn list_all(&self) -> Result<Vec<ActorAddress>, DirectoryError> {
        Ok(self.entries.borrow().values().cloned().collect())
    }
}
