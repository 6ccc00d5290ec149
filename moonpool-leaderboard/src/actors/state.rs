//! Actor state persistence: the durable sink for virtual actor state.
//!
//! The state store is the actor system's persistence layer. Given an actor
//! identity it reads and writes serialized state with ETag-based optimistic
//! concurrency control.
//!
//! # Design
//!
//! - `ActorStateStore` is a trait so implementations can range from a simple
//!   in-memory map (tests, demo) to a real key-value backend.
//! - ETags prevent lost updates: a write succeeds only if the stored ETag
//!   matches the expected ETag. On mismatch, the caller gets `ETagMismatch`.
//! - State is stored as opaque bytes; serialization is handled by
//!   [`PersistentState<T>`](super::PersistentState).
//! - Exactly one activation owns a given record, so no cross-record
//!   transactions exist.
//!
//! # Orleans Reference
//!
//! This corresponds to Orleans' `IGrainStorage` provider interface.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::types::{ActorId, ActorType};

/// Errors from state store operations.
#[derive(Debug, thiserror::Error)]
pub enum ActorStateError {
    /// Write failed because the stored ETag does not match the expected ETag.
    #[error("ETag mismatch: expected {expected:?}, found {actual:?}")]
    ETagMismatch {
        /// The ETag the caller expected.
        expected: String,
        /// The ETag currently in the store.
        actual: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Generic store error.
    #[error("store error: {0}")]
    StoreError(String),
}

/// A stored actor state entry: serialized data plus an ETag.
#[derive(Debug, Clone)]
pub struct StoredState {
    /// Serialized state bytes.
    pub data: Vec<u8>,
    /// Optimistic concurrency token.
    pub etag: String,
}

/// Trait for durable actor state storage.
///
/// No Send bounds: the runtime is single-core.
#[async_trait::async_trait(?Send)]
pub trait ActorStateStore: fmt::Debug {
    /// Read the stored state for an actor.
    ///
    /// Returns `Ok(None)` if no state has been written for this actor.
    async fn read_state(&self, actor_id: &ActorId) -> Result<Option<StoredState>, ActorStateError>;

    /// Write state for an actor.
    ///
    /// If `expected_etag` is `Some`, the write succeeds only if the currently
    /// stored ETag matches. If `None`, the write is unconditional.
    ///
    /// Returns the new ETag on success.
    async fn write_state(
        &self,
        actor_id: &ActorId,
        data: Vec<u8>,
        expected_etag: Option<&str>,
    ) -> Result<String, ActorStateError>;
}

/// In-memory state store.
///
/// ETags are monotonically increasing counter values. Writes for selected
/// actor types can be made to fail, which lets tests exercise the
/// consistency policy of multi-actor operations.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: RefCell<HashMap<ActorId, StoredState>>,
    counter: Cell<u64>,
    failing_types: RefCell<HashSet<ActorType>>,
}

impl InMemoryStateStore {
    /// Create a new empty in-memory state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write for `actor_type` fail (or succeed again).
    pub fn fail_writes(&self, actor_type: ActorType, fail: bool) {
        let mut failing = self.failing_types.borrow_mut();
        if fail {
            failing.insert(actor_type);
        } else {
            failing.remove(&actor_type);
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn next_etag(&self) -> String {
        let val = self.counter.get() + 1;
        self.counter.set(val);
        val.to_string()
    }

    fn check_etag(
        entries: &HashMap<ActorId, StoredState>,
        actor_id: &ActorId,
        expected_etag: Option<&str>,
    ) -> Result<(), ActorStateError> {
        let Some(expected) = expected_etag else {
            return Ok(());
        };
        match entries.get(actor_id) {
            Some(existing) if existing.etag == expected => Ok(()),
            Some(existing) => Err(ActorStateError::ETagMismatch {
                expected: expected.to_string(),
                actual: existing.etag.clone(),
            }),
            None => Err(ActorStateError::ETagMismatch {
                expected: expected.to_string(),
                actual: String::new(),
            }),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ActorStateStore for InMemoryStateStore {
    async fn read_state(&self, actor_id: &ActorId) -> Result<Option<StoredState>, ActorStateError> {
        Ok(self.entries.borrow().get(actor_id).cloned())
    }

    async fn write_state(
        &self,
        actor_id: &ActorId,
        data: Vec<u8>,
        expected_etag: Option<&str>,
    ) -> Result<String, ActorStateError> {
        if self.failing_types.borrow().contains(&actor_id.actor_type) {
            return Err(ActorStateError::StoreError(format!(
                "writes disabled for {}",
                actor_id.actor_type
            )));
        }

        let mut entries = self.entries.borrow_mut();
        Self::check_etag(&entries, actor_id, expected_etag)?;

        let new_etag = self.next_etag();
        entries.insert(
            actor_id.clone(),
            StoredState {
                data,
                etag: new_etag.clone(),
            },
        );
        Ok(new_etag)
    }
}
