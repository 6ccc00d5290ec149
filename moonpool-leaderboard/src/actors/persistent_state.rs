//! Typed persistent state wrapper for virtual actors.
//!
//! `PersistentState<T>` provides a typed, cached interface over the raw
//! [`ActorStateStore`]. It handles serialization and ETag tracking, and
//! provides `state()` / `state_mut()` accessors.
//!
//! # Usage
//!
//! Actors load a `PersistentState<T>` in their `on_activate` hook and keep
//! it as a field:
//!
//! ```rust,ignore
//! async fn on_activate<C: MessageCodec>(&mut self, ctx: &ActorContext<C>) -> Result<(), ActorError> {
//!     self.state = Some(PersistentState::load(ctx.state_store()?, &ctx.id).await?);
//!     Ok(())
//! }
//! ```
//!
//! Mutations made through `state_mut()` live only in the activation until
//! [`write_state`](PersistentState::write_state) succeeds.
//!
//! # Orleans Reference
//!
//! This corresponds to Orleans' `IPersistentState<T>`.

use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::state::{ActorStateError, ActorStateStore};
use super::types::ActorId;

/// Typed persistent state for a virtual actor.
pub struct PersistentState<T> {
    value: T,
    etag: Option<String>,
    store: Rc<dyn ActorStateStore>,
    actor_id: ActorId,
}

impl<T: Serialize + DeserializeOwned + Default> PersistentState<T> {
    /// Load persistent state from the store.
    ///
    /// Reads existing state and deserializes it, or creates `T::default()`
    /// if nothing was written yet.
    pub async fn load(
        store: Rc<dyn ActorStateStore>,
        actor_id: &ActorId,
    ) -> Result<Self, ActorStateError> {
        let stored = store.read_state(actor_id).await?;

        let (value, etag) = match stored {
            Some(entry) => {
                let value: T = serde_json::from_slice(&entry.data)
                    .map_err(|e| ActorStateError::SerializationError(e.to_string()))?;
                (value, Some(entry.etag))
            }
            None => (T::default(), None),
        };

        Ok(Self {
            value,
            etag,
            store,
            actor_id: actor_id.clone(),
        })
    }

    /// Get a reference to the current state.
    pub fn state(&self) -> &T {
        &self.value
    }

    /// Get a mutable reference to the current state.
    ///
    /// Changes are only durable once [`write_state`](Self::write_state) returns.
    pub fn state_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// The current ETag, or `None` if the state has never been written.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Persist the current state to the store.
    pub async fn write_state(&mut self) -> Result<(), ActorStateError> {
        let data = serde_json::to_vec(&self.value)
            .map_err(|e| ActorStateError::SerializationError(e.to_string()))?;

        let new_etag = self
            .store
            .write_state(&self.actor_id, data, self.etag.as_deref())
            .await?;

        self.etag = Some(new_etag);
        Ok(())
    }
}
