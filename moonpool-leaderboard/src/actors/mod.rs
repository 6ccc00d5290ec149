//! Virtual actor runtime.
//!
//! Actors are addressed by `(ActorType, identity)`, activated on first
//! message, and run one turn at a time. The caller never creates or locates
//! an actor: it builds a reference and sends requests through the router.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │  Caller: ActorRef → ActorRouter (encode, await reply) │
//! ├───────────────────────────────────────────────────────┤
//! │  Host: one dispatch loop per ActorType                │
//! │    identity → mailbox of the live activation          │
//! │    activation: on_activate → turns → on_deactivate    │
//! ├───────────────────────────────────────────────────────┤
//! │  ActorDirectory (who is active)                       │
//! │  ActorStateStore + PersistentState<T> (durable state) │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! # Orleans Model
//!
//! Turn-based concurrency: one message at a time per actor instance.
//! Different instances run concurrently on the same thread; an instance
//! awaiting another actor suspends only its own turn.

// --- Core types ---
mod actor_ref;
mod codec;
mod types;

pub use actor_ref::ActorRef;
pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use types::{ActivationId, ActorAddress, ActorId, ActorMessage, ActorResponse, ActorType};

// --- Runtime ---
mod host;
mod router;

pub use host::{ActorContext, ActorHandler};
pub use router::{ActorError, ActorRouter};

// --- Node lifecycle ---
mod node;
mod node_config;

pub use node::{ActorNode, ActorNodeBuilder, NodeError, NodeLifecycle};
pub use node_config::{NodeConfig, NodeConfigBuilder};

// --- Infrastructure ---
mod directory;

pub use directory::{ActorDirectory, DirectoryError, InMemoryDirectory};

// --- State persistence ---
mod persistent_state;
mod state;

pub use persistent_state::PersistentState;
pub use state::{ActorStateError, ActorStateStore, InMemoryStateStore, StoredState};
