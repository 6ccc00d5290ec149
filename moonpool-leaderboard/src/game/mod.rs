//! The leaderboard game: four actor kinds on top of [`crate::actors`].
//!
//! ```text
//! GameHost ──open──▶ Leaderboard ◀──UpdatePlayerScore── Player
//!                                                         ▲
//! PlayerRegistry ──CreatePlayer (once per name)───────────┘
//! ```
//!
//! Every operation answers with a `Result<T, GameError>` encoded as the reply
//! body, so domain failures cross actor boundaries unchanged. Runtime
//! failures (stopped node, undecodable body) are flattened into
//! [`GameError::Runtime`] by the typed references.

use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::actors::{
    ActorContext, ActorError, ActorId, ActorNodeBuilder, ActorRouter, ActorType, MessageCodec,
    PersistentState,
};

mod config;
mod error;
mod game_host;
mod ids;
mod leaderboard;
mod player;
mod ranking;
mod registry;

pub use config::{GameConfig, GameConfigBuilder, ScoreUnderflowPolicy};
pub use error::GameError;
pub use game_host::{GameHostActor, GameHostRef, GAME_HOST};
pub use ids::{LeaderboardId, PlayerId};
pub use leaderboard::{LeaderboardActor, LeaderboardRef, LeaderboardWindow, LEADERBOARD};
pub use player::{Player, PlayerActor, PlayerRef, PLAYER};
pub use ranking::{RankingEntry, RankingIndex, SortedRankings};
pub use registry::{PlayerRegistryActor, PlayerRegistryRef, PLAYER_REGISTRY};

/// Register the four game actor types on a node builder.
///
/// Players are built from `config` so they pick up its underflow policy and
/// neighbour count.
pub fn register_actors<C: MessageCodec>(
    builder: ActorNodeBuilder<C>,
    config: GameConfig,
) -> ActorNodeBuilder<C> {
    builder
        .register::<GameHostActor>()
        .register::<LeaderboardActor>()
        .register::<PlayerRegistryActor>()
        .register_with(move || PlayerActor::new(&config))
}

/// Addressing shared by the typed references.
#[derive(Debug, Clone)]
pub(crate) struct ActorTarget<C: MessageCodec> {
    id: ActorId,
    router: Rc<ActorRouter<C>>,
    caller: Option<ActorId>,
}

impl<C: MessageCodec> ActorTarget<C> {
    pub(crate) fn new(
        actor_type: ActorType,
        identity: impl Into<String>,
        router: &Rc<ActorRouter<C>>,
        caller: Option<&ActorId>,
    ) -> Self {
        Self {
            id: ActorId::new(actor_type, identity),
            router: router.clone(),
            caller: caller.cloned(),
        }
    }

    pub(crate) fn id(&self) -> &ActorId {
        &self.id
    }

    /// Send one request and unwrap the domain reply.
    pub(crate) async fn call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        method: u32,
        req: &Req,
    ) -> Result<Resp, GameError> {
        let reply: Result<Resp, GameError> = self
            .router
            .send_actor_request(&self.id, self.caller.as_ref(), method, req)
            .await?;
        reply
    }
}

/// Encode a domain result as a reply body.
pub(crate) fn encode_reply<C: MessageCodec, T: Serialize>(
    ctx: &ActorContext<C>,
    result: &Result<T, GameError>,
) -> Result<Vec<u8>, ActorError> {
    Ok(ctx.codec().encode(result)?)
}

/// Write `state`; on failure drop the activation so the next one reloads
/// the last durable snapshot instead of serving unpersisted memory.
pub(crate) async fn persist<C: MessageCodec, T>(
    ctx: &ActorContext<C>,
    state: &mut PersistentState<T>,
) -> Result<(), GameError>
where
    T: Serialize + DeserializeOwned + Default,
{
    if let Err(err) = state.write_state().await {
        tracing::warn!(actor_id = %ctx.id, error = %err, "persist failed, deactivating");
        ctx.deactivate_on_idle();
        return Err(err.into());
    }
    tracing::trace!(actor_id = %ctx.id, etag = state.etag().unwrap_or_default(), "state persisted");
    Ok(())
}

/// Loaded state of an activation; only missing if `on_activate` never ran.
pub(crate) fn loaded<'a, T>(
    state: &'a mut Option<PersistentState<T>>,
    ctx_id: &ActorId,
) -> Result<&'a mut PersistentState<T>, GameError> {
    state
        .as_mut()
        .ok_or_else(|| GameError::Runtime(format!("state of {ctx_id} not loaded")))
}
