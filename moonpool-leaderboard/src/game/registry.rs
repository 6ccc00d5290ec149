//! Player registry actor: player name to player id, created on first use.
//!
//! A single registry instance serves every name, so concurrent requests for
//! the same new name are serialized by its turns and at most one player is
//! ever created per name.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::actors::{
    ActorContext, ActorError, ActorHandler, ActorId, ActorRef, ActorRouter, ActorType, JsonCodec,
    MessageCodec, PersistentState,
};

use super::error::GameError;
use super::ids::PlayerId;
use super::player::{Player, PlayerRef};
use super::{encode_reply, loaded, persist, ActorTarget};

/// Actor type of the player registry.
pub const PLAYER_REGISTRY: ActorType = ActorType(0x5245_4749);

mod method {
    pub const CREATE_OR_GET_PLAYER: u32 = 1;
    pub const LIST_PLAYERS: u32 = 2;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryState {
    players: Vec<Player>,
}

/// Player registry actor.
#[derive(Default)]
pub struct PlayerRegistryActor {
    state: Option<PersistentState<RegistryState>>,
}

impl PlayerRegistryActor {
    async fn create_or_get_player<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        name: String,
    ) -> Result<Player, GameError> {
        let state = loaded(&mut self.state, &ctx.id)?;
        if let Some(existing) = state.state().players.iter().find(|p| p.name == name) {
            return Ok(existing.clone());
        }

        let player_ref: PlayerRef<C> = ctx.actor_ref(PlayerId::generate().to_string());
        let player = player_ref.create_player(name).await?;

        state.state_mut().players.push(player.clone());
        persist(ctx, state).await?;

        tracing::info!(player_id = %player.id, name = %player.name, "player registered");
        Ok(player)
    }
}

#[async_trait::async_trait(?Send)]
impl ActorHandler for PlayerRegistryActor {
    fn actor_type() -> ActorType {
        PLAYER_REGISTRY
    }

    async fn on_activate<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
    ) -> Result<(), ActorError> {
        self.state = Some(PersistentState::load(ctx.state_store()?, &ctx.id).await?);
        Ok(())
    }

    async fn dispatch<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        method: u32,
        body: &[u8],
    ) -> Result<Vec<u8>, ActorError> {
        match method {
            method::CREATE_OR_GET_PLAYER => {
                let name: String = ctx.codec().decode(body)?;
                encode_reply(ctx, &self.create_or_get_player(ctx, name).await)
            }
            method::LIST_PLAYERS => {
                let players = loaded(&mut self.state, &ctx.id).map(|s| s.state().players.clone());
                encode_reply(ctx, &players)
            }
            _ => Err(ActorError::UnknownMethod(method)),
        }
    }
}

/// Typed reference to a [`PlayerRegistryActor`].
#[derive(Debug, Clone)]
pub struct PlayerRegistryRef<C: MessageCodec = JsonCodec> {
    target: ActorTarget<C>,
}

impl<C: MessageCodec> ActorRef<C> for PlayerRegistryRef<C> {
    fn from_router(
        identity: impl Into<String>,
        router: &Rc<ActorRouter<C>>,
        caller: Option<&ActorId>,
    ) -> Self {
        Self {
            target: ActorTarget::new(PLAYER_REGISTRY, identity, router, caller),
        }
    }
}

impl<C: MessageCodec> PlayerRegistryRef<C> {
    /// Return the player registered under `name`, creating it on first use.
    pub async fn create_or_get_player(&self, name: impl Into<String>) -> Result<Player, GameError> {
        self.target
            .call(method::CREATE_OR_GET_PLAYER, &name.into())
            .await
    }

    /// Snapshots of every registered player, in registration order.
    pub async fn list_players(&self) -> Result<Vec<Player>, GameError> {
        self.target.call(method::LIST_PLAYERS, &()).await
    }
}
