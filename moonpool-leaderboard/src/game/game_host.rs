//! Game host actor: owns the pointer to the current leaderboard window.

use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::actors::{
    ActorContext, ActorError, ActorHandler, ActorId, ActorRef, ActorRouter, ActorType, JsonCodec,
    MessageCodec, PersistentState,
};

use super::error::GameError;
use super::ids::LeaderboardId;
use super::leaderboard::LeaderboardRef;
use super::{encode_reply, loaded, persist, ActorTarget};

/// Actor type of the game host.
pub const GAME_HOST: ActorType = ActorType(0x484F_5354);

mod method {
    pub const OPEN_LEADERBOARD: u32 = 1;
    pub const GET_CURRENT_LEADERBOARD: u32 = 2;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenRequest {
    start: DateTime<Utc>,
    duration_ms: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GameHostState {
    current_leaderboard: Option<LeaderboardId>,
}

/// Game host actor.
#[derive(Default)]
pub struct GameHostActor {
    state: Option<PersistentState<GameHostState>>,
}

impl GameHostActor {
    async fn open_leaderboard<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        req: OpenRequest,
    ) -> Result<LeaderboardId, GameError> {
        let end = Duration::try_milliseconds(req.duration_ms)
            .filter(|duration| *duration >= Duration::zero())
            .and_then(|duration| req.start.checked_add_signed(duration))
            .ok_or(GameError::InvalidWindow {
                start: req.start,
                duration_ms: req.duration_ms,
            })?;
        let id = LeaderboardId::for_window_start(req.start);

        let board: LeaderboardRef<C> = ctx.actor_ref(id.to_string());
        board.init_leaderboard(id, req.start, end).await?;

        let state = loaded(&mut self.state, &ctx.id)?;
        state.state_mut().current_leaderboard = Some(id);
        persist(ctx, state).await?;

        tracing::info!(leaderboard_id = %id, start = %req.start, end = %end, "leaderboard opened");
        Ok(id)
    }
}

#[async_trait::async_trait(?Send)]
impl ActorHandler for GameHostActor {
    fn actor_type() -> ActorType {
        GAME_HOST
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
            method::OPEN_LEADERBOARD => {
                let req: OpenRequest = ctx.codec().decode(body)?;
                encode_reply(ctx, &self.open_leaderboard(ctx, req).await)
            }
            method::GET_CURRENT_LEADERBOARD => {
                let current =
                    loaded(&mut self.state, &ctx.id).map(|s| s.state().current_leaderboard);
                encode_reply(ctx, &current)
            }
            _ => Err(ActorError::UnknownMethod(method)),
        }
    }
}

/// Typed reference to a [`GameHostActor`].
#[derive(Debug, Clone)]
pub struct GameHostRef<C: MessageCodec = JsonCodec> {
    target: ActorTarget<C>,
}

impl<C: MessageCodec> ActorRef<C> for GameHostRef<C> {
    fn from_router(
        identity: impl Into<String>,
        router: &Rc<ActorRouter<C>>,
        caller: Option<&ActorId>,
    ) -> Self {
        Self {
            target: ActorTarget::new(GAME_HOST, identity, router, caller),
        }
    }
}

impl<C: MessageCodec> GameHostRef<C> {
    /// Open a window `[start, start + duration]` and make it current.
    ///
    /// The duration is carried with millisecond precision.
    pub async fn open_leaderboard(
        &self,
        start: DateTime<Utc>,
        duration: Duration,
    ) -> Result<LeaderboardId, GameError> {
        let req = OpenRequest {
            start,
            duration_ms: duration.num_milliseconds(),
        };
        self.target.call(method::OPEN_LEADERBOARD, &req).await
    }

    /// The current window, or `None` if none was opened yet.
    pub async fn get_current_leaderboard(&self) -> Result<Option<LeaderboardId>, GameError> {
        self.target
            .call(method::GET_CURRENT_LEADERBOARD, &())
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::actors::{ActorNode, InMemoryStateStore, NodeConfig};
    use crate::game::{register_actors, GameConfig};
    use crate::testing::run_local_test;

    fn game_node(store: Rc<InMemoryStateStore>) -> ActorNode {
        let builder = ActorNode::builder(NodeConfig::builder().state_store(store).build());
        register_actors(builder, GameConfig::default())
            .build()
            .expect("build node")
    }

    #[test]
    fn test_open_then_current() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()));
            node.start().expect("start");
            let host: GameHostRef = node.actor_ref("game-host");

            assert_eq!(host.get_current_leaderboard().await, Ok(None));

            let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("date");
            let id = host
                .open_leaderboard(start, Duration::hours(1))
                .await
                .expect("open");
            assert_eq!(host.get_current_leaderboard().await, Ok(Some(id)));

            let board: LeaderboardRef = node.actor_ref(id.to_string());
            let window = board.get_window().await.expect("window");
            assert_eq!(window.id, id);
            assert_eq!(window.start, start);
            assert_eq!(window.end, start + Duration::hours(1));
            assert_eq!(window.player_count, 0);

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_newer_window_replaces_current() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()));
            node.start().expect("start");
            let host: GameHostRef = node.actor_ref("game-host");

            let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("date");
            let first = host
                .open_leaderboard(start, Duration::hours(1))
                .await
                .expect("first");
            let second = host
                .open_leaderboard(start + Duration::hours(1), Duration::hours(1))
                .await
                .expect("second");
            assert!(first < second);
            assert_eq!(host.get_current_leaderboard().await, Ok(Some(second)));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_negative_duration_rejected() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()));
            node.start().expect("start");
            let host: GameHostRef = node.actor_ref("game-host");

            let result = host.open_leaderboard(Utc::now(), Duration::minutes(-1)).await;
            assert!(matches!(result, Err(GameError::InvalidWindow { .. })));
            assert_eq!(host.get_current_leaderboard().await, Ok(None));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_current_window_survives_restart() {
        run_local_test(async {
            let store = Rc::new(InMemoryStateStore::new());
            let node = game_node(store.clone());
            node.start().expect("start");
            let host: GameHostRef = node.actor_ref("game-host");
            let id = host
                .open_leaderboard(Utc::now(), Duration::minutes(5))
                .await
                .expect("open");
            node.shutdown().await.expect("shutdown");

            let node = game_node(store);
            node.start().expect("restart");
            let host: GameHostRef = node.actor_ref("game-host");
            assert_eq!(host.get_current_leaderboard().await, Ok(Some(id)));
            node.shutdown().await.expect("shutdown");
        });
    }
}
