//! Leaderboard actor: one ranking window.
//!
//! The actor is keyed by its [`LeaderboardId`]. All mutations go through
//! this single activation one turn at a time, which is what keeps the
//! ranking consistent under concurrent players.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actors::{
    ActorContext, ActorError, ActorHandler, ActorId, ActorRef, ActorRouter, ActorType, JsonCodec,
    MessageCodec, PersistentState,
};

use super::error::GameError;
use super::ids::{LeaderboardId, PlayerId};
use super::player::Player;
use super::ranking::{RankingEntry, RankingIndex, SortedRankings};
use super::{encode_reply, loaded, persist, ActorTarget};

/// Actor type of leaderboard windows.
pub const LEADERBOARD: ActorType = ActorType(0x1EAD_B0A2);

mod method {
    pub const INIT_LEADERBOARD: u32 = 1;
    pub const GET_PLAYER_RANK: u32 = 2;
    pub const TOP_RANKINGS: u32 = 3;
    pub const GET_ABOVE: u32 = 4;
    pub const GET_BELOW: u32 = 5;
    pub const UPDATE_PLAYER_SCORE: u32 = 6;
    pub const GET_WINDOW: u32 = 7;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InitRequest {
    id: LeaderboardId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NeighboursRequest {
    player_id: PlayerId,
    count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UpdateScoreRequest {
    player: Player,
    score: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WindowBounds {
    id: LeaderboardId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LeaderboardState {
    window: Option<WindowBounds>,
    rankings: Vec<RankingEntry>,
}

/// Summary of an initialized window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardWindow {
    /// Window id.
    pub id: LeaderboardId,
    /// Opening instant.
    pub start: DateTime<Utc>,
    /// Closing instant.
    pub end: DateTime<Utc>,
    /// Number of ranked players.
    pub player_count: usize,
}

/// Requested counts at or below zero select nothing.
fn count_to_len(count: i64) -> usize {
    usize::try_from(count).unwrap_or(0)
}

/// Leaderboard actor, generic over the ranking structure.
#[derive(Default)]
pub struct LeaderboardActor<R: RankingIndex = SortedRankings> {
    state: Option<PersistentState<LeaderboardState>>,
    index: R,
}

impl<R: RankingIndex> LeaderboardActor<R> {
    async fn init<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        req: InitRequest,
    ) -> Result<(), GameError> {
        let state = loaded(&mut self.state, &ctx.id)?;
        *state.state_mut() = LeaderboardState {
            window: Some(WindowBounds {
                id: req.id,
                start: req.start,
                end: req.end,
            }),
            rankings: Vec::new(),
        };
        self.index = R::default();
        persist(ctx, state).await?;

        tracing::info!(
            leaderboard_id = %req.id,
            start = %req.start,
            end = %req.end,
            "leaderboard initialized"
        );
        Ok(())
    }

    async fn update_player_score<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        req: UpdateScoreRequest,
    ) -> Result<(), GameError> {
        let state = loaded(&mut self.state, &ctx.id)?;
        if state.state().window.is_none() {
            return Err(GameError::UnknownLeaderboard(ctx.id.identity.clone()));
        }

        self.index.upsert(RankingEntry {
            player_id: req.player.id,
            player_name: req.player.name,
            score: req.score,
        });
        state.state_mut().rankings = self.index.entries();
        persist(ctx, state).await?;

        tracing::debug!(
            leaderboard_id = %ctx.id.identity,
            player_id = %req.player.id,
            score = req.score,
            "score updated"
        );
        Ok(())
    }

    fn rank(&self, player_id: PlayerId) -> Result<usize, GameError> {
        self.index
            .rank_of(&player_id)
            .ok_or(GameError::NotFound(player_id))
    }

    fn window<C: MessageCodec>(&self, ctx: &ActorContext<C>) -> Result<LeaderboardWindow, GameError> {
        let bounds = self
            .state
            .as_ref()
            .and_then(|state| state.state().window)
            .ok_or_else(|| GameError::UnknownLeaderboard(ctx.id.identity.clone()))?;
        Ok(LeaderboardWindow {
            id: bounds.id,
            start: bounds.start,
            end: bounds.end,
            player_count: self.index.len(),
        })
    }
}

#[async_trait::async_trait(?Send)]
impl<R: RankingIndex + 'static> ActorHandler for LeaderboardActor<R> {
    fn actor_type() -> ActorType {
        LEADERBOARD
    }

    async fn on_activate<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
    ) -> Result<(), ActorError> {
        let state =
            PersistentState::<LeaderboardState>::load(ctx.state_store()?, &ctx.id).await?;
        self.index = R::from_entries(state.state().rankings.clone());
        self.state = Some(state);
        Ok(())
    }

    async fn dispatch<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        method: u32,
        body: &[u8],
    ) -> Result<Vec<u8>, ActorError> {
        match method {
            method::INIT_LEADERBOARD => {
                let req: InitRequest = ctx.codec().decode(body)?;
                encode_reply(ctx, &self.init(ctx, req).await)
            }
            method::GET_PLAYER_RANK => {
                let player_id: PlayerId = ctx.codec().decode(body)?;
                encode_reply(ctx, &self.rank(player_id))
            }
            method::TOP_RANKINGS => {
                let count: i64 = ctx.codec().decode(body)?;
                let top: Result<_, GameError> = Ok(self.index.top(count_to_len(count)));
                encode_reply(ctx, &top)
            }
            method::GET_ABOVE => {
                let req: NeighboursRequest = ctx.codec().decode(body)?;
                let above: Result<_, GameError> =
                    Ok(self.index.above(&req.player_id, count_to_len(req.count)));
                encode_reply(ctx, &above)
            }
            method::GET_BELOW => {
                let req: NeighboursRequest = ctx.codec().decode(body)?;
                let below: Result<_, GameError> =
                    Ok(self.index.below(&req.player_id, count_to_len(req.count)));
                encode_reply(ctx, &below)
            }
            method::UPDATE_PLAYER_SCORE => {
                let req: UpdateScoreRequest = ctx.codec().decode(body)?;
                encode_reply(ctx, &self.update_player_score(ctx, req).await)
            }
            method::GET_WINDOW => encode_reply(ctx, &self.window(ctx)),
            _ => Err(ActorError::UnknownMethod(method)),
        }
    }
}

/// Typed reference to a [`LeaderboardActor`].
#[derive(Debug, Clone)]
pub struct LeaderboardRef<C: MessageCodec = JsonCodec> {
    target: ActorTarget<C>,
}

impl<C: MessageCodec> ActorRef<C> for LeaderboardRef<C> {
    fn from_router(
        identity: impl Into<String>,
        router: &Rc<ActorRouter<C>>,
        caller: Option<&ActorId>,
    ) -> Self {
        Self {
            target: ActorTarget::new(LEADERBOARD, identity, router, caller),
        }
    }
}

impl<C: MessageCodec> LeaderboardRef<C> {
    /// The referenced actor.
    pub fn id(&self) -> &ActorId {
        self.target.id()
    }

    /// Set the window bounds and reset the ranking.
    pub async fn init_leaderboard(
        &self,
        id: LeaderboardId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), GameError> {
        self.target
            .call(method::INIT_LEADERBOARD, &InitRequest { id, start, end })
            .await
    }

    /// Zero-based rank of the player; [`GameError::NotFound`] if unranked.
    pub async fn get_player_rank(&self, player_id: PlayerId) -> Result<usize, GameError> {
        self.target.call(method::GET_PLAYER_RANK, &player_id).await
    }

    /// The first `count` entries; empty for `count <= 0`.
    pub async fn top_rankings(&self, count: i64) -> Result<Vec<RankingEntry>, GameError> {
        self.target.call(method::TOP_RANKINGS, &count).await
    }

    /// Up to `count` entries directly ahead of the player, nearest first.
    pub async fn get_above(
        &self,
        player_id: PlayerId,
        count: i64,
    ) -> Result<Vec<RankingEntry>, GameError> {
        self.target
            .call(method::GET_ABOVE, &NeighboursRequest { player_id, count })
            .await
    }

    /// Up to `count` entries directly behind the player, nearest first.
    pub async fn get_below(
        &self,
        player_id: PlayerId,
        count: i64,
    ) -> Result<Vec<RankingEntry>, GameError> {
        self.target
            .call(method::GET_BELOW, &NeighboursRequest { player_id, count })
            .await
    }

    /// Insert or overwrite the player's entry with an absolute score.
    pub async fn update_player_score(&self, player: &Player, score: u64) -> Result<(), GameError> {
        let req = UpdateScoreRequest {
            player: player.clone(),
            score,
        };
        self.target.call(method::UPDATE_PLAYER_SCORE, &req).await
    }

    /// Window bounds and ranked player count.
    pub async fn get_window(&self) -> Result<LeaderboardWindow, GameError> {
        self.target.call(method::GET_WINDOW, &()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::actors::{ActorNode, InMemoryStateStore, NodeConfig, NodeLifecycle};
    use crate::testing::run_local_test;

    fn leaderboard_node(store: Rc<InMemoryStateStore>) -> ActorNode {
        ActorNode::builder(NodeConfig::builder().state_store(store).build())
            .register::<LeaderboardActor>()
            .build()
            .expect("build node")
    }

    fn player(name: &str) -> Player {
        Player::new(PlayerId::generate(), name)
    }

    async fn open(node: &ActorNode) -> LeaderboardRef {
        let start = Utc::now();
        let id = LeaderboardId::for_window_start(start);
        let board: LeaderboardRef = node.actor_ref(id.to_string());
        board
            .init_leaderboard(id, start, start + Duration::hours(1))
            .await
            .expect("init");
        board
    }

    fn names(entries: &[RankingEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.player_name.as_str()).collect()
    }

    #[test]
    fn test_alice_and_bob_ranking() {
        run_local_test(async {
            let node = leaderboard_node(Rc::new(InMemoryStateStore::new()));
            node.start().expect("start");
            let board = open(&node).await;
            let alice = player("alice");
            let bob = player("bob");

            board.update_player_score(&alice, 10).await.expect("alice");
            board.update_player_score(&bob, 20).await.expect("bob");

            let top = board.top_rankings(2).await.expect("top");
            assert_eq!(names(&top), vec!["bob", "alice"]);
            assert_eq!(top[0].score, 20);
            assert_eq!(board.get_player_rank(alice.id).await, Ok(1));
            assert_eq!(
                names(&board.get_above(alice.id, 3).await.expect("above")),
                vec!["bob"]
            );
            assert_eq!(
                names(&board.get_below(bob.id, 3).await.expect("below")),
                vec!["alice"]
            );

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_unranked_player_not_found() {
        run_local_test(async {
            let node = leaderboard_node(Rc::new(InMemoryStateStore::new()));
            node.start().expect("start");
            let board = open(&node).await;

            let stranger = PlayerId::generate();
            assert_eq!(
                board.get_player_rank(stranger).await,
                Err(GameError::NotFound(stranger))
            );
            assert!(board.get_above(stranger, 3).await.expect("above").is_empty());
            assert!(board.top_rankings(-1).await.expect("top").is_empty());

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_update_requires_initialization() {
        run_local_test(async {
            let node = leaderboard_node(Rc::new(InMemoryStateStore::new()));
            node.start().expect("start");

            let board: LeaderboardRef = node.actor_ref("never-opened");
            let result = board.update_player_score(&player("alice"), 1).await;
            assert_eq!(
                result,
                Err(GameError::UnknownLeaderboard("never-opened".to_string()))
            );
            assert!(matches!(
                board.get_window().await,
                Err(GameError::UnknownLeaderboard(_))
            ));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_reinit_resets_rankings() {
        run_local_test(async {
            let node = leaderboard_node(Rc::new(InMemoryStateStore::new()));
            node.start().expect("start");
            let board = open(&node).await;
            board.update_player_score(&player("alice"), 5).await.expect("update");

            let window = board.get_window().await.expect("window");
            assert_eq!(window.player_count, 1);
            board
                .init_leaderboard(window.id, window.start, window.end)
                .await
                .expect("reinit");
            assert_eq!(board.get_window().await.expect("window").player_count, 0);

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_rankings_survive_restart() {
        run_local_test(async {
            let store = Rc::new(InMemoryStateStore::new());
            let alice = player("alice");
            let bob = player("bob");

            let node = leaderboard_node(store.clone());
            node.start().expect("start");
            let board = open(&node).await;
            let key = board.id().identity.clone();
            board.update_player_score(&alice, 7).await.expect("alice");
            board.update_player_score(&bob, 3).await.expect("bob");
            node.shutdown().await.expect("shutdown");
            assert_eq!(node.status(), NodeLifecycle::Stopped);

            let node = leaderboard_node(store);
            node.start().expect("restart");
            let board: LeaderboardRef = node.actor_ref(key);
            assert_eq!(board.get_player_rank(bob.id).await, Ok(1));
            assert_eq!(board.get_window().await.expect("window").player_count, 2);
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_failed_persist_is_not_served() {
        run_local_test(async {
            let store = Rc::new(InMemoryStateStore::new());
            let node = leaderboard_node(store.clone());
            node.start().expect("start");
            let board = open(&node).await;
            let alice = player("alice");

            store.fail_writes(LEADERBOARD, true);
            let result = board.update_player_score(&alice, 10).await;
            assert!(matches!(result, Err(GameError::Storage(_))));

            store.fail_writes(LEADERBOARD, false);
            assert_eq!(
                board.get_player_rank(alice.id).await,
                Err(GameError::NotFound(alice.id))
            );

            node.shutdown().await.expect("shutdown");
        });
    }
}
