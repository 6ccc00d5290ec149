//! Player actor: one player's identity, score and current window.
//!
//! The actor key is the player's id. Score operations are forwarded to the
//! leaderboard the player joined; the binding is part of the persisted
//! state, so it survives deactivation.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::actors::{
    ActorContext, ActorError, ActorHandler, ActorId, ActorRef, ActorRouter, ActorType, JsonCodec,
    MessageCodec, PersistentState,
};

use super::config::{GameConfig, ScoreUnderflowPolicy};
use super::error::GameError;
use super::ids::{LeaderboardId, PlayerId};
use super::leaderboard::LeaderboardRef;
use super::ranking::RankingEntry;
use super::{encode_reply, loaded, persist, ActorTarget};

/// Actor type of players.
pub const PLAYER: ActorType = ActorType(0x504C_4159);

mod method {
    pub const CREATE_PLAYER: u32 = 1;
    pub const JOIN_GAME: u32 = 2;
    pub const ADD_SCORE: u32 = 3;
    pub const CURRENT_SCORE: u32 = 4;
    pub const GET_CURRENT_RANK: u32 = 5;
    pub const GET_ABOVE_ME: u32 = 6;
    pub const GET_BELOW_ME: u32 = 7;
    pub const GET_PLAYER: u32 = 8;
}

/// Player record, also used as the summary handed to the registry and the
/// leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable id, equal to the player actor's key.
    pub id: PlayerId,
    /// Name chosen by the player, unique within the registry.
    pub name: String,
    /// Current score.
    pub score: u64,
    /// Window the player last joined.
    pub current_leaderboard: Option<LeaderboardId>,
}

impl Player {
    /// A fresh player with a zero score and no window.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            score: 0,
            current_leaderboard: None,
        }
    }
}

/// Player actor.
pub struct PlayerActor {
    policy: ScoreUnderflowPolicy,
    neighbour_count: usize,
    state: Option<PersistentState<Option<Player>>>,
}

impl PlayerActor {
    /// Build a player activation using the game's score policy.
    pub fn new(config: &GameConfig) -> Self {
        Self {
            policy: config.underflow_policy(),
            neighbour_count: config.neighbour_count(),
            state: None,
        }
    }

    /// The created player, or [`GameError::UnknownPlayer`].
    fn player(&self, ctx_id: &ActorId) -> Result<&Player, GameError> {
        self.state
            .as_ref()
            .and_then(|state| state.state().as_ref())
            .ok_or_else(|| GameError::UnknownPlayer(ctx_id.identity.clone()))
    }

    fn joined_board<C: MessageCodec>(
        &self,
        ctx: &ActorContext<C>,
    ) -> Result<(PlayerId, LeaderboardRef<C>), GameError> {
        let player = self.player(&ctx.id)?;
        let board_id = player.current_leaderboard.ok_or(GameError::NotJoined)?;
        Ok((player.id, ctx.actor_ref(board_id.to_string())))
    }

    async fn create_player<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        name: String,
    ) -> Result<Player, GameError> {
        let id: PlayerId = ctx
            .id
            .identity
            .parse()
            .map_err(|_| GameError::InvalidIdentity(ctx.id.identity.clone()))?;

        let player = Player::new(id, name);
        let state = loaded(&mut self.state, &ctx.id)?;
        *state.state_mut() = Some(player.clone());
        persist(ctx, state).await?;

        tracing::info!(player_id = %player.id, name = %player.name, "player created");
        Ok(player)
    }

    async fn join_game<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        leaderboard_id: LeaderboardId,
    ) -> Result<(), GameError> {
        self.player(&ctx.id)?;
        let state = loaded(&mut self.state, &ctx.id)?;
        if let Some(player) = state.state_mut().as_mut() {
            player.current_leaderboard = Some(leaderboard_id);
        }
        persist(ctx, state).await?;

        tracing::info!(player_id = %ctx.id.identity, leaderboard_id = %leaderboard_id, "player joined");
        Ok(())
    }

    /// Update the leaderboard first; commit locally only once it accepted
    /// the new absolute score.
    async fn add_score<C: MessageCodec>(
        &mut self,
        ctx: &ActorContext<C>,
        delta: i64,
    ) -> Result<u64, GameError> {
        let (_, board) = self.joined_board(ctx)?;
        let mut snapshot = self.player(&ctx.id)?.clone();
        let score = self.policy.apply(snapshot.score, delta)?;
        snapshot.score = score;

        board.update_player_score(&snapshot, score).await?;

        let state = loaded(&mut self.state, &ctx.id)?;
        *state.state_mut() = Some(snapshot);
        persist(ctx, state).await?;

        tracing::debug!(player_id = %ctx.id.identity, delta, score, "score added");
        Ok(score)
    }

    async fn current_rank<C: MessageCodec>(
        &self,
        ctx: &ActorContext<C>,
    ) -> Result<usize, GameError> {
        let (player_id, board) = self.joined_board(ctx)?;
        board.get_player_rank(player_id).await
    }

    async fn neighbours<C: MessageCodec>(
        &self,
        ctx: &ActorContext<C>,
        above: bool,
    ) -> Result<Vec<RankingEntry>, GameError> {
        let (player_id, board) = self.joined_board(ctx)?;
        let count = i64::try_from(self.neighbour_count).unwrap_or(i64::MAX);
        if above {
            board.get_above(player_id, count).await
        } else {
            board.get_below(player_id, count).await
        }
    }
}

impl Default for PlayerActor {
    fn default() -> Self {
        Self::new(&GameConfig::default())
    }
}

#[async_trait::async_trait(?Send)]
impl ActorHandler for PlayerActor {
    fn actor_type() -> ActorType {
        PLAYER
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
            method::CREATE_PLAYER => {
                let name: String = ctx.codec().decode(body)?;
                encode_reply(ctx, &self.create_player(ctx, name).await)
            }
            method::JOIN_GAME => {
                let leaderboard_id: LeaderboardId = ctx.codec().decode(body)?;
                encode_reply(ctx, &self.join_game(ctx, leaderboard_id).await)
            }
            method::ADD_SCORE => {
                let delta: i64 = ctx.codec().decode(body)?;
                encode_reply(ctx, &self.add_score(ctx, delta).await)
            }
            method::CURRENT_SCORE => {
                let score = self.player(&ctx.id).map(|player| player.score);
                encode_reply(ctx, &score)
            }
            method::GET_CURRENT_RANK => encode_reply(ctx, &self.current_rank(ctx).await),
            method::GET_ABOVE_ME => encode_reply(ctx, &self.neighbours(ctx, true).await),
            method::GET_BELOW_ME => encode_reply(ctx, &self.neighbours(ctx, false).await),
            method::GET_PLAYER => encode_reply(ctx, &self.player(&ctx.id).cloned()),
            _ => Err(ActorError::UnknownMethod(method)),
        }
    }
}

/// Typed reference to a [`PlayerActor`].
#[derive(Debug, Clone)]
pub struct PlayerRef<C: MessageCodec = JsonCodec> {
    target: ActorTarget<C>,
}

impl<C: MessageCodec> ActorRef<C> for PlayerRef<C> {
    fn from_router(
        identity: impl Into<String>,
        router: &Rc<ActorRouter<C>>,
        caller: Option<&ActorId>,
    ) -> Self {
        Self {
            target: ActorTarget::new(PLAYER, identity, router, caller),
        }
    }
}

impl<C: MessageCodec> PlayerRef<C> {
    /// The referenced actor.
    pub fn id(&self) -> &ActorId {
        self.target.id()
    }

    /// Initialize the player with `name` and a zero score.
    ///
    /// Overwrites an existing player; the registry makes sure this happens
    /// once per id.
    pub async fn create_player(&self, name: impl Into<String>) -> Result<Player, GameError> {
        self.target
            .call(method::CREATE_PLAYER, &name.into())
            .await
    }

    /// Bind the player to a leaderboard window.
    pub async fn join_game(&self, leaderboard_id: LeaderboardId) -> Result<(), GameError> {
        self.target.call(method::JOIN_GAME, &leaderboard_id).await
    }

    /// Apply a signed delta and push the new score to the bound leaderboard.
    ///
    /// Returns the new score.
    pub async fn add_score(&self, delta: i64) -> Result<u64, GameError> {
        self.target.call(method::ADD_SCORE, &delta).await
    }

    /// The player's score.
    pub async fn current_score(&self) -> Result<u64, GameError> {
        self.target.call(method::CURRENT_SCORE, &()).await
    }

    /// Zero-based rank on the bound leaderboard.
    pub async fn get_current_rank(&self) -> Result<usize, GameError> {
        self.target.call(method::GET_CURRENT_RANK, &()).await
    }

    /// Players directly ahead, nearest first (3 by default).
    pub async fn get_above_me_3_players(&self) -> Result<Vec<RankingEntry>, GameError> {
        self.target.call(method::GET_ABOVE_ME, &()).await
    }

    /// Players directly behind, nearest first (3 by default).
    pub async fn get_below_me_3_players(&self) -> Result<Vec<RankingEntry>, GameError> {
        self.target.call(method::GET_BELOW_ME, &()).await
    }

    /// Snapshot of the player record.
    pub async fn get_player(&self) -> Result<Player, GameError> {
        self.target.call(method::GET_PLAYER, &()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::actors::{ActorNode, InMemoryStateStore, NodeConfig};
    use crate::game::{register_actors, GameHostRef, LEADERBOARD};
    use crate::testing::run_local_test;

    fn game_node(store: Rc<InMemoryStateStore>, config: GameConfig) -> ActorNode {
        let builder = ActorNode::builder(NodeConfig::builder().state_store(store).build());
        register_actors(builder, config).build().expect("build node")
    }

    async fn new_player(node: &ActorNode, name: &str) -> PlayerRef {
        let player: PlayerRef = node.actor_ref(PlayerId::generate().to_string());
        player.create_player(name).await.expect("create");
        player
    }

    async fn open_window(node: &ActorNode) -> LeaderboardId {
        let host: GameHostRef = node.actor_ref(GameConfig::default().host_identity());
        host.open_leaderboard(Utc::now(), Duration::hours(1))
            .await
            .expect("open")
    }

    #[test]
    fn test_create_player_uses_actor_key() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()), GameConfig::default());
            node.start().expect("start");

            let id = PlayerId::generate();
            let player: PlayerRef = node.actor_ref(id.to_string());
            let created = player.create_player("alice").await.expect("create");
            assert_eq!(created, Player::new(id, "alice"));
            assert_eq!(player.current_score().await, Ok(0));

            let bad: PlayerRef = node.actor_ref("not-a-uuid");
            assert!(matches!(
                bad.create_player("mallory").await,
                Err(GameError::InvalidIdentity(_))
            ));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_score_operations_require_join() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()), GameConfig::default());
            node.start().expect("start");
            let player = new_player(&node, "alice").await;

            assert_eq!(player.get_current_rank().await, Err(GameError::NotJoined));
            assert_eq!(player.add_score(5).await, Err(GameError::NotJoined));
            assert_eq!(player.get_above_me_3_players().await, Err(GameError::NotJoined));
            assert_eq!(player.get_below_me_3_players().await, Err(GameError::NotJoined));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_uncreated_player_is_unknown() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()), GameConfig::default());
            node.start().expect("start");

            let ghost: PlayerRef = node.actor_ref(PlayerId::generate().to_string());
            assert!(matches!(
                ghost.current_score().await,
                Err(GameError::UnknownPlayer(_))
            ));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_add_score_is_additive() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()), GameConfig::default());
            node.start().expect("start");
            let board = open_window(&node).await;
            let player = new_player(&node, "alice").await;
            player.join_game(board).await.expect("join");

            assert_eq!(player.add_score(5).await, Ok(5));
            assert_eq!(player.add_score(-3).await, Ok(2));
            assert_eq!(player.current_score().await, Ok(2));
            assert_eq!(player.get_current_rank().await, Ok(0));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_underflow_rejected_by_default() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()), GameConfig::default());
            node.start().expect("start");
            let board = open_window(&node).await;
            let player = new_player(&node, "alice").await;
            player.join_game(board).await.expect("join");
            player.add_score(2).await.expect("add");

            assert_eq!(
                player.add_score(-3).await,
                Err(GameError::ScoreUnderflow {
                    current: 2,
                    delta: -3
                })
            );
            assert_eq!(player.current_score().await, Ok(2));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_underflow_clamped_when_configured() {
        run_local_test(async {
            let config = GameConfig::builder()
                .underflow_policy(ScoreUnderflowPolicy::Clamp)
                .build();
            let node = game_node(Rc::new(InMemoryStateStore::new()), config);
            node.start().expect("start");
            let board = open_window(&node).await;
            let player = new_player(&node, "alice").await;
            player.join_game(board).await.expect("join");
            player.add_score(2).await.expect("add");

            assert_eq!(player.add_score(-3).await, Ok(0));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_neighbours_delegate_to_leaderboard() {
        run_local_test(async {
            let node = game_node(Rc::new(InMemoryStateStore::new()), GameConfig::default());
            node.start().expect("start");
            let board = open_window(&node).await;

            let mut players = Vec::new();
            for (name, score) in [("a", 50), ("b", 40), ("c", 30), ("d", 20), ("e", 10)] {
                let player = new_player(&node, name).await;
                player.join_game(board).await.expect("join");
                player.add_score(score).await.expect("add");
                players.push(player);
            }

            let above: Vec<String> = players[4]
                .get_above_me_3_players()
                .await
                .expect("above")
                .into_iter()
                .map(|e| e.player_name)
                .collect();
            assert_eq!(above, vec!["d", "c", "b"]);

            let below: Vec<String> = players[0]
                .get_below_me_3_players()
                .await
                .expect("below")
                .into_iter()
                .map(|e| e.player_name)
                .collect();
            assert_eq!(below, vec!["b", "c", "d"]);

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_leaderboard_failure_leaves_score_untouched() {
        run_local_test(async {
            let store = Rc::new(InMemoryStateStore::new());
            let node = game_node(store.clone(), GameConfig::default());
            node.start().expect("start");
            let board = open_window(&node).await;
            let player = new_player(&node, "alice").await;
            player.join_game(board).await.expect("join");
            player.add_score(4).await.expect("add");

            store.fail_writes(LEADERBOARD, true);
            assert!(matches!(player.add_score(6).await, Err(GameError::Storage(_))));
            assert_eq!(player.current_score().await, Ok(4));

            store.fail_writes(LEADERBOARD, false);
            assert_eq!(player.add_score(6).await, Ok(10));

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_local_persist_failure_reconciles_on_next_add() {
        run_local_test(async {
            let store = Rc::new(InMemoryStateStore::new());
            let node = game_node(store.clone(), GameConfig::default());
            node.start().expect("start");
            let board_id = open_window(&node).await;
            let player = new_player(&node, "alice").await;
            player.join_game(board_id).await.expect("join");
            player.add_score(4).await.expect("add");

            store.fail_writes(PLAYER, true);
            assert!(matches!(player.add_score(6).await, Err(GameError::Storage(_))));
            store.fail_writes(PLAYER, false);

            // The leaderboard already holds 10, the player reloads 4.
            let board: LeaderboardRef = node.actor_ref(board_id.to_string());
            assert_eq!(board.top_rankings(1).await.expect("top")[0].score, 10);
            assert_eq!(player.current_score().await, Ok(4));

            assert_eq!(player.add_score(1).await, Ok(5));
            assert_eq!(board.top_rankings(1).await.expect("top")[0].score, 5);

            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_binding_survives_reactivation() {
        run_local_test(async {
            let store = Rc::new(InMemoryStateStore::new());
            let node = game_node(store.clone(), GameConfig::default());
            node.start().expect("start");
            let board = open_window(&node).await;
            let id = PlayerId::generate();
            let player: PlayerRef = node.actor_ref(id.to_string());
            player.create_player("alice").await.expect("create");
            player.join_game(board).await.expect("join");
            player.add_score(3).await.expect("add");
            node.shutdown().await.expect("shutdown");

            let node = game_node(store, GameConfig::default());
            node.start().expect("restart");
            let player: PlayerRef = node.actor_ref(id.to_string());
            assert_eq!(player.add_score(2).await, Ok(5));
            assert_eq!(
                player.get_player().await.expect("player").current_leaderboard,
                Some(board)
            );

            node.shutdown().await.expect("shutdown");
        });
    }
}
