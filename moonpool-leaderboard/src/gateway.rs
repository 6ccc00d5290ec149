//! Per-connection front door for players.
//!
//! A [`PlayerGateway`] stands for one client connection. It addresses players
//! by name, keeps the names that joined through it, and opens its runtime
//! session lazily on first use.

use std::collections::HashMap;
use std::rc::Rc;

use crate::actors::{JsonCodec, MessageCodec};
use crate::game::{
    GameConfig, GameError, GameHostRef, LeaderboardId, LeaderboardRef, PlayerId, PlayerRef,
    PlayerRegistryRef, RankingEntry,
};
use crate::session::{
    connect_with_retries, ActorClient, ClientSession, RetryConfig, RuntimeConnector, SessionError,
};

/// Errors returned by [`PlayerGateway`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No session to the actor runtime could be opened.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A game operation failed.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Receives "game started" signals for players joining a window.
pub trait GameNotifier {
    /// `player_name` joined the window `leaderboard_id`.
    fn game_started(&self, player_name: &str, leaderboard_id: LeaderboardId);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl GameNotifier for TracingNotifier {
    fn game_started(&self, player_name: &str, leaderboard_id: LeaderboardId) {
        tracing::info!(player_name, leaderboard_id = %leaderboard_id, "game started");
    }
}

/// Entries ranked directly above and below a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbours {
    /// Better-ranked entries, nearest first.
    pub above: Vec<RankingEntry>,
    /// Worse-ranked entries, nearest first.
    pub below: Vec<RankingEntry>,
}

/// One client connection's view of the game.
pub struct PlayerGateway<K, C = JsonCodec>
where
    K: RuntimeConnector<C>,
    C: MessageCodec,
{
    connector: K,
    retry: RetryConfig,
    config: GameConfig,
    notifier: Rc<dyn GameNotifier>,
    session: Option<ClientSession<C>>,
    joined: HashMap<String, PlayerId>,
}

impl<K, C> PlayerGateway<K, C>
where
    K: RuntimeConnector<C>,
    C: MessageCodec,
{
    /// Gateway that will connect through `connector` when first needed.
    pub fn new(
        connector: K,
        retry: RetryConfig,
        config: GameConfig,
        notifier: Rc<dyn GameNotifier>,
    ) -> Self {
        Self {
            connector,
            retry,
            config,
            notifier,
            session: None,
            joined: HashMap::new(),
        }
    }

    /// Whether the runtime session has been opened.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Id of `name` if it joined through this gateway.
    pub fn joined_player(&self, name: &str) -> Option<PlayerId> {
        self.joined.get(name).copied()
    }

    /// Register `name` if needed and join it to the current window.
    ///
    /// Returns the window joined.
    pub async fn join_game(&mut self, name: &str) -> Result<LeaderboardId, GatewayError> {
        let result = self.try_join_game(name).await;
        log_failure("join game", name, result)
    }

    async fn try_join_game(&mut self, name: &str) -> Result<LeaderboardId, GatewayError> {
        let client = self.client().await?;

        let registry: PlayerRegistryRef<C> = client.actor_ref(self.config.registry_identity());
        let player = registry.create_or_get_player(name).await?;

        let host: GameHostRef<C> = client.actor_ref(self.config.host_identity());
        let leaderboard_id = host
            .get_current_leaderboard()
            .await?
            .ok_or(GameError::NoActiveWindow)?;

        let player_ref: PlayerRef<C> = client.actor_ref(player.id.to_string());
        player_ref.join_game(leaderboard_id).await?;

        self.notifier.game_started(name, leaderboard_id);
        self.joined.insert(name.to_string(), player.id);
        tracing::info!(player_name = name, player_id = %player.id, leaderboard_id = %leaderboard_id, "player joined through gateway");
        Ok(leaderboard_id)
    }

    /// Apply a score delta for a player that joined through this gateway.
    ///
    /// Returns the new score.
    pub async fn add_score(&mut self, name: &str, delta: i64) -> Result<u64, GatewayError> {
        let result = match self.player(name).await {
            Ok(player) => player.add_score(delta).await.map_err(GatewayError::from),
            Err(err) => Err(err),
        };
        log_failure("add score", name, result)
    }

    /// Zero-based rank of a joined player in its window.
    pub async fn current_rank(&mut self, name: &str) -> Result<usize, GatewayError> {
        let result = match self.player(name).await {
            Ok(player) => player.get_current_rank().await.map_err(GatewayError::from),
            Err(err) => Err(err),
        };
        log_failure("current rank", name, result)
    }

    /// Players ranked just above and below a joined player.
    pub async fn neighbours(&mut self, name: &str) -> Result<Neighbours, GatewayError> {
        let result = self.try_neighbours(name).await;
        log_failure("neighbours", name, result)
    }

    async fn try_neighbours(&mut self, name: &str) -> Result<Neighbours, GatewayError> {
        let player = self.player(name).await?;
        let above = player.get_above_me_3_players().await?;
        let below = player.get_below_me_3_players().await?;
        Ok(Neighbours { above, below })
    }

    /// The best `count` entries of the current window.
    pub async fn top(&mut self, count: usize) -> Result<Vec<RankingEntry>, GatewayError> {
        let result = self.try_top(count).await;
        log_failure("top rankings", "-", result)
    }

    async fn try_top(&mut self, count: usize) -> Result<Vec<RankingEntry>, GatewayError> {
        let client = self.client().await?;
        let host: GameHostRef<C> = client.actor_ref(self.config.host_identity());
        let leaderboard_id = host
            .get_current_leaderboard()
            .await?
            .ok_or(GameError::NoActiveWindow)?;
        let board: LeaderboardRef<C> = client.actor_ref(leaderboard_id.to_string());
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        Ok(board.top_rankings(count).await?)
    }

    /// Close the runtime session, if one was opened.
    pub fn close(self) {
        if let Some(session) = self.session {
            session.close();
        }
    }

    async fn client(&mut self) -> Result<ActorClient<C>, GatewayError> {
        if let Some(session) = &self.session {
            return Ok(session.client());
        }
        let session = connect_with_retries(&self.connector, &self.retry).await?;
        let client = session.client();
        self.session = Some(session);
        Ok(client)
    }

    async fn player(&mut self, name: &str) -> Result<PlayerRef<C>, GatewayError> {
        let player_id = self
            .joined
            .get(name)
            .copied()
            .ok_or(GameError::NotJoined)?;
        let client = self.client().await?;
        Ok(client.actor_ref(player_id.to_string()))
    }
}

fn log_failure<T>(
    operation: &'static str,
    player_name: &str,
    result: Result<T, GatewayError>,
) -> Result<T, GatewayError> {
    if let Err(err) = &result {
        tracing::error!(operation, player_name, error = %err, "gateway request failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::actors::{ActorNode, InMemoryStateStore, NodeConfig};
    use crate::game::register_actors;
    use crate::session::LocalConnector;
    use crate::testing::run_local_test;

    #[derive(Default)]
    struct RecordingNotifier {
        started: RefCell<Vec<(String, LeaderboardId)>>,
    }

    impl GameNotifier for RecordingNotifier {
        fn game_started(&self, player_name: &str, leaderboard_id: LeaderboardId) {
            self.started
                .borrow_mut()
                .push((player_name.to_string(), leaderboard_id));
        }
    }

    fn game_node() -> Rc<ActorNode> {
        let config = NodeConfig::builder()
            .state_store(Rc::new(InMemoryStateStore::new()))
            .build();
        let node = register_actors(ActorNode::builder(config), GameConfig::default())
            .build()
            .expect("build node");
        Rc::new(node)
    }

    fn gateway(
        node: &Rc<ActorNode>,
        notifier: Rc<RecordingNotifier>,
    ) -> PlayerGateway<LocalConnector> {
        PlayerGateway::new(
            LocalConnector::new(node.clone()),
            RetryConfig::new(2, Duration::from_millis(5)),
            GameConfig::default(),
            notifier,
        )
    }

    async fn open_window(node: &ActorNode) -> LeaderboardId {
        let host: GameHostRef = node.actor_ref(GameConfig::default().host_identity());
        host.open_leaderboard(Utc::now(), chrono::Duration::hours(1))
            .await
            .expect("open window")
    }

    #[test]
    fn test_join_without_window() {
        run_local_test(async {
            let node = game_node();
            node.start().expect("start");
            let notifier = Rc::new(RecordingNotifier::default());
            let mut gateway = gateway(&node, notifier.clone());

            assert_eq!(
                gateway.join_game("alice").await,
                Err(GatewayError::Game(GameError::NoActiveWindow))
            );
            assert!(notifier.started.borrow().is_empty());
            assert_eq!(gateway.joined_player("alice"), None);

            gateway.close();
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_score_requires_join_on_this_gateway() {
        run_local_test(async {
            let node = game_node();
            node.start().expect("start");
            open_window(&node).await;

            let mut first = gateway(&node, Rc::new(RecordingNotifier::default()));
            let mut second = gateway(&node, Rc::new(RecordingNotifier::default()));
            first.join_game("alice").await.expect("join");

            assert_eq!(
                second.add_score("alice", 5).await,
                Err(GatewayError::Game(GameError::NotJoined))
            );
            assert_eq!(first.add_score("alice", 5).await, Ok(5));

            first.close();
            second.close();
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_join_play_and_query() {
        run_local_test(async {
            let node = game_node();
            node.start().expect("start");
            let window = open_window(&node).await;
            let notifier = Rc::new(RecordingNotifier::default());
            let mut gateway = gateway(&node, notifier.clone());

            for name in ["alice", "bob", "carol"] {
                assert_eq!(gateway.join_game(name).await, Ok(window));
            }
            assert_eq!(notifier.started.borrow().len(), 3);
            assert_eq!(notifier.started.borrow()[0], ("alice".to_string(), window));

            gateway.add_score("alice", 10).await.expect("alice");
            gateway.add_score("bob", 30).await.expect("bob");
            gateway.add_score("carol", 20).await.expect("carol");

            assert_eq!(gateway.current_rank("bob").await, Ok(0));
            assert_eq!(gateway.current_rank("carol").await, Ok(1));

            let neighbours = gateway.neighbours("carol").await.expect("neighbours");
            let above: Vec<_> = neighbours.above.iter().map(|e| e.player_name.as_str()).collect();
            let below: Vec<_> = neighbours.below.iter().map(|e| e.player_name.as_str()).collect();
            assert_eq!(above, ["bob"]);
            assert_eq!(below, ["alice"]);

            let top = gateway.top(2).await.expect("top");
            let names: Vec<_> = top.iter().map(|e| e.player_name.as_str()).collect();
            assert_eq!(names, ["bob", "carol"]);

            gateway.close();
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_session_is_lazy_and_closed() {
        run_local_test(async {
            let node = game_node();
            node.start().expect("start");
            open_window(&node).await;
            let mut gateway = gateway(&node, Rc::new(RecordingNotifier::default()));

            assert!(!gateway.is_connected());
            assert_eq!(node.connected_clients(), 0);

            gateway.join_game("alice").await.expect("join");
            gateway.join_game("bob").await.expect("join");
            assert!(gateway.is_connected());
            assert_eq!(node.connected_clients(), 1);

            gateway.close();
            assert_eq!(node.connected_clients(), 0);
            node.shutdown().await.expect("shutdown");
        });
    }

    #[test]
    fn test_unreachable_runtime() {
        run_local_test(async {
            let node = game_node();
            let mut gateway = gateway(&node, Rc::new(RecordingNotifier::default()));

            assert_eq!(
                gateway.join_game("alice").await,
                Err(GatewayError::Session(SessionError::RetryExhausted {
                    attempts: 2
                }))
            );
            assert!(!gateway.is_connected());
        });
    }

    #[test]
    fn test_stopped_runtime_fails_fast() {
        run_local_test(async {
            let node = game_node();
            node.start().expect("start");
            node.shutdown().await.expect("shutdown");
            let mut gateway = PlayerGateway::new(
                LocalConnector::new(node.clone()),
                RetryConfig::new(5, Duration::from_secs(60)),
                GameConfig::default(),
                Rc::new(RecordingNotifier::default()),
            );

            let joined = tokio::time::timeout(Duration::from_secs(1), gateway.join_game("alice"))
                .await
                .expect("no wait between attempts");
            assert!(matches!(
                joined,
                Err(GatewayError::Session(SessionError::Unexpected(_)))
            ));
        });
    }
}
