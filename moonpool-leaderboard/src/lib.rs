//! # Moonpool Leaderboard
//!
//! A live, multiplayer leaderboard built on Orleans-style virtual actors.
//!
//! Players join a time-boxed competition window, submit score deltas, and
//! query their rank and immediate neighbours. Every piece of state lives in
//! an actor that is activated on first use and processes one call at a time,
//! so the ranking stays consistent without locks.
//!
//! ## Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  gateway: PlayerGateway (join/add score by player name)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  session: connect with retries, scoped ClientSession        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game: GameHost → PlayerRegistry → Player → Leaderboard     │
//! │        RankingIndex (SortedRankings)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  actors: ActorNode, host, router, directory, state store    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use moonpool_leaderboard::actors::{ActorNode, NodeConfig};
//! use moonpool_leaderboard::game::{self, GameConfig, GameHostRef};
//!
//! let node = game::register_actors(
//!     ActorNode::builder(NodeConfig::default()),
//!     GameConfig::default(),
//! )
//! .build()?;
//! node.start()?;
//!
//! let host: GameHostRef = node.actor_ref(GameConfig::default().host_identity());
//! let board = host.open_leaderboard(chrono::Utc::now(), chrono::Duration::hours(1)).await?;
//! ```

#![warn(missing_docs)]

pub mod actors;
pub mod game;
pub mod gateway;
pub mod session;

#[cfg(test)]
mod testing;
