//! Score-ordered ranking of a leaderboard window.
//!
//! [`RankingIndex`] is the seam between the leaderboard actor and the data
//! structure holding its entries. [`SortedRankings`] keeps a plain vector and
//! re-sorts it after every update: O(n log n) per update, which is fine for
//! small windows. An order-statistics tree can replace it behind the same
//! trait without touching the actor or its persisted state.
//!
//! Ordering: score descending. Equal scores keep their relative order, so
//! the player that reached a score first stays ahead.

use serde::{Deserialize, Serialize};

use super::ids::PlayerId;

/// A player's denormalized row in a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    /// The ranked player.
    pub player_id: PlayerId,
    /// Display name at the time of the last update.
    pub player_name: String,
    /// Absolute score.
    pub score: u64,
}

/// Ordered index of ranking entries.
pub trait RankingIndex: Default {
    /// Rebuild an index from entries already in ranking order.
    fn from_entries(entries: Vec<RankingEntry>) -> Self;

    /// Insert the entry, or overwrite the score and name of the player's
    /// existing entry, keeping the index ordered.
    fn upsert(&mut self, entry: RankingEntry);

    /// Zero-based position of the player.
    fn rank_of(&self, player_id: &PlayerId) -> Option<usize>;

    /// The first `n` entries.
    fn top(&self, n: usize) -> Vec<RankingEntry>;

    /// Up to `n` entries directly ahead of the player, nearest first.
    fn above(&self, player_id: &PlayerId, n: usize) -> Vec<RankingEntry>;

    /// Up to `n` entries directly behind the player, nearest first.
    fn below(&self, player_id: &PlayerId, n: usize) -> Vec<RankingEntry>;

    /// Every entry in ranking order.
    fn entries(&self) -> Vec<RankingEntry>;

    /// Number of ranked players.
    fn len(&self) -> usize;

    /// Whether nobody is ranked yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Vector kept sorted with a stable sort after every update.
#[derive(Debug, Clone, Default)]
pub struct SortedRankings {
    entries: Vec<RankingEntry>,
}

impl SortedRankings {
    fn position(&self, player_id: &PlayerId) -> Option<usize> {
        self.entries.iter().position(|e| &e.player_id == player_id)
    }
}

impl RankingIndex for SortedRankings {
    fn from_entries(entries: Vec<RankingEntry>) -> Self {
        let mut index = Self { entries };
        index.entries.sort_by(|a, b| b.score.cmp(&a.score));
        index
    }

    fn upsert(&mut self, entry: RankingEntry) {
        match self.position(&entry.player_id) {
            Some(idx) => {
                let existing = &mut self.entries[idx];
                existing.score = entry.score;
                existing.player_name = entry.player_name;
            }
            None => self.entries.push(entry),
        }
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
    }

    fn rank_of(&self, player_id: &PlayerId) -> Option<usize> {
        self.position(player_id)
    }

    fn top(&self, n: usize) -> Vec<RankingEntry> {
        self.entries.iter().take(n).cloned().collect()
    }

    fn above(&self, player_id: &PlayerId, n: usize) -> Vec<RankingEntry> {
        let Some(idx) = self.position(player_id) else {
            return Vec::new();
        };
        self.entries[idx.saturating_sub(n)..idx]
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    fn below(&self, player_id: &PlayerId, n: usize) -> Vec<RankingEntry> {
        let Some(idx) = self.position(player_id) else {
            return Vec::new();
        };
        self.entries.iter().skip(idx + 1).take(n).cloned().collect()
    }

    fn entries(&self) -> Vec<RankingEntry> {
        self.entries.clone()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
