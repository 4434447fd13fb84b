use serde::Serialize;

use crate::record::LeaderboardSnapshot;

/// One line of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedRow {
    pub rank: usize,
    pub name: String,
    pub total: i64,
}

/// Sorts a snapshot by total, highest first.
///
/// The sort is stable: equal totals keep their sheet order. Ranks are the
/// 1-based positions in the result, so ties get distinct ranks.
pub fn rank(snapshot: &LeaderboardSnapshot) -> Vec<RankedRow> {
    let mut rows: Vec<(&str, i64)> = snapshot
        .entries
        .iter()
        .map(|entry| (entry.name.as_str(), entry.total))
        .collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows.into_iter()
        .enumerate()
        .map(|(i, (name, total))| RankedRow {
            rank: i + 1,
            name: name.to_string(),
            total,
        })
        .collect()
}

/// Podium treatment for the top three ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    pub fn for_rank(rank: usize) -> Option<Medal> {
        match rank {
            1 => Some(Medal::Gold),
            2 => Some(Medal::Silver),
            3 => Some(Medal::Bronze),
            _ => None,
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            Medal::Gold => "rank-gold",
            Medal::Silver => "rank-silver",
            Medal::Bronze => "rank-bronze",
        }
    }

    /// Inline CSS for the table row.
    pub fn row_style(self) -> &'static str {
        match self {
            Medal::Gold => "background-color: #ffd700; color: black; font-weight: bold;",
            Medal::Silver => "background-color: #c0c0c0; color: black; font-weight: bold;",
            Medal::Bronze => "background-color: #cd7f32; color: white; font-weight: bold;",
        }
    }
}
