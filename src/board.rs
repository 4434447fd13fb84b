use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::ranking::{RankedRow, rank};
use crate::repository::LeaderboardRepository;

/// The latest ranking and when it was computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingView {
    pub rows: Vec<RankedRow>,
    pub refreshed_at: DateTime<Utc>,
}

/// Keeps a ranking that is recomputed on a timer.
///
/// A failed refresh leaves the previous view in place; nobody is told
/// except the log.
pub struct RankingBoard {
    repo: LeaderboardRepository,
    current: RwLock<Option<RankingView>>,
}

impl RankingBoard {
    pub fn new(repo: LeaderboardRepository) -> Self {
        RankingBoard {
            repo,
            current: RwLock::new(None),
        }
    }

    /// `None` until the first successful refresh.
    pub fn current(&self) -> Option<RankingView> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Loads and re-ranks the sheet. Returns `false` if the load failed.
    pub async fn refresh(&self) -> bool {
        match self.repo.load_all().await {
            Ok(snapshot) => {
                let view = RankingView {
                    rows: rank(&snapshot),
                    refreshed_at: Utc::now(),
                };
                *self
                    .current
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(view);
                true
            }
            Err(e) => {
                log::warn!("leaderboard refresh failed, keeping previous view: {}", e);
                false
            }
        }
    }

    /// Refreshes immediately and then every `interval`. A slow load delays
    /// the following tick rather than overlapping it.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.refresh().await;
            }
        })
    }
}
