#![allow(dead_code)]

use async_trait::async_trait;
use leaderboard::store::{MemoryTableStore, Table, TableStore};
use leaderboard::{LeaderboardError, Result};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Memory table whose reads and writes can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryTableStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub fail_update_only: AtomicBool,
    pub read_delay_ms: AtomicU64,
    pub clears: AtomicUsize,
    pub row_writes: AtomicUsize,
    pub appends: AtomicUsize,
}

impl FlakyStore {
    pub fn with_rows(rows: Vec<Vec<Value>>) -> Self {
        FlakyStore {
            inner: MemoryTableStore::with_rows(rows),
            ..FlakyStore::default()
        }
    }

    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.inner.rows().unwrap()
    }

    fn check(&self, flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(LeaderboardError::StoreUnavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TableStore for FlakyStore {
    async fn get_all_values(&self) -> Result<Table> {
        self.check(&self.fail_reads)?;
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.get_all_values().await
    }

    async fn clear(&self) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await
    }

    async fn update(&self, rows: Vec<Vec<Value>>) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.check(&self.fail_update_only)?;
        self.inner.update(rows).await
    }

    async fn update_row(&self, row_number: usize, row: Vec<Value>) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.row_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_row(row_number, row).await
    }

    async fn append_row(&self, row: Vec<Value>) -> Result<()> {
        self.check(&self.fail_writes)?;
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner.append_row(row).await
    }
}

/// Header row for `n` questions.
pub fn header_row(n: usize) -> Vec<Value> {
    leaderboard::record::header(n)
        .into_iter()
        .map(Value::String)
        .collect()
}

/// A data row with the total computed from `scores`.
pub fn score_row(name: &str, scores: &[i64]) -> Vec<Value> {
    let mut row = vec![json!(name), json!(scores.iter().sum::<i64>())];
    row.extend(scores.iter().map(|s| json!(s)));
    row
}

/// Rows whose name cell equals `name`.
pub fn rows_named<'a>(rows: &'a [Vec<Value>], name: &str) -> Vec<&'a Vec<Value>> {
    rows.iter()
        .skip(1)
        .filter(|row| row.first() == Some(&json!(name)))
        .collect()
}
