use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{LeaderboardError, Result};
use crate::record::{
    LeaderboardSnapshot, NAME_COLUMN, Record, ScoreRecord, cell_text, header, to_row,
};
use crate::store::{Table, TableStore};

/// How [`LeaderboardRepository::upsert`] writes a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsertStrategy {
    /// Overwrite the matching row in place or append a new one.
    #[default]
    RowUpdate,
    /// Read everything, drop the old row, clear the sheet and write it back.
    FullRewrite,
}

/// Outcome of looking a nickname up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Vec<i64>),
    NotFound,
    Unavailable(LeaderboardError),
}

impl Lookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lookup::Found(_) => "found",
            Lookup::NotFound => "not_found",
            Lookup::Unavailable(_) => "unavailable",
        }
    }
}

/// Score rows keyed by nickname, on top of a [`TableStore`].
///
/// There is no locking between the read and the write of an upsert; two
/// participants saving at the same moment can still overwrite each other
/// under [`UpsertStrategy::FullRewrite`].
#[derive(Clone)]
pub struct LeaderboardRepository {
    store: Arc<dyn TableStore>,
    question_count: usize,
    strategy: UpsertStrategy,
}

impl LeaderboardRepository {
    pub fn new(store: Arc<dyn TableStore>, question_count: usize, strategy: UpsertStrategy) -> Self {
        LeaderboardRepository {
            store,
            question_count,
            strategy,
        }
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    pub fn strategy(&self) -> UpsertStrategy {
        self.strategy
    }

    /// Reads every row of the sheet.
    ///
    /// # Errors
    /// * `StoreUnavailable` / `Auth` from the underlying store
    pub async fn load_all(&self) -> Result<LeaderboardSnapshot> {
        let records = self.store.get_all_records().await?;
        log::debug!("loaded {} leaderboard rows", records.len());
        Ok(LeaderboardSnapshot::from_records(records))
    }

    /// Looks up the scores saved for `name`. Never fails; store and parse
    /// errors come back as [`Lookup::Unavailable`].
    pub async fn lookup(&self, name: &str) -> Lookup {
        let snapshot = match self.load_all().await {
            Ok(snapshot) => snapshot,
            Err(e) => return Lookup::Unavailable(e),
        };
        match snapshot.find(name) {
            None => Lookup::NotFound,
            Some(entry) => match ScoreRecord::from_record(&entry.record, self.question_count) {
                Ok(record) => Lookup::Found(record.scores),
                Err(e) => Lookup::Unavailable(e),
            },
        }
    }

    /// Inserts or replaces the row for `record.name`.
    ///
    /// # Errors
    /// * Any store failure. Under `FullRewrite` a failure after the clear
    ///   leaves the sheet empty; nothing is rolled back.
    pub async fn upsert(&self, record: &ScoreRecord) -> Result<()> {
        match self.strategy {
            UpsertStrategy::FullRewrite => {
                let table = self.store.get_all_values().await?;
                self.rewrite(&table, record).await
            }
            UpsertStrategy::RowUpdate => self.update_in_place(record).await,
        }
    }

    async fn update_in_place(&self, record: &ScoreRecord) -> Result<()> {
        let table = self.store.get_all_values().await?;
        let current_header = table.header();
        let fields = record.to_record();

        if current_header.iter().all(|column| column.is_empty()) {
            let columns = header(self.question_count);
            let row = to_row(&fields, &columns);
            log::debug!("initialising empty sheet with row for {:?}", record.name);
            return self
                .store
                .update(vec![header_row(&columns), row])
                .await;
        }

        let missing_column = header(self.question_count)
            .iter()
            .any(|column| !current_header.contains(column));
        let name_index = current_header.iter().position(|c| c == NAME_COLUMN);
        let matches: Vec<usize> = match name_index {
            Some(col) => table
                .data_rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| cell_text(row.get(col)) == record.name)
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        };

        if missing_column || matches.len() > 1 {
            log::debug!(
                "falling back to full rewrite for {:?} ({} matching rows)",
                record.name,
                matches.len()
            );
            return self.rewrite(&table, record).await;
        }

        let row = to_row(&fields, &current_header);
        match matches.first() {
            // header is sheet row 1, data row i is sheet row i + 2
            Some(i) => self.store.update_row(i + 2, row).await,
            None => self.store.append_row(row).await,
        }
    }

    /// Filter, append, clear, rewrite. Columns found in the sheet but not in
    /// the canonical header are kept after it.
    async fn rewrite(&self, table: &Table, record: &ScoreRecord) -> Result<()> {
        let mut columns = header(self.question_count);
        for column in table.header() {
            if !column.is_empty() && !columns.contains(&column) {
                columns.push(column);
            }
        }

        let mut kept: Vec<Record> = table
            .records()
            .into_iter()
            .filter(|r| cell_text(r.get(NAME_COLUMN)) != record.name)
            .collect();
        kept.push(record.to_record());

        let mut rows = Vec::with_capacity(kept.len() + 1);
        rows.push(header_row(&columns));
        rows.extend(kept.iter().map(|r| to_row(r, &columns)));

        self.store.clear().await?;
        self.store.update(rows).await
    }
}

fn header_row(columns: &[String]) -> Vec<Value> {
    columns.iter().map(|c| Value::String(c.clone())).collect()
}
