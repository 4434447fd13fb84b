use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::error::{LeaderboardError, Result};
use crate::record::{Record, cell_text};

/// A worksheet as a grid of cells. Row 0, if present, is the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Table { rows }
    }

    /// Header names, or an empty list for a blank sheet.
    pub fn header(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.iter().map(|cell| cell_text(Some(cell))).collect())
            .unwrap_or_default()
    }

    /// Data rows below the header.
    pub fn data_rows(&self) -> &[Vec<Value>] {
        if self.rows.is_empty() {
            &[]
        } else {
            &self.rows[1..]
        }
    }

    /// Converts the data rows to records keyed by the header.
    ///
    /// Short rows are padded with empty strings and cells past the last
    /// header column are dropped.
    pub fn records(&self) -> Vec<Record> {
        let header = self.header();
        self.data_rows()
            .iter()
            .map(|row| {
                header
                    .iter()
                    .enumerate()
                    .filter(|(_, column)| !column.is_empty())
                    .map(|(i, column)| {
                        let cell = row
                            .get(i)
                            .cloned()
                            .unwrap_or_else(|| Value::String(String::new()));
                        (column.clone(), cell)
                    })
                    .collect()
            })
            .collect()
    }
}

/// The remote table the leaderboard lives in.
///
/// Row numbers are 1-based sheet rows, so the header is row 1 and the first
/// data row is row 2.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Reads every non-empty row, header included.
    async fn get_all_values(&self) -> Result<Table>;

    /// Removes all cell content.
    async fn clear(&self) -> Result<()>;

    /// Writes `rows` starting at the top-left cell.
    async fn update(&self, rows: Vec<Vec<Value>>) -> Result<()>;

    /// Overwrites a single row in place.
    async fn update_row(&self, row_number: usize, row: Vec<Value>) -> Result<()>;

    /// Adds a row after the last non-empty row.
    async fn append_row(&self, row: Vec<Value>) -> Result<()>;

    /// All data rows as header-keyed records.
    async fn get_all_records(&self) -> Result<Vec<Record>> {
        Ok(self.get_all_values().await?.records())
    }
}

/// In-process table, used for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    rows: Mutex<Vec<Vec<Value>>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Vec<Value>>) -> Self {
        MemoryTableStore {
            rows: Mutex::new(rows),
        }
    }

    /// Copy of the current grid.
    pub fn rows(&self) -> Result<Vec<Vec<Value>>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Vec<Value>>>> {
        self.rows
            .lock()
            .map_err(|_| LeaderboardError::StoreUnavailable("memory table poisoned".to_string()))
    }
}

fn is_blank(row: &[Value]) -> bool {
    row.iter().all(|cell| match cell {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    })
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn get_all_values(&self) -> Result<Table> {
        let mut rows = self.lock()?.clone();
        while rows.last().is_some_and(|row| is_blank(row)) {
            rows.pop();
        }
        Ok(Table::new(rows))
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn update(&self, rows: Vec<Vec<Value>>) -> Result<()> {
        let mut grid = self.lock()?;
        if grid.len() < rows.len() {
            grid.resize(rows.len(), Vec::new());
        }
        for (i, row) in rows.into_iter().enumerate() {
            grid[i] = row;
        }
        Ok(())
    }

    async fn update_row(&self, row_number: usize, row: Vec<Value>) -> Result<()> {
        if row_number == 0 {
            return Err(LeaderboardError::StoreUnavailable(
                "sheet rows are numbered from 1".to_string(),
            ));
        }
        let mut grid = self.lock()?;
        if grid.len() < row_number {
            grid.resize(row_number, Vec::new());
        }
        grid[row_number - 1] = row;
        Ok(())
    }

    async fn append_row(&self, row: Vec<Value>) -> Result<()> {
        let mut grid = self.lock()?;
        while grid.last().is_some_and(|r| is_blank(r)) {
            grid.pop();
        }
        grid.push(row);
        Ok(())
    }
}
