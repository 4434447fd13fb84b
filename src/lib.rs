/*!
# Sheet Leaderboard

A small web application that collects per-question scores from participants
and keeps a shared leaderboard in a spreadsheet.

## Overview

A participant picks a nickname, then enters an integer score for each of the
configured questions (15 or 16 in practice). Every edit saves the whole row,
keyed by nickname, to one worksheet of a remote spreadsheet. All participants
see the same leaderboard: a bar chart of totals and a ranked table with the
top three highlighted, recomputed on a fixed interval.

## Architecture

### Storage Layer
- **Table Store** (`store`) - trait over a worksheet: read all, clear, write,
  write one row, append one row; plus an in-memory implementation
- **Google Sheets** (`sheets`) - the same trait on the Sheets v4 REST API
- **Credentials** (`credentials`) - service account key lookup and token
  exchange

### Domain Layer
- **Records** (`record`) - sheet rows, score records and snapshots
- **Repository** (`repository`) - load, lookup and upsert by nickname
- **Sessions** (`session`) - a participant's score vector and the registry
  that owns it
- **Ranking** (`ranking`) - stable descending sort and podium styling
- **Board** (`board`) - periodically refreshed ranking

### Web Layer
- **Views** (`view`) - page and leaderboard table templates
- **Chart** (`chart`) - SVG bar chart of totals
- **App** (`app`) - routing and handlers

## Sheet Layout

Row 1 holds the header `name, total, q1 .. qN`; every following row is one
participant. `total` is recomputed from the question columns on every save.

## REST API Endpoints

- `POST /api/session` - identify with a nickname, loading saved scores
- `GET /api/session` / `DELETE /api/session` - current session, leave
- `POST /api/score` - set one score and save the row
- `GET /api/leaderboard` - ranked rows as JSON
- `GET /leaderboard/table`, `GET /leaderboard/chart.svg` - rendered leaderboard

## Consistency

Two participants saving at the same moment are not coordinated. With the
`full-rewrite` upsert strategy one of the two rows can be lost; the default
`row-update` strategy only touches the participant's own row.
*/

pub mod config;
pub mod error;
pub mod ranking;
pub mod record;
pub mod repository;
pub mod session;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod board;
#[cfg(feature = "web")]
pub mod chart;
#[cfg(feature = "web")]
pub mod credentials;
#[cfg(feature = "web")]
pub mod sheets;
#[cfg(feature = "web")]
pub mod view;

/// Re-export the core types to make them easier to use
pub use config::AppConfig;
pub use error::{LeaderboardError, Result};
pub use ranking::{Medal, RankedRow, rank};
pub use record::{LeaderboardSnapshot, Record, ScoreRecord};
pub use repository::{LeaderboardRepository, Lookup, UpsertStrategy};
pub use session::{ScoreSession, SessionRegistry};
pub use store::{MemoryTableStore, Table, TableStore};
