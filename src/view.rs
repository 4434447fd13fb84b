use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

use crate::error::{LeaderboardError, Result};
use crate::ranking::{Medal, RankedRow};

const TABLE_TEMPLATE: &str = include_str!("./static/leaderboard.hbs");
const PAGE_TEMPLATE: &str = include_str!("./static/index.html");

/// Settings the page script needs, injected into the HTML head.
#[derive(Debug, Clone, Serialize)]
pub struct PageSettings {
    pub question_count: usize,
    pub refresh_interval_ms: u64,
}

#[derive(Serialize)]
struct TableRow<'a> {
    rank: usize,
    name: &'a str,
    total: i64,
    class: &'static str,
    style: &'static str,
    show_rank: bool,
}

/// Templates used by the web handlers.
pub struct Views {
    registry: Handlebars<'static>,
    show_rank_column: bool,
}

impl Views {
    /// # Errors
    /// * `Render` if a bundled template does not compile
    pub fn new(show_rank_column: bool) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry
            .register_template_string("leaderboard", TABLE_TEMPLATE)
            .map_err(|e| LeaderboardError::Render(e.to_string()))?;
        Ok(Views {
            registry,
            show_rank_column,
        })
    }

    /// Ranked table, top three highlighted, or a "no data yet" note when
    /// `rows` is empty. Names are HTML-escaped.
    ///
    /// # Errors
    /// * `Render` if the template fails
    pub fn leaderboard_table(&self, rows: &[RankedRow]) -> Result<String> {
        let rows: Vec<TableRow> = rows
            .iter()
            .map(|row| {
                let medal = Medal::for_rank(row.rank);
                TableRow {
                    rank: row.rank,
                    name: &row.name,
                    total: row.total,
                    class: medal.map(Medal::class_name).unwrap_or(""),
                    style: medal.map(Medal::row_style).unwrap_or(""),
                    show_rank: self.show_rank_column,
                }
            })
            .collect();
        self.registry
            .render(
                "leaderboard",
                &json!({ "rows": rows, "show_rank": self.show_rank_column }),
            )
            .map_err(|e| LeaderboardError::Render(e.to_string()))
    }

    /// The single page with its settings inlined before `</head>`.
    ///
    /// # Errors
    /// * `Render` if the settings cannot be serialised
    pub fn page(&self, settings: &PageSettings) -> Result<String> {
        let settings_json =
            serde_json::to_string(settings).map_err(|e| LeaderboardError::Render(e.to_string()))?;
        Ok(PAGE_TEMPLATE.replace(
            "</head>",
            &format!(
                "    <script>const BOARD_SETTINGS = {};</script>\n</head>",
                settings_json
            ),
        ))
    }
}
