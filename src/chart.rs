use plotters::prelude::*;

use crate::error::{LeaderboardError, Result};
use crate::ranking::RankedRow;

/// Size options for the leaderboard chart.
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Width of the chart in pixels
    pub width: u32,

    /// Height of one bar row in pixels
    pub row_height: u32,

    /// Label under the score axis
    pub x_label: String,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 800,
            row_height: 28,
            x_label: "Score".to_string(),
        }
    }
}

// Light and dark ends of the orange scale.
const LOW: (u8, u8, u8) = (0xfd, 0xd0, 0xa2);
const HIGH: (u8, u8, u8) = (0xd9, 0x48, 0x01);

/// Colour for a bar: darker orange for higher totals.
pub fn bar_color(total: i64, min: i64, max: i64) -> RGBColor {
    // f64 keeps the full i64 span representable
    let t = if max > min {
        ((total as f64 - min as f64) / (max as f64 - min as f64)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(LOW.0, HIGH.0), mix(LOW.1, HIGH.1), mix(LOW.2, HIGH.2))
}

/// Draws a horizontal bar chart of totals by name, rank 1 at the top.
///
/// # Returns
/// * `Ok(None)` for an empty leaderboard, so the caller can show a
///   placeholder instead
/// * `Ok(Some(svg))` otherwise
///
/// # Errors
/// * `Render` if plotting fails
pub fn render_svg(rows: &[RankedRow], options: &ChartOptions) -> Result<Option<String>> {
    if rows.is_empty() {
        return Ok(None);
    }
    let mut svg = String::new();
    draw_bars(rows, options, &mut svg).map_err(|e| LeaderboardError::Render(e.to_string()))?;
    Ok(Some(svg))
}

fn draw_bars(
    rows: &[RankedRow],
    options: &ChartOptions,
    out: &mut String,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let n = rows.len() as i32;
    let height = 60 + options.row_height * rows.len() as u32;

    let min_total = rows.iter().map(|r| r.total).min().unwrap_or(0);
    let max_total = rows.iter().map(|r| r.total).max().unwrap_or(0);
    let x_range = min_total.min(0) as f64..max_total.max(0) as f64 + 1.0;

    let longest = rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    let label_area = (longest as u32 * 8).clamp(40, 200);

    // y = 0 is the bottom of the chart, so rank 1 sits at n - 1
    let names: Vec<&str> = rows.iter().rev().map(|r| r.name.as_str()).collect();
    let label_for = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => names
            .get(*i as usize)
            .map(|name| name.to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };

    {
        let root = SVGBackend::with_string(out, (options.width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(label_area)
            .build_cartesian_2d(x_range, (0..n).into_segmented())?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(rows.len())
            .y_label_formatter(&label_for)
            .x_desc(options.x_label.as_str())
            .draw()?;

        chart.draw_series(rows.iter().enumerate().map(|(i, row)| {
            let y = n - 1 - i as i32;
            let color = bar_color(row.total, min_total, max_total);
            let mut bar = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(y)),
                    (row.total as f64, SegmentValue::Exact(y + 1)),
                ],
                color.filled(),
            );
            bar.set_margin(3, 3, 0, 0);
            bar
        }))?;

        root.present()?;
    }

    Ok(())
}
