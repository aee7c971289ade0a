// Chart rendering with plotters.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;

use poll_shift::{DropoutStats, PollingTable, SnapshotTable};

use crate::analysis::{event_label, AnalysisError, AnalysisResult};

const WINDOW_CHART_SIZE: (u32, u32) = (1400, 700);
const PANEL_SIZE: (u32, u32) = (1600, 1200);
// Fixed y scale of the window chart, matching the historical range of the
// field.
const WINDOW_Y_MAX: f64 = 60.0;

type DrawResult = Result<(), Box<dyn std::error::Error>>;

/// Renders the polling time series around a withdrawal, one line per
/// candidate, with a vertical marker on the withdrawal date.
pub fn render_window_chart(
    dir: &Path,
    label: &str,
    name: &str,
    withdrawal: NaiveDate,
    window: &PollingTable,
) -> AnalysisResult<()> {
    let path = dir.join(format!("{}_window.png", sanitize(name)));
    draw_window_chart(&path, label, withdrawal, window).map_err(|e| chart_error(&path, e))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Renders the before/after/difference bar panel for one withdrawal event.
pub fn render_event_panel(
    dir: &Path,
    stat: &DropoutStats,
    before: &SnapshotTable,
    after: &SnapshotTable,
) -> AnalysisResult<()> {
    let path = dir.join(format!("{}_panel.png", sanitize(&stat.name)));
    draw_event_panel(&path, stat, before, after).map_err(|e| chart_error(&path, e))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn chart_error(path: &Path, e: Box<dyn std::error::Error>) -> AnalysisError {
    AnalysisError::ChartRender {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn draw_window_chart(
    path: &Path,
    label: &str,
    withdrawal: NaiveDate,
    window: &PollingTable,
) -> DrawResult {
    let (first, last) = match (window.dates().first(), window.dates().last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return Err("empty polling window".into()),
    };
    // Guard against a single-poll window producing a degenerate range.
    let hi = if last > first {
        last
    } else {
        first + Duration::days(1)
    };

    let root = BitMapBackend::new(path, WINDOW_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Candidate Polling a Week Before/After {} Dropped", label),
            ("sans-serif", 30),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(first..hi, 0.0..WINDOW_Y_MAX)?;
    chart
        .configure_mesh()
        .x_desc("Date of Poll")
        .y_desc("Polling Percentage")
        .draw()?;

    for (idx, cname) in window.columns().iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let points: Vec<(NaiveDate, f64)> = window
            .dates()
            .iter()
            .enumerate()
            .filter_map(|(r, d)| window.row(r)[idx].map(|v| (*d, v)))
            .collect();
        if points.is_empty() {
            continue;
        }
        chart
            .draw_series(LineSeries::new(points, color))?
            .label(cname.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart.draw_series(LineSeries::new(
        vec![(withdrawal, 0.0), (withdrawal, WINDOW_Y_MAX)],
        BLACK.stroke_width(2),
    ))?;

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()?;
    root.present()?;
    Ok(())
}

fn draw_event_panel(
    path: &Path,
    stat: &DropoutStats,
    before: &SnapshotTable,
    after: &SnapshotTable,
) -> DrawResult {
    let ev = before.event_index(&stat.name)?;
    let b = before.row(ev);
    let a = after.row(ev);
    let label = event_label(stat);

    let root = BitMapBackend::new(path, PANEL_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    // Before and after side by side on the top third, the difference chart
    // across the bottom.
    let (upper, lower) = root.split_vertically(PANEL_SIZE.1 / 3);
    let (upper_left, upper_right) = upper.split_horizontally(PANEL_SIZE.0 / 2);

    draw_bar_chart(
        &upper_left,
        &format!("Average Polling Before {} Suspended Campaign", label),
        &active_bars(before.columns(), b, &stat.excluded),
        None,
    )?;
    draw_bar_chart(
        &upper_right,
        &format!("Average Polling After {} Suspended Campaign", label),
        &active_bars(after.columns(), a, &stat.excluded),
        None,
    )?;

    // The dropout and any excluded co-candidate hold a zeroed diff and stay
    // out of the difference chart.
    let diff_bars: Vec<(String, f64)> = stat
        .diffs
        .iter()
        .filter(|(_, v)| *v != 0.0)
        .cloned()
        .collect();
    let shares: Vec<f64> = diff_bars
        .iter()
        .map(|(n, _)| {
            stat.positive_shares
                .iter()
                .find(|(pn, _)| pn == n)
                .map(|(_, s)| *s)
                .unwrap_or(0.0)
        })
        .collect();
    draw_bar_chart(
        &lower,
        &format!("Polling Difference After {} Suspended Campaign", label),
        &diff_bars,
        Some(&shares),
    )?;
    root.present()?;
    Ok(())
}

fn active_bars(columns: &[String], values: &[f64], excluded: &[String]) -> Vec<(String, f64)> {
    columns
        .iter()
        .zip(values.iter())
        .filter(|(n, v)| **v != 0.0 && !excluded.contains(n))
        .map(|(n, v)| (n.clone(), *v))
        .collect()
}

fn draw_bar_chart(
    area: &DrawingArea<BitMapBackend, Shift>,
    title: &str,
    bars: &[(String, f64)],
    share_labels: Option<&[f64]>,
) -> DrawResult {
    if bars.is_empty() {
        return Ok(());
    }
    let y_lo = bars.iter().map(|(_, v)| *v).fold(0.0f64, f64::min) - 1.0;
    let y_hi = bars.iter().map(|(_, v)| *v).fold(0.0f64, f64::max) + 2.0;
    // Shrink the tick labels when the field is crowded.
    let tick_font = if bars.len() > 9 { 14 } else { 18 };

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0..bars.len()).into_segmented(), y_lo..y_hi)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                bars.get(*i).map(|(n, _)| n.clone()).unwrap_or_default()
            }
            _ => String::new(),
        })
        .x_label_style(("sans-serif", tick_font))
        .x_desc("Candidates")
        .y_desc("Polling")
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, v))| {
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(i), 0.0),
                (SegmentValue::Exact(i + 1), *v),
            ],
            Palette99::pick(i).filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;

    if let Some(shares) = share_labels {
        chart.draw_series(
            bars.iter()
                .enumerate()
                .zip(shares.iter())
                .filter(|(_, s)| **s > 0.0)
                .map(|((i, (_, v)), s)| {
                    Text::new(
                        format!("{:.1}%", s * 100.0),
                        (SegmentValue::CenterOf(i), v.max(0.0) + 0.25),
                        ("sans-serif", 18),
                    )
                }),
        )?;
    }
    Ok(())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
