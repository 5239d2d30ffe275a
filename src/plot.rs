use std::{io::BufWriter, ops::Range, path::Path, path::PathBuf};

use anyhow::Context;
use fs_err::File;
use getset::Getters;
use itertools::Itertools;
use log::info;
use ordered_float::OrderedFloat;
use svg::{
    node::element::{Line, Polyline, Rectangle, Text},
    Document,
};

use crate::names::DisplayNames;
use crate::schema::{MatchRow, Season, Week};
use crate::summary::{season_series, SummaryRow, SummaryTable};

#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct Series {
    label: String,
    /// `(week, value)` pairs in week order.
    points: Vec<(f64, f64)>,
}

impl Series {
    fn last_value(&self) -> Option<f64> {
        self.points.last().map(|&(_, y)| y)
    }
}

#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct Chart {
    name: &'static str,
    title: String,
    /// Sorted by the final value, highest first.
    series: Vec<Series>,
}

type Metric = fn(&SummaryRow) -> f64;

const METRICS: [(&str, Metric); 5] = [
    ("Expected Wins", SummaryRow::exp),
    ("Wins", SummaryRow::actual),
    ("Expected Win%", SummaryRow::pct),
    ("Points Per Game", points_per_game),
    ("PF", SummaryRow::points_for),
];

fn points_per_game(row: &SummaryRow) -> f64 {
    if row.games() == 0 {
        0.0
    } else {
        row.points_for() / f64::from(row.games())
    }
}

/// One chart per metric, tracking each team across the cutoff weeks of
/// `summaries` (the first summary ends at `start`, the next one week later).
pub fn season_charts(
    summaries: &[SummaryTable],
    start: Week,
    season: Season,
    names: &DisplayNames,
) -> Vec<Chart> {
    let teams = summaries
        .iter()
        .flat_map(|table| table.rows().iter().map(|row| row.team()))
        .unique()
        .sorted()
        .collect_vec();
    METRICS
        .iter()
        .map(|&(name, metric)| {
            let series = teams
                .iter()
                .map(|team| Series {
                    label: names.display(team).to_string(),
                    points: summaries
                        .iter()
                        .enumerate()
                        .filter_map(|(i, table)| {
                            let week = f64::from(start.get()) + i as f64;
                            Some((week, metric(table.get(team)?)))
                        })
                        .collect(),
                })
                .sorted_by_key(|s| std::cmp::Reverse(s.last_value().map(OrderedFloat)))
                .collect();
            Chart {
                name,
                title: format!("{name} Over {season} Season"),
                series,
            }
        })
        .collect()
}

/// Draws a line chart with a legend to the right of the plot area.
pub fn render(chart: &Chart) -> Document {
    let (w, h) = (960.0, 540.0);
    let margin = 50.0;
    let legend_width = 220.0;
    let mut document = Document::new()
        .set("viewBox", (0, 0, w, h))
        .set("font-family", "sans-serif");

    let points = chart.series.iter().flat_map(|s| &s.points).collect_vec();
    let (x_min, x_max) = bounds(points.iter().map(|&&(x, _)| x));
    let (y_min, y_max) = bounds(points.iter().map(|&&(_, y)| y));
    let x_range = margin..w - margin - legend_width;
    let y_range = h - margin..margin;
    let x = |v: f64| map_float(v, x_min..x_max, x_range.clone());
    let y = |v: f64| map_float(v, y_min..y_max, y_range.clone());

    document = document
        .add(
            Rectangle::new()
                .set("x", x_range.start)
                .set("y", y_range.end)
                .set("width", x_range.end - x_range.start)
                .set("height", y_range.start - y_range.end)
                .set("stroke", "black")
                .set("fill", "none"),
        )
        .add(
            Text::new(chart.title.as_str())
                .set("x", w / 2.0)
                .set("y", margin / 2.0)
                .set("text-anchor", "middle")
                .set("font-size", 18),
        )
        .add(
            Text::new("Week")
                .set("x", (x_range.start + x_range.end) / 2.0)
                .set("y", h - 10.0)
                .set("text-anchor", "middle")
                .set("font-size", 12),
        );

    for week in (x_min.ceil() as i64)..=(x_max.floor() as i64) {
        let xv = x(week as f64);
        document = document
            .add(
                Line::new()
                    .set("x1", xv)
                    .set("x2", xv)
                    .set("y1", y_range.start)
                    .set("y2", y_range.end)
                    .set("stroke", "#ddd")
                    .set("stroke-width", 0.5),
            )
            .add(
                Text::new(week.to_string())
                    .set("x", xv)
                    .set("y", y_range.start + 15.0)
                    .set("text-anchor", "middle")
                    .set("font-size", 10),
            );
    }
    for value in [y_min, y_max] {
        document = document.add(
            Text::new(format!("{value:.1}"))
                .set("x", x_range.start - 5.0)
                .set("y", y(value))
                .set("text-anchor", "end")
                .set("font-size", 10),
        );
    }

    let count = chart.series.len().max(1);
    for (i, series) in chart.series.iter().enumerate() {
        let color = format!("hsl({:.0}, 65%, 45%)", 360.0 * i as f64 / count as f64);
        let path = series
            .points
            .iter()
            .map(|&(px, py)| format!("{:.2},{:.2}", x(px), y(py)))
            .join(" ");
        let legend_y = margin + 18.0 * i as f64;
        document = document
            .add(
                Polyline::new()
                    .set("points", path)
                    .set("fill", "none")
                    .set("stroke", color.as_str())
                    .set("stroke-width", 2),
            )
            .add(
                Line::new()
                    .set("x1", x_range.end + 15.0)
                    .set("x2", x_range.end + 35.0)
                    .set("y1", legend_y)
                    .set("y2", legend_y)
                    .set("stroke", color.as_str())
                    .set("stroke-width", 3),
            )
            .add(
                Text::new(series.label.as_str())
                    .set("x", x_range.end + 40.0)
                    .set("y", legend_y + 4.0)
                    .set("font-size", 11),
            );
    }

    document
}

/// Writes `plot_<name>.svg` for every chart of the season into `out_dir`.
pub fn plot_season_graphs(
    rows: &[MatchRow],
    start: Week,
    end: Week,
    out_dir: &Path,
    names: &DisplayNames,
) -> anyhow::Result<Vec<PathBuf>> {
    let Some(season) = rows.first().map(|row| row.season()) else {
        return Ok(vec![]);
    };
    fs_err::create_dir_all(out_dir)?;
    let series = season_series(rows, start, end);
    let mut written = vec![];
    for chart in season_charts(&series, start, season, names) {
        let path = out_dir.join(format!("plot_{}.svg", chart.name));
        svg::write(BufWriter::new(File::create(&path)?), &render(&chart))
            .with_context(|| format!("While writing {path:?}"))?;
        written.push(path);
    }
    info!("Wrote {} plots to {out_dir:?}", written.len());
    Ok(written)
}

/// Widens a degenerate range so that mapping onto it stays finite.
fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() {
        (0.0, 1.0)
    } else if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

fn map_float(a: f64, src: Range<f64>, dst: Range<f64>) -> f64 {
    dst.start + (dst.end - dst.start) * (a - src.start) / (src.end - src.start)
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::{bounds, plot_season_graphs, season_charts};
    use crate::names::{canonicalize, TeamAliases};
    use crate::parser::schedule::{self, tests::schedule_html};
    use crate::schema::{Season, Week};
    use crate::summary::season_series;

    fn rows() -> Vec<crate::schema::MatchRow> {
        let html = schedule_html(&[
            vec![("A", "100", "120", "B")],
            vec![("A", "130", "90", "B")],
            vec![("A", "110", "80", "B")],
        ]);
        schedule::parse(&Html::parse_document(&html), Season::from(2021)).unwrap()
    }

    #[test]
    fn test_charts_order_legend_by_final_value() {
        let mut rows = rows();
        let names = canonicalize(&mut rows, &TeamAliases::default());
        let series = season_series(&rows, Week::from(1), Week::from(3));
        let charts = season_charts(&series, Week::from(1), Season::from(2021), &names);
        let titles: Vec<_> = charts.iter().map(|c| *c.name()).collect();
        assert_eq!(
            titles,
            ["Expected Wins", "Wins", "Expected Win%", "Points Per Game", "PF"]
        );

        let wins = &charts[1];
        assert_eq!(wins.title(), "Wins Over 2021 Season");
        let labels: Vec<_> = wins.series().iter().map(|s| s.label().as_str()).collect();
        assert_eq!(labels, ["A", "B"]);
        assert_eq!(wins.series()[0].points(), &[(1.0, 0.0), (2.0, 1.0), (3.0, 2.0)]);

        let pf = &charts[4];
        assert_eq!(pf.series()[0].label(), "A");
        assert_eq!(pf.series()[0].points()[2], (3.0, 340.0));
    }

    #[test]
    fn test_plot_files_are_written() {
        let mut rows = rows();
        let names = canonicalize(&mut rows, &TeamAliases::default());
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plots");
        let written = plot_season_graphs(&rows, Week::from(1), Week::from(3), &out, &names).unwrap();
        assert_eq!(written.len(), 5);
        assert!(out.join("plot_Expected Win%.svg").is_file());
        let content = fs_err::read_to_string(out.join("plot_PF.svg")).unwrap();
        assert!(content.contains("<polyline"));
        assert!(content.contains("PF Over 2021 Season"));
    }

    #[test]
    fn test_bounds() {
        assert_eq!(bounds([3.0, 1.0, 2.0].into_iter()), (1.0, 3.0));
        assert_eq!(bounds([2.0].into_iter()), (1.5, 2.5));
        assert_eq!(bounds(std::iter::empty()), (0.0, 1.0));
    }
}
