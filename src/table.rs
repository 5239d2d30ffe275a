//! Text tables for the terminal.

use std::collections::BTreeMap;

use itertools::Itertools;
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Style},
    Table,
};

use crate::names::DisplayNames;
use crate::rankings::TeamSeason;
use crate::schema::TeamName;
use crate::spotlight::{Spotlight, SpotlightEntry};
use crate::summary::{Column, SummaryRow, SummaryTable};

/// Counts print as integers, everything else rounded to 3 decimals, and
/// undefined values as `-`.
pub fn format_value(column: Column, value: Option<f64>) -> String {
    match value {
        Some(v) if column.is_count() => format!("{v:.0}"),
        Some(v) => format_float(v),
        None => "-".to_owned(),
    }
}

fn format_float(v: f64) -> String {
    let rounded = format!("{v:.3}");
    // Avoid printing "-0.000".
    if rounded.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        rounded.trim_start_matches('-').to_owned()
    } else {
        rounded
    }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_owned(), |s| format!("{s:.2}"))
}

fn finish(builder: Builder, leading_text_columns: usize) -> Table {
    let mut table = builder.build();
    table
        .with(Style::psql())
        .modify(Columns::new(leading_text_columns..), Alignment::right());
    table
}

fn stat_cells<'a>(row: &'a SummaryRow, columns: &'a [Column]) -> impl Iterator<Item = String> + 'a {
    columns
        .iter()
        .map(|&column| format_value(column, row.value(column)))
}

fn headers(first: &[&str], columns: &[Column]) -> Vec<String> {
    first
        .iter()
        .copied()
        .chain(columns.iter().map(|c| c.header()))
        .map(String::from)
        .collect()
}

/// One line per team, labelled with the team's display name.
pub fn summary_table(table: &SummaryTable, columns: &[Column], names: &DisplayNames) -> Table {
    let mut builder = Builder::default();
    builder.push_record(headers(&["Team"], columns));
    for row in table.rows() {
        builder.push_record(
            std::iter::once(names.display(row.team()).to_string()).chain(stat_cells(row, columns)),
        );
    }
    finish(builder, 1)
}

/// Team seasons from possibly several leagues, in the given order.
pub fn team_season_table(
    entries: &[TeamSeason],
    columns: &[Column],
    names: &DisplayNames,
) -> Table {
    let mut builder = Builder::default();
    builder.push_record(headers(&["Season", "Team"], columns));
    for entry in entries {
        let row = entry.row();
        builder.push_record(
            [entry.season().to_string(), names.display(row.team()).to_string()]
                .into_iter()
                .chain(stat_cells(row, columns)),
        );
    }
    finish(builder, 2)
}

pub fn remaining_schedule_table(
    schedule: &BTreeMap<TeamName, f64>,
    names: &DisplayNames,
) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Team".to_owned(), "Remaining SOS".to_owned()]);
    for (team, sos) in schedule
        .iter()
        .sorted_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)))
    {
        builder.push_record([names.display(team).to_string(), format_float(*sos)]);
    }
    finish(builder, 1)
}

const ENTRY_HEADERS: [&str; 10] = [
    "Week", "W", "L", "Team", "Result", "Opponent", "Score", "Opp", "Rank", "OppRank",
];

fn entry_cells(entry: &SpotlightEntry) -> Vec<String> {
    vec![
        entry.week().to_string(),
        entry.total_wins().to_string(),
        entry.total_losses().to_string(),
        entry.team().to_string(),
        entry.outcome().to_string(),
        entry.opponent().to_string(),
        format_score(entry.score()),
        format_score(entry.opponent_score()),
        entry.rank().map_or_else(|| "-".to_owned(), |r| format!("{r:.1}")),
        entry
            .opponent_rank()
            .map_or_else(|| "-".to_owned(), |r| format!("{r:.1}")),
    ]
}

fn entries_table<'a, F: Copy + PartialEq + Into<&'static str> + 'a>(
    entries: impl Iterator<Item = (&'a SpotlightEntry, &'a [F])>,
    all_flags: &[F],
) -> Table {
    let mut builder = Builder::default();
    builder.push_record(
        ENTRY_HEADERS
            .iter()
            .copied()
            .chain(all_flags.iter().map(|&f| f.into()))
            .map(String::from),
    );
    for (entry, flags) in entries {
        let marks = all_flags
            .iter()
            .map(|flag| if flags.contains(flag) { "x" } else { "" }.to_owned());
        builder.push_record(entry_cells(entry).into_iter().chain(marks));
    }
    let mut table = builder.build();
    table.with(Style::psql());
    table
}

/// The sections of a spotlight report; ties only when there are any.
pub fn spotlight_tables(spotlight: &Spotlight) -> Vec<(&'static str, Table)> {
    use crate::spotlight::{LossFlag, WinFlag};
    use strum::IntoEnumIterator;

    let win_flags = WinFlag::iter().collect_vec();
    let loss_flags = LossFlag::iter().collect_vec();
    let unflagged: &[WinFlag] = &[];
    let mut sections = vec![
        (
            "Results",
            entries_table(spotlight.results().iter().map(|e| (e, unflagged)), unflagged),
        ),
        (
            "Wins",
            entries_table(
                spotlight.wins().iter().map(|(e, f)| (e, f.as_slice())),
                &win_flags,
            ),
        ),
        (
            "Losses",
            entries_table(
                spotlight.losses().iter().map(|(e, f)| (e, f.as_slice())),
                &loss_flags,
            ),
        ),
    ];
    if !spotlight.ties().is_empty() {
        sections.push((
            "Ties",
            entries_table(spotlight.ties().iter().map(|e| (e, unflagged)), unflagged),
        ));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::{format_value, summary_table};
    use crate::names::{canonicalize, TeamAliases};
    use crate::parser::schedule::tests::two_team_rows;
    use crate::schema::Week;
    use crate::summary::{summarize, Column};

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Column::W, Some(3.0)), "3");
        assert_eq!(format_value(Column::Pct, Some(2.0 / 3.0)), "0.667");
        assert_eq!(format_value(Column::Luck, Some(-0.0001)), "0.000");
        assert_eq!(format_value(Column::Carpe, None), "-");
    }

    #[test]
    fn test_summary_table_renders_display_names() {
        let mut rows = two_team_rows();
        let aliases = [("Alpha Team".into(), "Alpha".into())].into_iter().collect::<TeamAliases>();
        let names = canonicalize(&mut rows, &aliases);
        let summary = summarize(&rows, Week::from(1), Week::from(2));
        let rendered = summary_table(&summary, &Column::all(), &names).to_string();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert!(lines[0].contains("Team"));
        assert!(lines[0].contains("Carpe"));
        assert!(rendered.contains("Alpha Team"));
        assert!(rendered.contains("211.500"));
        // Header, separator, two teams.
        assert_eq!(lines.len(), 4);
    }
}
