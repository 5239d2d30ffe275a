//! Per-team season statistics.
//!
//! The expected-wins figures come from an all-play record: every week each
//! team's score is compared with the score of every other team that week, not
//! just the opponent it was scheduled against.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use clap::ValueEnum;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::schema::{MatchRow, TeamName, Week};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumString, IntoStaticStr)]
#[strum(ascii_case_insensitive)]
pub enum Column {
    W,
    T,
    L,
    Pct,
    Actual,
    Exp,
    Luck,
    Proj,
    #[strum(serialize = "PF")]
    PointsFor,
    #[strum(serialize = "PA")]
    PointsAgainst,
    Max,
    Min,
    Top1,
    Bot1,
    Top3,
    Bot3,
    Carpe,
}

impl Column {
    /// Columns shown for a multi-season rollup.
    pub const ROLLUP: [Column; 13] = [
        Column::W,
        Column::T,
        Column::L,
        Column::Pct,
        Column::Actual,
        Column::Exp,
        Column::Luck,
        Column::PointsFor,
        Column::PointsAgainst,
        Column::Top1,
        Column::Bot1,
        Column::Top3,
        Column::Bot3,
    ];

    pub fn all() -> Vec<Column> {
        Column::iter().collect()
    }

    pub fn header(self) -> &'static str {
        self.into()
    }

    pub fn is_count(self) -> bool {
        use Column::*;
        matches!(self, W | T | L | Top1 | Bot1 | Top3 | Bot3)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, ValueEnum)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Orders two optional values in `direction`; missing values always go last.
pub fn compare_values(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => direction.apply(OrderedFloat(a).cmp(&OrderedFloat(b))),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Clone, PartialEq, Debug, Default, Getters, CopyGetters)]
pub struct SummaryRow {
    #[getset(get = "pub")]
    team: TeamName,
    /// All-play wins.
    #[getset(get_copy = "pub")]
    w: u32,
    #[getset(get_copy = "pub")]
    t: u32,
    #[getset(get_copy = "pub")]
    l: u32,
    /// Weeks in which the team posted a score.
    #[getset(get_copy = "pub")]
    games: u32,
    #[getset(get_copy = "pub")]
    pct: f64,
    #[getset(get_copy = "pub")]
    actual: f64,
    #[getset(get_copy = "pub")]
    exp: f64,
    #[getset(get_copy = "pub")]
    luck: f64,
    #[getset(get_copy = "pub")]
    proj: f64,
    #[getset(get_copy = "pub")]
    points_for: f64,
    #[getset(get_copy = "pub")]
    points_against: f64,
    #[getset(get_copy = "pub")]
    max: Option<f64>,
    #[getset(get_copy = "pub")]
    min: Option<f64>,
    #[getset(get_copy = "pub")]
    top1: u32,
    #[getset(get_copy = "pub")]
    bot1: u32,
    #[getset(get_copy = "pub")]
    top3: u32,
    #[getset(get_copy = "pub")]
    bot3: u32,
    #[getset(get_copy = "pub")]
    carpe: Option<f64>,
}

impl SummaryRow {
    pub fn value(&self, column: Column) -> Option<f64> {
        use Column::*;
        Some(match column {
            W => self.w.into(),
            T => self.t.into(),
            L => self.l.into(),
            Pct => self.pct,
            Actual => self.actual,
            Exp => self.exp,
            Luck => self.luck,
            Proj => self.proj,
            PointsFor => self.points_for,
            PointsAgainst => self.points_against,
            Max => return self.max,
            Min => return self.min,
            Top1 => self.top1.into(),
            Bot1 => self.bot1.into(),
            Top3 => self.top3.into(),
            Bot3 => self.bot3.into(),
            Carpe => return self.carpe,
        })
    }

    /// All-play wins with ties counted as half.
    pub fn all_play_wins(&self) -> f64 {
        f64::from(self.w) + 0.5 * f64::from(self.t)
    }

    /// Fills in the columns derived from the tallies and sums.
    fn derive(&mut self, weeks_left: u32) {
        let total = self.w + self.t + self.l;
        self.pct = if total == 0 {
            0.0
        } else {
            self.all_play_wins() / f64::from(total)
        };
        self.exp = self.pct * f64::from(self.games);
        self.luck = self.actual - self.exp;
        self.proj = self.actual + self.pct * f64::from(weeks_left);
        self.carpe = self.carpe_ratio();
    }

    fn carpe_ratio(&self) -> Option<f64> {
        let weekly = self.all_play_wins() / f64::from(self.games);
        (self.games > 0 && weekly > 0.0).then(|| self.actual / weekly)
    }

    fn accumulate(&mut self, other: &SummaryRow) {
        self.w += other.w;
        self.t += other.t;
        self.l += other.l;
        self.games += other.games;
        self.actual += other.actual;
        self.exp += other.exp;
        self.luck += other.luck;
        self.proj += other.proj;
        self.points_for += other.points_for;
        self.points_against += other.points_against;
        self.max = max_option(self.max, other.max);
        self.min = min_option(self.min, other.min);
        self.top1 += other.top1;
        self.bot1 += other.bot1;
        self.top3 += other.top3;
        self.bot3 += other.bot3;
    }

    pub(crate) fn rename(&mut self, team: TeamName) {
        self.team = team;
    }
}

#[derive(Clone, Debug, Default)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<SummaryRow> {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, team: &TeamName) -> Option<&SummaryRow> {
        self.rows.iter().find(|row| row.team() == team)
    }

    /// Stable sort by `column`, breaking ties by team name.
    pub fn sort_by(&mut self, column: Column, direction: SortDirection) {
        self.rows.sort_by(|a, b| {
            compare_values(a.value(column), b.value(column), direction)
                .then_with(|| a.team.cmp(&b.team))
        });
    }

    /// Adds up several seasons team by team.
    ///
    /// Counts and sums are added (a team missing from a season contributes
    /// nothing), `Pct` is recomputed from the combined tallies.
    pub fn rollup<I: IntoIterator<Item = SummaryTable>>(tables: I) -> SummaryTable {
        let mut combined = BTreeMap::<TeamName, SummaryRow>::new();
        for table in tables {
            for row in table.rows {
                combined
                    .entry(row.team.clone())
                    .or_insert_with(|| SummaryRow {
                        team: row.team.clone(),
                        ..Default::default()
                    })
                    .accumulate(&row);
            }
        }
        let rows = combined
            .into_values()
            .map(|mut row| {
                let total = row.w + row.t + row.l;
                row.pct = if total == 0 {
                    0.0
                } else {
                    row.all_play_wins() / f64::from(total)
                };
                row.carpe = row.carpe_ratio();
                row
            })
            .collect();
        let mut table = SummaryTable { rows };
        table.sort_by(Column::Pct, SortDirection::Desc);
        table
    }
}

struct WeekStats {
    max: f64,
    third_highest: f64,
    third_lowest: f64,
    min: f64,
}

impl WeekStats {
    fn new(scores: &[f64]) -> Option<Self> {
        let sorted = scores
            .iter()
            .copied()
            .sorted_by_key(|&s| std::cmp::Reverse(OrderedFloat(s)))
            .collect_vec();
        let last = sorted.len().checked_sub(1)?;
        Some(Self {
            max: sorted[0],
            third_highest: sorted[last.min(2)],
            third_lowest: sorted[last.saturating_sub(2)],
            min: sorted[last],
        })
    }
}

/// Summarizes one season over `start..=end`, sorted by `Pct` descending.
///
/// `rows` must all belong to the same season; the season decides how many
/// regular-season weeks the projection runs to.
pub fn summarize(rows: &[MatchRow], start: Week, end: Week) -> SummaryTable {
    let in_range = rows
        .iter()
        .filter(|row| (start..=end).contains(&row.week()))
        .collect_vec();
    let Some(season) = in_range.first().map(|row| row.season()) else {
        return SummaryTable::default();
    };

    let teams: BTreeSet<&TeamName> = in_range.iter().map(|row| row.team()).collect();
    let mut acc: BTreeMap<&TeamName, SummaryRow> = teams
        .into_iter()
        .map(|team| {
            let row = SummaryRow {
                team: team.clone(),
                ..Default::default()
            };
            (team, row)
        })
        .collect();

    let by_week: BTreeMap<Week, Vec<&MatchRow>> = in_range
        .iter()
        .copied()
        .into_group_map_by(|row| row.week())
        .into_iter()
        .collect();

    for week_rows in by_week.values() {
        let scores = week_rows
            .iter()
            .filter_map(|row| Some((row.team(), row.score()?)))
            .collect_vec();
        let stats = WeekStats::new(&scores.iter().map(|&(_, s)| s).collect_vec());

        for row in week_rows {
            let Some(summary) = acc.get_mut(row.team()) else {
                continue;
            };
            summary.actual += row.wins();
            summary.points_against += row.opponent_score().unwrap_or(0.0);
            let (Some(score), Some(stats)) = (row.score(), stats.as_ref()) else {
                continue;
            };
            summary.games += 1;
            summary.points_for += score;
            summary.max = max_option(summary.max, Some(score));
            summary.min = min_option(summary.min, Some(score));
            for &(other, other_score) in &scores {
                if other == row.team() {
                    continue;
                }
                match score.total_cmp(&other_score) {
                    Ordering::Greater => summary.w += 1,
                    Ordering::Equal => summary.t += 1,
                    Ordering::Less => summary.l += 1,
                }
            }
            summary.top1 += u32::from(score >= stats.max);
            summary.top3 += u32::from(score >= stats.third_highest);
            summary.bot3 += u32::from(score <= stats.third_lowest);
            summary.bot1 += u32::from(score <= stats.min);
        }
    }

    let most_played = acc.values().map(|row| row.games).max().unwrap_or(0);
    let weeks_left = u32::from(season.regular_season_weeks().get()).saturating_sub(most_played);
    let rows = acc
        .into_values()
        .map(|mut row| {
            row.derive(weeks_left);
            row
        })
        .collect();
    let mut table = SummaryTable { rows };
    table.sort_by(Column::Pct, SortDirection::Desc);
    table
}

/// One summary per cutoff week, `start..=start`, `start..=start + 1`, up to `end`.
pub fn season_series(rows: &[MatchRow], start: Week, end: Week) -> Vec<SummaryTable> {
    Week::range_inclusive(start, end)
        .map(|cutoff| summarize(rows, start, cutoff))
        .collect()
}

fn max_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_option(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use scraper::Html;

    use super::{season_series, summarize, Column, SortDirection, SummaryTable};
    use crate::parser::schedule::{self, tests::schedule_html, tests::two_team_rows};
    use crate::schema::{MatchRow, Season, TeamName, Week};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Four teams, two weeks.
    ///
    /// Week 1: A 120 - B 100, C 90 - D 80.
    /// Week 2: A 70 - C 110, B 95 - D 95.
    fn four_team_rows() -> Vec<MatchRow> {
        let html = schedule_html(&[
            vec![("B", "100", "120", "A"), ("D", "80", "90", "C")],
            vec![("C", "110", "70", "A"), ("D", "95", "95", "B")],
        ]);
        schedule::parse(&Html::parse_document(&html), Season::from(2023)).unwrap()
    }

    #[test]
    fn test_two_team_end_to_end() {
        let table = summarize(&two_team_rows(), Week::from(1), Week::from(2));
        assert_eq!(table.rows().len(), 2);

        let alpha = table.get(&TeamName::from("Alpha Team")).unwrap();
        assert_eq!((alpha.w(), alpha.t(), alpha.l()), (1, 1, 0));
        assert!(approx(alpha.points_for(), 110.5 + 101.0));
        assert!(approx(alpha.points_against(), 98.25 + 101.0));
        assert!(approx(alpha.actual(), 1.5));

        let beta = table.get(&TeamName::from("Beta Team")).unwrap();
        assert_eq!((beta.w(), beta.t(), beta.l()), (0, 1, 1));
        assert!(approx(beta.points_for(), 98.25 + 101.0));
        assert!(approx(beta.points_against(), 110.5 + 101.0));

        // With two teams the all-play record is the actual record.
        for row in table.rows() {
            assert_eq!(row.w() + row.t() + row.l(), row.games());
            assert_eq!(row.games(), 2);
        }
        assert_eq!(table.rows()[0].team().as_str(), "Alpha Team");
    }

    #[test]
    fn test_four_team_columns() {
        let table = summarize(&four_team_rows(), Week::from(1), Week::from(2));
        let get = |team: &str| table.get(&TeamName::from(team)).unwrap().clone();

        // Scores: week 1 A120 B100 C90 D80, week 2 C110 B95 D95 A70.
        let a = get("A");
        assert_eq!((a.w(), a.t(), a.l()), (3, 0, 3));
        assert!(approx(a.pct(), 0.5));
        assert!(approx(a.actual(), 1.0));
        assert!(approx(a.exp(), 1.0));
        assert!(approx(a.luck(), 0.0));
        assert_eq!((a.top1(), a.bot1(), a.top3(), a.bot3()), (1, 1, 1, 1));
        assert_eq!((a.max(), a.min()), (Some(120.0), Some(70.0)));

        let b = get("B");
        assert_eq!((b.w(), b.t(), b.l()), (3, 1, 2));
        assert!(approx(b.pct(), 3.5 / 6.0));
        assert!(approx(b.actual(), 0.5));
        assert!(approx(b.luck(), 0.5 - 7.0 / 6.0));
        assert_eq!((b.top1(), b.bot1(), b.top3(), b.bot3()), (0, 0, 2, 2));

        let d = get("D");
        assert_eq!((d.w(), d.t(), d.l()), (1, 1, 4));
        assert_eq!((d.top1(), d.bot1()), (0, 1));

        for row in table.rows() {
            assert_eq!(row.w() + row.t() + row.l(), row.games() * 3);
            assert!((0.0..=1.0).contains(&row.pct()));
            assert!(approx(row.exp(), row.pct() * f64::from(row.games())));
            assert!(approx(row.luck(), row.actual() - row.exp()));
            // 2023 has 14 regular-season weeks, two played.
            assert!(approx(row.proj(), row.actual() + row.pct() * 12.0));
        }

        // Carpe: actual wins over weekly all-play wins.
        assert!(approx(b.carpe().unwrap(), 0.5 / (3.5 / 2.0)));

        let order: Vec<_> = table.rows().iter().map(|r| r.team().as_str()).collect();
        assert_eq!(order, ["C", "B", "A", "D"]);
    }

    #[test]
    fn test_week_range_filter() {
        let table = summarize(&four_team_rows(), Week::from(2), Week::from(2));
        let a = table.get(&TeamName::from("A")).unwrap();
        assert_eq!((a.w(), a.t(), a.l()), (0, 0, 3));
        assert_eq!(a.games(), 1);
        assert_eq!(a.carpe(), None);
        assert!(summarize(&four_team_rows(), Week::from(5), Week::from(6)).is_empty());
    }

    #[test]
    fn test_sort_is_total_with_name_tiebreak() {
        let html = schedule_html(&[vec![("Zed", "90", "90", "Amy"), ("Kim", "90", "90", "Bob")]]);
        let rows = schedule::parse(&Html::parse_document(&html), Season::from(2020)).unwrap();
        let mut table = summarize(&rows, Week::from(1), Week::from(1));
        let names = |t: &SummaryTable| -> Vec<String> {
            t.rows().iter().map(|r| r.team().to_string()).collect()
        };
        assert_eq!(names(&table), ["Amy", "Bob", "Kim", "Zed"]);
        table.sort_by(Column::Pct, SortDirection::Asc);
        assert_eq!(names(&table), ["Amy", "Bob", "Kim", "Zed"]);
        table.sort_by(Column::Carpe, SortDirection::Desc);
        assert_eq!(names(&table), ["Amy", "Bob", "Kim", "Zed"]);
    }

    #[test]
    fn test_rollup() {
        let first = summarize(&four_team_rows(), Week::from(1), Week::from(2));
        let second = summarize(&four_team_rows(), Week::from(1), Week::from(1));
        let rolled = SummaryTable::rollup([first.clone(), second.clone()]);
        let team = TeamName::from("A");
        let (a1, a2, a) = (
            first.get(&team).unwrap(),
            second.get(&team).unwrap(),
            rolled.get(&team).unwrap(),
        );
        assert_eq!(a.w(), a1.w() + a2.w());
        assert_eq!(a.l(), a1.l() + a2.l());
        assert!(approx(a.points_for(), a1.points_for() + a2.points_for()));
        assert!(approx(a.exp(), a1.exp() + a2.exp()));
        let total = f64::from(a.w() + a.t() + a.l());
        assert!(approx(a.pct(), (f64::from(a.w()) + 0.5 * f64::from(a.t())) / total));
    }

    #[test]
    fn test_season_series() {
        let series = season_series(&four_team_rows(), Week::from(1), Week::from(2));
        assert_eq!(series.len(), 2);
        let a = TeamName::from("A");
        assert_eq!(series[0].get(&a).unwrap().games(), 1);
        assert_eq!(series[1].get(&a).unwrap().games(), 2);
    }

    #[test]
    fn test_column_names() {
        assert_eq!(Column::PointsFor.header(), "PF");
        assert_eq!(Column::from_str("pct").unwrap(), Column::Pct);
        assert_eq!(Column::from_str("pa").unwrap(), Column::PointsAgainst);
        assert_eq!(Column::all().len(), 17);
    }
}
