use std::collections::BTreeMap;

use getset::{CopyGetters, Getters};
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::schema::{MatchRow, Outcome, TeamName, Week};
use crate::summary::summarize;

/// Ranks scores from highest to lowest, 1-based.
///
/// Equal scores share the mean of the positions they occupy; missing scores
/// are not ranked and do not take up a position.
pub fn average_ranks(scores: &[Option<f64>]) -> Vec<Option<f64>> {
    let order = scores
        .iter()
        .enumerate()
        .filter_map(|(i, score)| Some((i, (*score)?)))
        .sorted_by_key(|&(_, score)| std::cmp::Reverse(OrderedFloat(score)))
        .collect_vec();
    let mut ranks = vec![None; scores.len()];
    let mut position = 0;
    for (_, group) in &order.iter().chunk_by(|(_, score)| OrderedFloat(*score)) {
        let members = group.collect_vec();
        let first = position + 1;
        position += members.len();
        let rank = (first + position) as f64 / 2.0;
        for &(index, _) in members {
            ranks[index] = Some(rank);
        }
    }
    ranks
}

/// A match row annotated with how both sides ranked among that week's scores.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct RankedRow {
    #[getset(get = "pub")]
    row: MatchRow,
    #[getset(get_copy = "pub")]
    rank: Option<f64>,
    #[getset(get_copy = "pub")]
    opponent_rank: Option<f64>,
}

/// Annotates every row in `start..=end` with its weekly score rank.
///
/// The opponent rank is the rank of the opponent score among all opponent
/// scores of that week, which equals the opponent's own score rank.
pub fn rank_week_rows(rows: &[MatchRow], start: Week, end: Week) -> Vec<RankedRow> {
    let by_week = rows
        .iter()
        .filter(|row| (start..=end).contains(&row.week()))
        .into_group_map_by(|row| row.week());
    by_week
        .into_iter()
        .sorted_by_key(|(week, _)| *week)
        .flat_map(|(_, week_rows)| {
            let ranks = average_ranks(&week_rows.iter().map(|r| r.score()).collect_vec());
            let opponent_ranks =
                average_ranks(&week_rows.iter().map(|r| r.opponent_score()).collect_vec());
            week_rows
                .into_iter()
                .zip(ranks.into_iter().zip(opponent_ranks))
                .map(|(row, (rank, opponent_rank))| RankedRow {
                    row: row.clone(),
                    rank,
                    opponent_rank,
                })
                .collect_vec()
        })
        .collect()
}

/// Weekly results per team, in week order.
pub fn week_results(rows: &[MatchRow], start: Week, end: Week) -> BTreeMap<TeamName, Vec<Outcome>> {
    let mut results = BTreeMap::<TeamName, Vec<(Week, Outcome)>>::new();
    for row in rows.iter().filter(|row| (start..=end).contains(&row.week())) {
        results
            .entry(row.team().clone())
            .or_default()
            .push((row.week(), row.outcome()));
    }
    results
        .into_iter()
        .map(|(team, mut outcomes)| {
            outcomes.sort_by_key(|(week, _)| *week);
            (team, outcomes.into_iter().map(|(_, o)| o).collect())
        })
        .collect()
}

/// Average expected win percentage (over `start..=end`) of the opponents each
/// team still has to face after `end`.
///
/// Teams without remaining games are left out; opponents without a record in
/// the window count as 0.
pub fn remaining_schedule(rows: &[MatchRow], start: Week, end: Week) -> BTreeMap<TeamName, f64> {
    let summary = summarize(rows, start, end);
    let pct = |team: &TeamName| summary.get(team).map_or(0.0, |row| row.pct());
    rows.iter()
        .filter(|row| row.week() > end)
        .into_group_map_by(|row| row.team().clone())
        .into_iter()
        .map(|(team, remaining)| {
            let total: f64 = remaining.iter().map(|row| pct(row.opponent())).sum();
            (team, total / remaining.len() as f64)
        })
        .collect()
}
