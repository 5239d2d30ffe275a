//! Week-by-week story of one owner's teams.

use std::collections::BTreeSet;

use getset::{CopyGetters, Getters};
use itertools::Itertools;
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::ranks::rank_week_rows;
use crate::schema::{MatchRow, Outcome, TeamName, Week};

#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct SpotlightEntry {
    #[getset(get_copy = "pub")]
    week: Week,
    #[getset(get_copy = "pub")]
    total_wins: u32,
    #[getset(get_copy = "pub")]
    total_losses: u32,
    #[getset(get = "pub")]
    team: TeamName,
    #[getset(get_copy = "pub")]
    outcome: Outcome,
    #[getset(get = "pub")]
    opponent: TeamName,
    #[getset(get_copy = "pub")]
    score: Option<f64>,
    #[getset(get_copy = "pub")]
    opponent_score: Option<f64>,
    #[getset(get_copy = "pub")]
    rank: Option<f64>,
    #[getset(get_copy = "pub")]
    opponent_rank: Option<f64>,
}

/// Which side of the week's scoreboard a flag looks at.
#[derive(Clone, Copy)]
enum Basis {
    /// Own rank at or past the threshold, i.e. a low score.
    RankAtLeast,
    /// Own rank at or before the threshold, i.e. a high score.
    RankAtMost,
    OpponentRankAtLeast,
    OpponentRankAtMost,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, IntoStaticStr)]
pub enum WinFlag {
    /// Won with a bottom-half score.
    Lucky,
    VLucky,
    Lotto,
    /// Beat a top-half opponent.
    KeyWin,
    BuiltDiff,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, IntoStaticStr)]
pub enum LossFlag {
    /// Lost to a bottom-half opponent.
    MissedOpp,
    Beefed,
    /// Lost with a top-half score.
    Unlucky,
    VUnlucky,
    Snakebit,
}

trait Flag: Copy + IntoEnumIterator {
    fn rule(self) -> (Basis, f64);

    /// The rank cutoff is a fraction of `teams + 1`, so the middle of the
    /// table is `0.5`.
    fn applies(self, entry: &SpotlightEntry, teams: usize) -> bool {
        let (basis, fraction) = self.rule();
        let threshold = fraction * (teams + 1) as f64;
        match basis {
            Basis::RankAtLeast => entry.rank.is_some_and(|r| r >= threshold),
            Basis::RankAtMost => entry.rank.is_some_and(|r| r <= threshold),
            Basis::OpponentRankAtLeast => entry.opponent_rank.is_some_and(|r| r >= threshold),
            Basis::OpponentRankAtMost => entry.opponent_rank.is_some_and(|r| r <= threshold),
        }
    }
}

impl Flag for WinFlag {
    fn rule(self) -> (Basis, f64) {
        use WinFlag::*;
        match self {
            Lucky => (Basis::RankAtLeast, 0.5),
            VLucky => (Basis::RankAtLeast, 0.65),
            Lotto => (Basis::RankAtLeast, 0.8),
            KeyWin => (Basis::OpponentRankAtMost, 0.5),
            BuiltDiff => (Basis::OpponentRankAtMost, 0.25),
        }
    }
}

impl Flag for LossFlag {
    fn rule(self) -> (Basis, f64) {
        use LossFlag::*;
        match self {
            MissedOpp => (Basis::OpponentRankAtLeast, 0.5),
            Beefed => (Basis::OpponentRankAtLeast, 0.7),
            Unlucky => (Basis::RankAtMost, 0.5),
            VUnlucky => (Basis::RankAtMost, 0.3),
            Snakebit => (Basis::RankAtMost, 0.2),
        }
    }
}

#[derive(Clone, Debug, Default, Getters)]
#[getset(get = "pub")]
pub struct Spotlight {
    /// Every week of the matched teams.
    results: Vec<SpotlightEntry>,
    wins: Vec<(SpotlightEntry, Vec<WinFlag>)>,
    losses: Vec<(SpotlightEntry, Vec<LossFlag>)>,
    ties: Vec<SpotlightEntry>,
}

fn flags<F: Flag>(entry: &SpotlightEntry, teams: usize) -> Vec<F> {
    F::iter().filter(|flag| flag.applies(entry, teams)).collect()
}

/// Builds the spotlight for every team whose name contains `owner`, ignoring
/// case, over `start..=end`.
pub fn team_spotlight(rows: &[MatchRow], owner: &str, start: Week, end: Week) -> Spotlight {
    let ranked = rank_week_rows(rows, start, end);
    let teams = ranked
        .iter()
        .map(|r| r.row().team())
        .collect::<BTreeSet<_>>()
        .len();

    let mut total_wins = 0;
    let mut total_losses = 0;
    let results = ranked
        .iter()
        .filter(|r| r.row().team().contains_ignore_case(owner))
        .sorted_by_key(|r| r.row().week())
        .map(|ranked| {
            let row = ranked.row();
            let outcome = row.outcome();
            total_wins += u32::from(outcome == Outcome::Win);
            total_losses += u32::from(outcome == Outcome::Loss);
            SpotlightEntry {
                week: row.week(),
                total_wins,
                total_losses,
                team: row.team().clone(),
                outcome,
                opponent: row.opponent().clone(),
                score: row.score(),
                opponent_score: row.opponent_score(),
                rank: ranked.rank(),
                opponent_rank: ranked.opponent_rank(),
            }
        })
        .collect_vec();

    let mut spotlight = Spotlight::default();
    for entry in &results {
        match entry.outcome {
            Outcome::Win => spotlight.wins.push((entry.clone(), flags(entry, teams))),
            Outcome::Loss => spotlight.losses.push((entry.clone(), flags(entry, teams))),
            Outcome::Tie => spotlight.ties.push(entry.clone()),
        }
    }
    spotlight.results = results;
    spotlight
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::{team_spotlight, LossFlag, WinFlag};
    use crate::parser::schedule::{self, tests::schedule_html};
    use crate::schema::{MatchRow, Season, Week};

    /// Six teams; "Sam" is the spotlighted owner.
    fn rows() -> Vec<MatchRow> {
        let html = schedule_html(&[
            // Sam wins with the 5th best score against the 6th.
            vec![
                ("Sam's Squad", "80", "70", "Opp One"),
                ("Opp Two", "120", "110", "Opp Three"),
                ("Opp Four", "100", "90", "Opp Five"),
            ],
            // Sam loses with the 2nd best score against the best.
            vec![
                ("Opp One", "130", "120", "Sam's Squad"),
                ("Opp Two", "60", "70", "Opp Three"),
                ("Opp Four", "80", "90", "Opp Five"),
            ],
            vec![
                ("Sam's Squad", "90", "90", "Opp Two"),
                ("Opp One", "100", "60", "Opp Three"),
                ("Opp Four", "80", "70", "Opp Five"),
            ],
            // Sam beats the 2nd best score with the best.
            vec![
                ("Sam's Squad", "150", "140", "Opp One"),
                ("Opp Two", "130", "120", "Opp Three"),
                ("Opp Four", "110", "100", "Opp Five"),
            ],
            // Sam loses with the worst score to the 5th.
            vec![
                ("Opp One", "60", "50", "Sam's Squad"),
                ("Opp Two", "100", "90", "Opp Three"),
                ("Opp Four", "80", "70", "Opp Five"),
            ],
        ]);
        schedule::parse(&Html::parse_document(&html), Season::from(2023)).unwrap()
    }

    /// Ten teams, so the outermost flags can fire.
    fn ten_team_rows() -> Vec<MatchRow> {
        let html = schedule_html(&[
            // Sam wins with the 9th best score against the 10th.
            vec![
                ("Sam's Squad", "20", "10", "T1"),
                ("T2", "100", "90", "T3"),
                ("T4", "80", "70", "T5"),
                ("T6", "60", "50", "T7"),
                ("T8", "40", "30", "T9"),
            ],
            // Sam has the best score; T1 and T2 share 2nd and 3rd.
            vec![
                ("Sam's Squad", "100", "90", "T1"),
                ("T2", "90", "80", "T3"),
                ("T4", "70", "60", "T5"),
                ("T6", "50", "40", "T7"),
                ("T8", "30", "20", "T9"),
            ],
            // Sam loses with the 2nd best score against the best.
            vec![
                ("T1", "100", "90", "Sam's Squad"),
                ("T2", "80", "70", "T3"),
                ("T4", "60", "50", "T5"),
                ("T6", "40", "30", "T7"),
                ("T8", "20", "10", "T9"),
            ],
        ]);
        schedule::parse(&Html::parse_document(&html), Season::from(2023)).unwrap()
    }

    #[test]
    fn test_results_are_cumulative() {
        let spotlight = team_spotlight(&rows(), "SAM", Week::from(1), Week::from(5));
        let records: Vec<_> = spotlight
            .results()
            .iter()
            .map(|e| (e.week().get(), e.total_wins(), e.total_losses()))
            .collect();
        assert_eq!(records, [(1, 1, 0), (2, 1, 1), (3, 1, 1), (4, 2, 1), (5, 2, 2)]);
        assert_eq!(spotlight.ties().len(), 1);
        assert_eq!(spotlight.ties()[0].opponent().as_str(), "Opp Two");
    }

    #[test]
    fn test_flags() {
        let spotlight = team_spotlight(&rows(), "sam", Week::from(1), Week::from(5));

        // 6 teams: thresholds are fractions of 7.
        let (win, win_flags) = &spotlight.wins()[0];
        assert_eq!(win.rank(), Some(5.0));
        assert_eq!(win.opponent_rank(), Some(6.0));
        assert_eq!(win_flags, &[WinFlag::Lucky, WinFlag::VLucky]);

        let (win, win_flags) = &spotlight.wins()[1];
        assert_eq!(win.week(), Week::from(4));
        assert_eq!((win.rank(), win.opponent_rank()), (Some(1.0), Some(2.0)));
        assert_eq!(win_flags, &[WinFlag::KeyWin]);

        let (loss, loss_flags) = &spotlight.losses()[0];
        assert_eq!(loss.rank(), Some(2.0));
        assert_eq!(loss.opponent_rank(), Some(1.0));
        assert_eq!(loss_flags, &[LossFlag::Unlucky, LossFlag::VUnlucky]);

        let (loss, loss_flags) = &spotlight.losses()[1];
        assert_eq!(loss.week(), Week::from(5));
        assert_eq!((loss.rank(), loss.opponent_rank()), (Some(6.0), Some(5.0)));
        assert_eq!(loss_flags, &[LossFlag::MissedOpp, LossFlag::Beefed]);
    }

    #[test]
    fn test_outermost_flags() {
        let spotlight = team_spotlight(&ten_team_rows(), "sam", Week::from(1), Week::from(3));

        // 10 teams: thresholds are fractions of 11.
        let (lotto, flags) = &spotlight.wins()[0];
        assert_eq!(lotto.rank(), Some(9.0));
        assert_eq!(flags, &[WinFlag::Lucky, WinFlag::VLucky, WinFlag::Lotto]);

        let (built, flags) = &spotlight.wins()[1];
        assert_eq!((built.rank(), built.opponent_rank()), (Some(1.0), Some(2.5)));
        assert_eq!(flags, &[WinFlag::KeyWin, WinFlag::BuiltDiff]);

        let (snakebit, flags) = &spotlight.losses()[0];
        assert_eq!((snakebit.rank(), snakebit.opponent_rank()), (Some(2.0), Some(1.0)));
        assert_eq!(
            flags,
            &[LossFlag::Unlucky, LossFlag::VUnlucky, LossFlag::Snakebit]
        );
    }

    #[test]
    fn test_no_match() {
        let spotlight = team_spotlight(&rows(), "nobody", Week::from(1), Week::from(5));
        assert!(spotlight.results().is_empty());
        assert!(spotlight.wins().is_empty());
    }
}
