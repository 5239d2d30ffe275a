use std::cmp::Reverse;

use derive_more::{AsRef, Display, From, FromStr, Into};
use getset::{CopyGetters, Getters};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Display,
    From,
    Into,
    FromStr,
    Serialize,
    Deserialize,
)]
pub struct Season(u16);
impl Season {
    pub fn get(self) -> u16 {
        self.0
    }

    /// Number of regular-season weeks; leagues switched from 13 to 14 weeks in 2021.
    pub fn regular_season_weeks(self) -> Week {
        Week(if self.0 > 2020 { 14 } else { 13 })
    }
}

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Display,
    From,
    Into,
    FromStr,
    Serialize,
    Deserialize,
)]
pub struct Week(u8);
impl Week {
    pub fn get(self) -> u8 {
        self.0
    }

    pub fn range_inclusive(start: Week, end: Week) -> impl DoubleEndedIterator<Item = Week> {
        (start.0..=end.0).map(Week)
    }
}

#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Default,
    Display,
    From,
    AsRef,
    Serialize,
    Deserialize,
)]
#[as_ref(forward)]
pub struct TeamName(String);
impl From<&str> for TeamName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
impl TeamName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        self.0.to_lowercase().contains(&needle.to_lowercase())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, StrumDisplay, EnumString)]
pub enum Outcome {
    #[strum(serialize = "W")]
    Win,
    #[strum(serialize = "T")]
    Tie,
    #[strum(serialize = "L")]
    Loss,
}
impl Outcome {
    pub fn from_wins(wins: f64) -> Self {
        if wins >= 1.0 {
            Self::Win
        } else if wins > 0.0 {
            Self::Tie
        } else {
            Self::Loss
        }
    }
}

/// One team's view of a single matchup.
///
/// Every matchup yields two rows; the opponent's row has `team` and
/// `opponent` swapped along with the scores.
#[derive(Clone, PartialEq, Debug, Getters, CopyGetters, Serialize, Deserialize)]
pub struct MatchRow {
    #[getset(get_copy = "pub")]
    season: Season,
    #[getset(get_copy = "pub")]
    week: Week,
    #[getset(get = "pub")]
    team: TeamName,
    #[getset(get = "pub")]
    opponent: TeamName,
    #[getset(get_copy = "pub")]
    score: Option<f64>,
    #[getset(get_copy = "pub")]
    opponent_score: Option<f64>,
    #[getset(get_copy = "pub")]
    wins: f64,
}

impl MatchRow {
    pub fn new(
        season: Season,
        week: Week,
        team: TeamName,
        opponent: TeamName,
        score: Option<f64>,
        opponent_score: Option<f64>,
    ) -> Self {
        Self {
            season,
            week,
            team,
            opponent,
            score,
            opponent_score,
            wins: wins_value(score, opponent_score),
        }
    }

    /// The same matchup seen from the opponent's side.
    pub fn mirrored(&self) -> Self {
        Self::new(
            self.season,
            self.week,
            self.opponent.clone(),
            self.team.clone(),
            self.opponent_score,
            self.score,
        )
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_wins(self.wins)
    }

    pub fn has_result(&self) -> bool {
        self.score.is_some_and(|s| s != 0.0)
    }

    pub(crate) fn rename_teams(&mut self, mut f: impl FnMut(&TeamName) -> TeamName) {
        self.team = f(&self.team);
        self.opponent = f(&self.opponent);
    }
}

/// 1 for a win, 0.5 for a tie, 0 for a loss.
/// Matchups without a combined score above zero have not been played yet and count as 0.
pub fn wins_value(score: Option<f64>, opponent_score: Option<f64>) -> f64 {
    match (score, opponent_score) {
        (Some(score), Some(opponent)) if score + opponent > 0.0 => {
            if score > opponent {
                1.0
            } else if score == opponent {
                0.5
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Newest season first, then week order, then highest score first with missing scores last.
pub fn sort_rows(rows: &mut [MatchRow]) {
    rows.sort_by_key(|row| {
        (
            Reverse(row.season),
            row.week,
            Reverse(row.score.map(OrderedFloat)),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::{sort_rows, wins_value, MatchRow, Outcome, Season, Week};

    fn row(week: u8, team: &str, opponent: &str, score: Option<f64>, opp: Option<f64>) -> MatchRow {
        MatchRow::new(
            Season::from(2023),
            Week::from(week),
            team.into(),
            opponent.into(),
            score,
            opp,
        )
    }

    #[test]
    fn test_wins_value() {
        assert_eq!(wins_value(Some(101.5), Some(99.0)), 1.0);
        assert_eq!(wins_value(Some(99.0), Some(101.5)), 0.0);
        assert_eq!(wins_value(Some(88.2), Some(88.2)), 0.5);
        assert_eq!(wins_value(Some(0.0), Some(0.0)), 0.0);
        assert_eq!(wins_value(None, None), 0.0);
        assert_eq!(wins_value(None, Some(12.0)), 0.0);
    }

    #[test]
    fn test_mirrored_row() {
        let original = row(3, "Alpha", "Beta", Some(120.0), Some(95.5));
        let mirrored = original.mirrored();
        assert_eq!(mirrored.team(), original.opponent());
        assert_eq!(mirrored.opponent(), original.team());
        assert_eq!(mirrored.score(), original.opponent_score());
        assert_eq!(mirrored.opponent_score(), original.score());
        assert_eq!(mirrored.wins(), 0.0);
        assert_eq!(original.wins(), 1.0);
        assert_eq!(mirrored.mirrored(), original);
    }

    #[test]
    fn test_outcome() {
        assert_eq!(Outcome::from_wins(1.0), Outcome::Win);
        assert_eq!(Outcome::from_wins(0.5), Outcome::Tie);
        assert_eq!(Outcome::from_wins(0.0), Outcome::Loss);
        assert_eq!(Outcome::Tie.to_string(), "T");
    }

    #[test]
    fn test_regular_season_weeks() {
        assert_eq!(Season::from(2020).regular_season_weeks(), Week::from(13));
        assert_eq!(Season::from(2021).regular_season_weeks(), Week::from(14));
    }

    #[test]
    fn test_sort_rows() {
        let mut rows = vec![
            row(2, "A", "B", Some(80.0), Some(90.0)),
            row(1, "A", "B", None, None),
            row(1, "B", "A", Some(70.0), None),
            row(1, "C", "D", Some(110.0), Some(60.0)),
        ];
        sort_rows(&mut rows);
        let order: Vec<_> = rows
            .iter()
            .map(|r| (r.week().get(), r.team().as_str().to_owned()))
            .collect();
        assert_eq!(
            order,
            [(1, "C".to_owned()), (1, "B".to_owned()), (1, "A".to_owned()), (2, "A".to_owned())]
        );
    }
}
