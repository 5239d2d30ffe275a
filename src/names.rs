use std::collections::{BTreeMap, HashMap};

use crate::schema::{MatchRow, Season, TeamName, Week};

/// Raw team labels mapped to the name the team is tracked under.
///
/// Owners rename their teams (or ESPN changes how co-owners are listed), so
/// several labels can belong to one team across seasons.
#[derive(Clone, Default, Debug)]
pub struct TeamAliases(BTreeMap<TeamName, TeamName>);

impl TeamAliases {
    pub fn canonical(&self, raw: &TeamName) -> TeamName {
        self.0.get(raw).unwrap_or(raw).clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(TeamName, TeamName)> for TeamAliases {
    fn from_iter<I: IntoIterator<Item = (TeamName, TeamName)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The most recently seen raw label for each canonical team.
#[derive(Clone, Default, Debug)]
pub struct DisplayNames(HashMap<TeamName, ((Season, Week), TeamName)>);

impl DisplayNames {
    pub fn display<'a>(&'a self, canonical: &'a TeamName) -> &'a TeamName {
        self.0.get(canonical).map_or(canonical, |(_, label)| label)
    }

    fn observe(&mut self, canonical: TeamName, when: (Season, Week), label: &TeamName) {
        let entry = self
            .0
            .entry(canonical)
            .or_insert_with(|| (when, label.clone()));
        if when >= entry.0 {
            *entry = (when, label.clone());
        }
    }

    /// Keeps whichever label was observed later.
    pub fn merge(&mut self, other: DisplayNames) {
        for (canonical, (when, label)) in other.0 {
            self.observe(canonical, when, &label);
        }
    }
}

/// Rewrites team and opponent labels to their canonical names and returns the
/// labels to show for them.
pub fn canonicalize(rows: &mut [MatchRow], aliases: &TeamAliases) -> DisplayNames {
    let mut names = DisplayNames::default();
    for row in rows.iter() {
        names.observe(
            aliases.canonical(row.team()),
            (row.season(), row.week()),
            row.team(),
        );
    }
    if !aliases.is_empty() {
        for row in rows.iter_mut() {
            row.rename_teams(|name| aliases.canonical(name));
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::{canonicalize, TeamAliases};
    use crate::schema::{MatchRow, Season, TeamName, Week};

    fn row(season: u16, week: u8, team: &str, opponent: &str) -> MatchRow {
        MatchRow::new(
            Season::from(season),
            Week::from(week),
            team.into(),
            opponent.into(),
            Some(100.0),
            Some(90.0),
        )
    }

    fn aliases() -> TeamAliases {
        [("JOE SMITH", "Joe Smith"), ("Joseph Smith", "Joe Smith")]
            .into_iter()
            .map(|(raw, canonical)| (TeamName::from(raw), TeamName::from(canonical)))
            .collect()
    }

    #[test]
    fn test_canonicalize_rewrites_both_sides() {
        let mut rows = vec![
            row(2022, 1, "JOE SMITH", "Ann Lee"),
            row(2022, 1, "Ann Lee", "JOE SMITH"),
        ];
        canonicalize(&mut rows, &aliases());
        assert_eq!(rows[0].team().as_str(), "Joe Smith");
        assert_eq!(rows[1].opponent().as_str(), "Joe Smith");
        assert_eq!(rows[1].team().as_str(), "Ann Lee");
    }

    #[test]
    fn test_latest_label_is_displayed() {
        let mut rows = vec![
            row(2023, 2, "Joseph Smith", "Ann Lee"),
            row(2022, 5, "JOE SMITH", "Ann Lee"),
            row(2023, 1, "JOE SMITH", "Ann Lee"),
        ];
        let names = canonicalize(&mut rows, &aliases());
        let canonical = TeamName::from("Joe Smith");
        assert_eq!(names.display(&canonical).as_str(), "Joseph Smith");
        let unknown = TeamName::from("Nobody");
        assert_eq!(names.display(&unknown).as_str(), "Nobody");
    }

    #[test]
    fn test_merge_prefers_newer_observation() {
        let mut old = canonicalize(&mut [row(2020, 3, "JOE SMITH", "Ann Lee")], &aliases());
        let new = canonicalize(&mut [row(2021, 1, "Joseph Smith", "Ann Lee")], &aliases());
        old.merge(new);
        let canonical = TeamName::from("Joe Smith");
        assert_eq!(old.display(&canonical).as_str(), "Joseph Smith");
    }
}
