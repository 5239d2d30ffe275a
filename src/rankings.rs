//! Team seasons from several leagues and years compared in one table.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context};
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use log::debug;
use power_rankings_utils::regex;

use crate::config::{LeagueConfig, LeagueConfigError};
use crate::fetch::{FetchError, DEFAULT_DOWNLOAD_ROOT};
use crate::names::DisplayNames;
use crate::schema::Season;
use crate::summary::{compare_values, Column, SortDirection, SummaryRow};

#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct TeamSeason {
    #[getset(get_copy = "pub")]
    season: Season,
    #[getset(get = "pub")]
    row: SummaryRow,
}

impl TeamSeason {
    pub fn new(season: Season, row: SummaryRow) -> Self {
        Self { season, row }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SortKey {
    Season,
    Team,
    Stat(Column),
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("season") {
            return Ok(Self::Season);
        }
        if s.eq_ignore_ascii_case("team") {
            return Ok(Self::Team);
        }
        let column = Column::from_str(s).ok().with_context(|| {
            let names = ["Season", "Team"]
                .into_iter()
                .chain(Column::all().into_iter().map(Column::header))
                .join(", ");
            format!("sort column {s:?} must be one of: {names}")
        })?;
        Ok(Self::Stat(column))
    }
}

/// Sorts by `key`; ties fall back to the newest season, then the team.
pub fn sort_team_seasons(
    entries: &mut [TeamSeason],
    key: SortKey,
    direction: SortDirection,
    names: &DisplayNames,
) {
    let team = |entry: &TeamSeason| names.display(entry.row.team()).as_str().to_owned();
    entries.sort_by(|a, b| {
        let primary = match key {
            SortKey::Season => direction.apply(a.season.cmp(&b.season)),
            SortKey::Team => direction.apply(team(a).cmp(&team(b))),
            SortKey::Stat(column) => {
                compare_values(a.row.value(column), b.row.value(column), direction)
            }
        };
        primary
            .then_with(|| b.season.cmp(&a.season))
            .then_with(|| team(a).cmp(&team(b)))
    });
}

/// The requested leagues in the given order without duplicates, or every
/// configured league when none was requested.
pub fn resolve_leagues(
    requested: &[String],
    leagues: &LeagueConfig,
) -> Result<Vec<String>, LeagueConfigError> {
    if leagues.is_empty() {
        return Err(LeagueConfigError::NoConfiguration);
    }
    if requested.is_empty() {
        return Ok(leagues.league_names().map(str::to_owned).collect());
    }
    let requested = requested.iter().unique().cloned().collect_vec();
    let missing = requested
        .iter()
        .filter(|name| leagues.get(name).is_none())
        .join(", ");
    if !missing.is_empty() {
        return Err(LeagueConfigError::LeagueNotFound {
            league: missing,
            available: leagues.league_names().join(", "),
        });
    }
    Ok(requested)
}

pub fn league_dir(league: &str, download_root: Option<&Path>) -> PathBuf {
    download_root
        .unwrap_or(Path::new(DEFAULT_DOWNLOAD_ROOT))
        .join(league)
}

/// Seasons with a saved `<year>.html` in `dir`; a missing directory has none.
pub fn discover_seasons(dir: &Path) -> anyhow::Result<BTreeSet<Season>> {
    if !dir.is_dir() {
        debug!("No saved schedules in {dir:?}");
        return Ok(BTreeSet::new());
    }
    let mut seasons = BTreeSet::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "html") {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            if let Some(year) = regex!(r"(20\d{2})").captures(&name) {
                seasons.insert(Season::from(year[1].parse::<u16>()?));
            }
        }
    }
    Ok(seasons)
}

/// An explicit range (one bound fills in the other), or every season saved
/// for any of the leagues. Finding no saved season is a missing input.
pub fn resolve_seasons(
    start: Option<Season>,
    end: Option<Season>,
    leagues: &[String],
    download_root: Option<&Path>,
) -> anyhow::Result<Vec<Season>> {
    if let Some((start, end)) = match (start, end) {
        (Some(start), Some(end)) => Some((start, end)),
        (Some(one), None) | (None, Some(one)) => Some((one, one)),
        (None, None) => None,
    } {
        if start > end {
            bail!("--start-season cannot be greater than --end-season.");
        }
        return Ok((start.get()..=end.get()).map(Season::from).collect());
    }
    let mut seasons = BTreeSet::new();
    for league in leagues {
        seasons.extend(discover_seasons(&league_dir(league, download_root))?);
    }
    if seasons.is_empty() {
        return Err(FetchError::MissingInput(
            "No seasons to process; provide --start-season/--end-season or download HTML first."
                .to_owned(),
        )
        .into());
    }
    Ok(seasons.into_iter().collect())
}
