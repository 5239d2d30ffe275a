use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use itertools::Itertools;
use log::debug;
use power_rankings_utils::{regex, selector};
use scraper::{ElementRef, Html};

use crate::schema::{sort_rows, MatchRow, Season, TeamName, Week};

/// One table per week, in week order.
pub const TABLE: &str = "div.matchup--table table.Table";

const AWAY_TEAM: usize = 1;
const AWAY_SCORE: usize = 2;
const HOME_SCORE: usize = 3;
const HOME_TEAM: usize = 4;

/// Reads a saved schedule page; the season is taken from the path.
pub fn load(path: &Path) -> anyhow::Result<Vec<MatchRow>> {
    let season = season_from_path(path).with_context(|| {
        format!("Could not infer the season from {path:?}; name the file after the year, e.g. 2023.html")
    })?;
    let html = fs_err::read_to_string(path)?;
    let rows = parse(&Html::parse_document(&html), season)
        .with_context(|| format!("While parsing schedule {path:?}"))?;
    debug!("Parsed {} match rows for season {season} from {path:?}", rows.len());
    Ok(rows)
}

pub fn parse(html: &Html, season: Season) -> anyhow::Result<Vec<MatchRow>> {
    let mut rows = vec![];
    for (i, table) in html.select(selector!(TABLE)).enumerate() {
        let week = Week::from(u8::try_from(i + 1).context("Too many schedule tables")?);
        for (j, tr) in table.select(selector!("tbody tr")).enumerate() {
            let game = parse_game(tr)
                .with_context(|| format!("While parsing matchup {} of week {week}", j + 1))?;
            let home = MatchRow::new(
                season,
                week,
                game.home,
                game.away,
                game.home_score,
                game.away_score,
            );
            let away = home.mirrored();
            rows.push(home);
            rows.push(away);
        }
    }
    sort_rows(&mut rows);
    Ok(rows)
}

struct Game {
    away: TeamName,
    away_score: Option<f64>,
    home_score: Option<f64>,
    home: TeamName,
}

fn parse_game(tr: ElementRef) -> anyhow::Result<Game> {
    let cells = tr
        .select(selector!("td"))
        .map(|td| td.text().collect::<String>())
        .collect_vec();
    let cell = |i: usize| {
        cells
            .get(i)
            .map(|text| text.trim())
            .with_context(|| format!("Cell {i} not found (the row has {} cells)", cells.len()))
    };
    Ok(Game {
        away: parse_team_name(cell(AWAY_TEAM)?)?,
        away_score: parse_score(cell(AWAY_SCORE)?),
        home_score: parse_score(cell(HOME_SCORE)?),
        home: parse_team_name(cell(HOME_TEAM)?)?,
    })
}

fn parse_team_name(text: &str) -> anyhow::Result<TeamName> {
    let name = regex!(r"\s+").replace_all(text, " ");
    if name.is_empty() {
        bail!("Empty team name");
    }
    Ok(name.into_owned().into())
}

/// Unplayed matchups show placeholders such as `--`.
fn parse_score(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Looks for a `20xx` year in the file name first, then anywhere in the path.
pub fn season_from_path(path: &Path) -> Option<Season> {
    let find = |s: &str| {
        regex!(r"(20\d{2})")
            .captures(s)
            .and_then(|c| c[1].parse::<u16>().ok())
            .map(Season::from)
    };
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(find)
        .or_else(|| find(&path.to_string_lossy()))
        .or_else(|| {
            fs_err::canonicalize(path)
                .ok()
                .and_then(|p| find(&p.to_string_lossy()))
        })
}

/// The last week with any nonzero score before the first fully unplayed week.
///
/// Returns `None` when the first week has not been played yet.
pub fn most_recent_week(rows: &[MatchRow]) -> Option<Week> {
    let mut played = BTreeMap::<Week, bool>::new();
    for row in rows {
        *played.entry(row.week()).or_default() |= row.has_result();
    }
    match played.iter().find(|(_, played)| !**played) {
        Some((week, _)) => week.get().checked_sub(1).filter(|&w| w > 0).map(Week::from),
        None => played.keys().next_back().copied(),
    }
}
