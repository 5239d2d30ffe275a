use std::process::ExitCode;

use clap::Parser;
use log::info;
use power_rankings::cli::{configure_logging, load_season, report, FetchArgs, LeagueArgs};
use power_rankings::fetch::ensure_schedule_file;
use power_rankings::names::DisplayNames;
use power_rankings::parser::schedule::most_recent_week;
use power_rankings::rankings::{
    league_dir, resolve_leagues, resolve_seasons, sort_team_seasons, SortKey, TeamSeason,
};
use power_rankings::schema::{Season, Week};
use power_rankings::summary::{summarize, Column, SortDirection};
use power_rankings::table::team_season_table;

/// Rank every team season of the configured leagues in one table.
#[derive(Parser)]
struct Opts {
    /// League name from leagues.toml; repeat for several (defaults to all).
    #[arg(long = "league", short = 'l')]
    leagues: Vec<String>,
    /// First season to include (defaults to the seasons already saved).
    #[arg(long)]
    start_season: Option<Season>,
    /// Last season to include.
    #[arg(long)]
    end_season: Option<Season>,
    /// Summarize every season through this week (still capped at the regular season).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=18))]
    end_week: Option<u8>,
    /// Column to sort by: Season, Team or any summary column.
    #[arg(long, default_value = "Pct")]
    sort_column: SortKey,
    #[arg(long, value_enum, ignore_case = true, default_value_t)]
    sort_direction: SortDirection,
    #[command(flatten)]
    fetch: FetchArgs,
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    configure_logging(opts.fetch.log_level);
    report(run(opts))
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let config = opts.fetch.load_leagues()?;
    let leagues = resolve_leagues(&opts.leagues, &config)?;
    let download_root = opts.fetch.download_dir.as_deref();
    let seasons = resolve_seasons(opts.start_season, opts.end_season, &leagues, download_root)?;

    let mut entries = vec![];
    let mut names = DisplayNames::default();
    for league in &leagues {
        let dir = league_dir(league, download_root);
        let league_args = LeagueArgs {
            league: Some(league.clone()),
            league_id: None,
        };
        for &season in &seasons {
            let saved = dir.join(format!("{season}.html"));
            if opts.fetch.offline && !saved.exists() {
                info!("No saved schedule for {league} {season}; skipping");
                continue;
            }
            let mut request = opts.fetch.request(&league_args, None, Some(season), true);
            request.download_dir = Some(dir.clone());
            if opts.fetch.offline {
                request.html = Some(saved);
            }
            let path = ensure_schedule_file(&request, &config)?;
            let (rows, season_names) = load_season(&path, &config)?;

            let Some(latest) = most_recent_week(&rows) else {
                info!("{league} {season} has no completed weeks; skipping");
                continue;
            };
            let mut cutoff = latest.min(season.regular_season_weeks());
            if let Some(week) = opts.end_week {
                cutoff = cutoff.min(Week::from(week));
            }
            names.merge(season_names);
            for row in summarize(&rows, Week::from(1), cutoff).into_rows() {
                entries.push(TeamSeason::new(season, row));
            }
        }
    }

    if entries.is_empty() {
        println!("No completed team seasons found.");
        return Ok(());
    }
    sort_team_seasons(&mut entries, opts.sort_column, opts.sort_direction, &names);
    println!("{}", team_season_table(&entries, &Column::all(), &names));
    Ok(())
}
