use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::bail;
use clap::Parser;
use power_rankings::cli::{
    configure_logging, load_season, report, resolve_end_week, resolve_season, FetchArgs,
    LeagueArgs,
};
use power_rankings::fetch::ensure_schedule_file;
use power_rankings::schema::{Season, Week};
use power_rankings::spotlight::team_spotlight;
use power_rankings::table::spotlight_tables;

/// Week-by-week results of one team, with notable wins and losses flagged.
#[derive(Parser)]
struct Opts {
    /// Part of the team name to look up (case-insensitive).
    owner: String,
    /// Saved schedule page; downloaded when missing.
    html: Option<PathBuf>,
    #[arg(long, default_value = "1")]
    start_week: Week,
    /// Last week to include (defaults to the most recent completed week).
    #[arg(long)]
    end_week: Option<Week>,
    /// Season year to download (defaults to the current year).
    #[arg(long)]
    season: Option<Season>,
    #[command(flatten)]
    league: LeagueArgs,
    #[command(flatten)]
    fetch: FetchArgs,
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    configure_logging(opts.fetch.log_level);
    report(run(opts))
}

fn run(opts: Opts) -> anyhow::Result<()> {
    let leagues = opts.fetch.load_leagues()?;
    let season = resolve_season(opts.fetch.offline, opts.season);
    let request = opts
        .fetch
        .request(&opts.league, opts.html.clone(), season, true);
    let path = ensure_schedule_file(&request, &leagues)?;

    let (rows, names) = load_season(&path, &leagues)?;
    let Some(end) = resolve_end_week(&rows, opts.end_week) else {
        bail!("No completed weeks found in {path:?}");
    };
    let spotlight = team_spotlight(&rows, &opts.owner, opts.start_week, end);
    if spotlight.results().is_empty() {
        let teams = rows
            .iter()
            .map(|row| names.display(row.team()).to_string())
            .collect::<std::collections::BTreeSet<_>>();
        bail!(
            "No team matching {:?} between weeks {} and {end}. Teams: {}",
            opts.owner,
            opts.start_week,
            teams.into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    for (title, table) in spotlight_tables(&spotlight) {
        println!("{title}:");
        println!("{table}");
        println!();
    }
    Ok(())
}
