use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::bail;
use clap::Parser;
use log::info;
use power_rankings::cli::{
    configure_logging, load_season, report, resolve_end_week, resolve_season, FetchArgs,
    LeagueArgs,
};
use power_rankings::fetch::ensure_schedule_file;
use power_rankings::plot::plot_season_graphs;
use power_rankings::ranks::remaining_schedule;
use power_rankings::schema::{Season, Week};
use power_rankings::summary::{summarize, Column};
use power_rankings::table::{remaining_schedule_table, summary_table};

/// Generate power rankings for one season of an ESPN league.
#[derive(Parser)]
struct Opts {
    /// Saved schedule page; downloaded when missing.
    html: Option<PathBuf>,
    /// Directory to store generated plots.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// First week to include.
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
        .request(&opts.league, opts.html.clone(), season, false);
    let path = ensure_schedule_file(&request, &leagues)?;

    let (rows, names) = load_season(&path, &leagues)?;
    let start = opts.start_week;
    let Some(end) = resolve_end_week(&rows, opts.end_week) else {
        bail!("No completed weeks found in {path:?}");
    };
    if start > end {
        bail!("--start-week ({start}) is after the last completed week ({end})");
    }
    info!("Summarizing weeks {start} through {end} from {path:?}");

    let summary = summarize(&rows, start, end);
    if let Some(out_dir) = &opts.out_dir {
        plot_season_graphs(&rows, start, end, out_dir, &names)?;
    }
    println!("{}", summary_table(&summary, &Column::all(), &names));

    let last_week = rows.iter().map(|row| row.week()).max();
    if last_week.is_some_and(|week| week > end) {
        let remaining = remaining_schedule(&rows, start, end);
        if !remaining.is_empty() {
            println!();
            println!("Remaining strength of schedule");
            println!("{}", remaining_schedule_table(&remaining, &names));
        }
    }
    Ok(())
}
