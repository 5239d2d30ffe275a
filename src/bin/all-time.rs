use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::bail;
use clap::Parser;
use log::info;
use power_rankings::cli::{configure_logging, load_season, report, FetchArgs, LeagueArgs};
use power_rankings::fetch::{ensure_schedule_file, FetchError};
use power_rankings::names::DisplayNames;
use power_rankings::parser::schedule::most_recent_week;
use power_rankings::plot::plot_season_graphs;
use power_rankings::rankings::league_dir;
use power_rankings::schema::{Season, Week};
use power_rankings::summary::{summarize, Column, SummaryTable};
use power_rankings::table::summary_table;

/// Combine regular-season summaries across a range of seasons.
#[derive(Parser)]
struct Opts {
    start_year: Season,
    end_year: Season,
    /// Prefix of saved schedules; `<BASE><year>.html` is read for every season.
    #[arg(long)]
    base: Option<String>,
    /// Directory to store per-season plots (one subdirectory per season).
    #[arg(long)]
    out_dir: Option<PathBuf>,
    #[command(flatten)]
    league: LeagueArgs,
    #[command(flatten)]
    fetch: FetchArgs,
}

impl Opts {
    /// The saved schedule for `season`, or `None` to download into the
    /// league's directory.
    fn season_path(&self, season: Season) -> Option<PathBuf> {
        if let Some(base) = &self.base {
            return Some(PathBuf::from(format!("{base}{season}.html")));
        }
        let dir = match (&self.fetch.download_dir, &self.league.league, self.league.league_id) {
            (Some(dir), _, _) => dir.clone(),
            (None, Some(name), _) => league_dir(name, None),
            (None, None, Some(id)) => league_dir(&format!("league_{id}"), None),
            (None, None, None) => return None,
        };
        Some(dir.join(format!("{season}.html")))
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    configure_logging(opts.fetch.log_level);
    report(run(opts))
}

fn run(opts: Opts) -> anyhow::Result<()> {
    if opts.start_year > opts.end_year {
        bail!("START_YEAR cannot be greater than END_YEAR");
    }
    if opts.base.is_none() && opts.fetch.offline {
        return Err(FetchError::MissingInput(
            "--base is required with --offline to locate the saved schedules.".to_owned(),
        )
        .into());
    }
    if !opts.fetch.offline && opts.league.league.is_none() && opts.league.league_id.is_none() {
        return Err(FetchError::MissingInput(
            "League information is required to download schedules. Specify --league-id or --league."
                .to_owned(),
        )
        .into());
    }
    let leagues = opts.fetch.load_leagues()?;

    let mut summaries = vec![];
    let mut names = DisplayNames::default();
    for season in (opts.start_year.get()..=opts.end_year.get()).map(Season::from) {
        let request = opts
            .fetch
            .request(&opts.league, opts.season_path(season), Some(season), true);
        let path = ensure_schedule_file(&request, &leagues)?;
        let (rows, season_names) = load_season(&path, &leagues)?;
        names.merge(season_names);

        let Some(end) = most_recent_week(&rows).map(|week| week.min(season.regular_season_weeks()))
        else {
            info!("Season {season} has no completed weeks; skipping");
            continue;
        };
        let start = Week::from(1);
        info!("Season {season}: weeks {start} through {end}");
        if let Some(out_dir) = &opts.out_dir {
            plot_season_graphs(&rows, start, end, &out_dir.join(season.to_string()), &names)?;
        }
        summaries.push(summarize(&rows, start, end));
    }

    let all_time = SummaryTable::rollup(summaries);
    println!("{}", summary_table(&all_time, &Column::ROLLUP, &names));
    Ok(())
}
