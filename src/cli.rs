//! Options and helpers shared by the binaries.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Datelike;
use clap::{Args, ValueEnum};
use log::LevelFilter;

use crate::config::{LeagueConfig, LeagueConfigError, LeagueId};
use crate::fetch::{FetchError, ScheduleRequest};
use crate::names::{canonicalize, DisplayNames};
use crate::parser::schedule::{self, most_recent_week};
use crate::schema::{MatchRow, Season, Week};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[value(alias = "warn")]
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Error | LogLevel::Critical => LevelFilter::Error,
        }
    }
}

/// How schedules are obtained: local files or a browser download.
#[derive(Clone, Debug, Args)]
pub struct FetchArgs {
    /// Skip downloading schedules; requires local HTML files.
    #[arg(long)]
    pub offline: bool,
    /// Directory to store downloaded HTML (defaults to html/<league>/).
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
    /// Path to leagues.toml mapping league names to IDs.
    #[arg(long)]
    pub leagues_file: Option<PathBuf>,
    /// Force re-download even if a cached file exists.
    #[arg(long)]
    pub refresh: bool,
    /// Run the browser in headless mode while downloading.
    #[arg(long, overrides_with = "no_headless")]
    headless: bool,
    /// Show the browser window while downloading.
    #[arg(long, overrides_with = "headless")]
    no_headless: bool,
    /// ESPN username/email (overrides the ESPN_USERNAME env var).
    #[arg(long)]
    pub username: Option<String>,
    /// ESPN password (overrides the ESPN_PASSWORD env var).
    #[arg(long)]
    pub password: Option<String>,
    /// Logging verbosity.
    #[arg(long, value_enum, ignore_case = true, default_value_t)]
    pub log_level: LogLevel,
}

/// Which league and season to download.
#[derive(Clone, Debug, Args)]
pub struct LeagueArgs {
    /// League name (from leagues.toml) used when downloading schedules.
    #[arg(long)]
    pub league: Option<String>,
    /// ESPN league identifier to fetch when downloading.
    #[arg(long)]
    pub league_id: Option<LeagueId>,
}

impl FetchArgs {
    /// `--headless`/`--no-headless`, whichever came last, else `default`.
    pub fn headless(&self, default: bool) -> bool {
        if self.headless {
            true
        } else if self.no_headless {
            false
        } else {
            default
        }
    }

    pub fn load_leagues(&self) -> Result<LeagueConfig, LeagueConfigError> {
        LeagueConfig::load(self.leagues_file.as_deref())
    }

    /// The request for one season; `html` takes precedence when it exists.
    pub fn request(
        &self,
        league: &LeagueArgs,
        html: Option<PathBuf>,
        season: Option<Season>,
        default_headless: bool,
    ) -> ScheduleRequest {
        ScheduleRequest::builder()
            .html(html)
            .offline(self.offline)
            .league_id(league.league_id)
            .league_name(league.league.clone())
            .season(season)
            .download_dir(self.download_dir.clone())
            .refresh(self.refresh)
            .headless(self.headless(default_headless))
            .username(self.username.clone())
            .password(self.password.clone())
            .build()
    }
}

/// Sets up `env_logger`; `RUST_LOG` can still refine the filter.
pub fn configure_logging(level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(level.filter())
        .filter_module("headless_chrome", level.filter().min(LevelFilter::Warn))
        .filter_module("tungstenite", level.filter().min(LevelFilter::Warn))
        .format_timestamp_secs()
        .parse_default_env()
        .init();
}

/// Downloads default to the current season.
pub fn resolve_season(offline: bool, season: Option<Season>) -> Option<Season> {
    match season {
        None if !offline => u16::try_from(chrono::Local::now().year())
            .ok()
            .map(Season::from),
        season => season,
    }
}

/// The last week to summarize: `requested`, capped at the latest played week.
pub fn resolve_end_week(rows: &[MatchRow], requested: Option<Week>) -> Option<Week> {
    let most_recent = most_recent_week(rows)?;
    Some(requested.map_or(most_recent, |week| week.min(most_recent)))
}

/// Parses a schedule and maps team labels through the configured aliases.
pub fn load_season(
    path: &Path,
    leagues: &LeagueConfig,
) -> anyhow::Result<(Vec<MatchRow>, DisplayNames)> {
    let mut rows = schedule::load(path)?;
    let names = canonicalize(&mut rows, leagues.aliases());
    Ok((rows, names))
}

/// Exit status for a failed run: 2 for missing inputs or league
/// configuration problems, 3 for login failures, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<FetchError>() {
        err.exit_code()
    } else if err.downcast_ref::<LeagueConfigError>().is_some() {
        2
    } else {
        1
    }
}

pub fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{exit_code, resolve_end_week, resolve_season, FetchArgs, LeagueArgs, LogLevel};
    use crate::config::{LeagueConfigError, LeagueId};
    use crate::fetch::FetchError;
    use crate::parser::schedule::tests::two_team_rows;
    use crate::schema::{Season, Week};

    #[derive(Parser)]
    struct Opts {
        #[command(flatten)]
        fetch: FetchArgs,
        #[command(flatten)]
        league: LeagueArgs,
    }

    #[test]
    fn test_headless_flags() {
        let parse = |args: &[&str]| {
            Opts::try_parse_from(std::iter::once("bin").chain(args.iter().copied())).unwrap()
        };
        assert!(parse(&[]).fetch.headless(true));
        assert!(!parse(&[]).fetch.headless(false));
        assert!(!parse(&["--no-headless"]).fetch.headless(true));
        assert!(parse(&["--headless"]).fetch.headless(false));
        assert!(!parse(&["--headless", "--no-headless"]).fetch.headless(true));
        assert!(parse(&["--no-headless", "--headless"]).fetch.headless(false));
    }

    #[test]
    fn test_parse_shared_options() {
        let opts = Opts::try_parse_from([
            "bin",
            "--offline",
            "--league",
            "main",
            "--league-id",
            "42",
            "--log-level",
            "WARN",
        ])
        .unwrap();
        assert!(opts.fetch.offline);
        assert_eq!(opts.league.league.as_deref(), Some("main"));
        assert_eq!(opts.league.league_id, Some(LeagueId::from(42)));
        assert_eq!(opts.fetch.log_level, LogLevel::Warning);
        assert_eq!(LogLevel::Critical.filter(), log::LevelFilter::Error);
        assert!(Opts::try_parse_from(["bin", "--log-level", "verbose"]).is_err());
    }

    #[test]
    fn test_resolve_season() {
        assert_eq!(resolve_season(true, None), None);
        assert_eq!(
            resolve_season(false, Some(Season::from(2019))),
            Some(Season::from(2019))
        );
        assert!(resolve_season(false, None).is_some());
    }

    #[test]
    fn test_resolve_end_week() {
        let rows = two_team_rows();
        assert_eq!(resolve_end_week(&rows, None), Some(Week::from(2)));
        assert_eq!(resolve_end_week(&rows, Some(Week::from(9))), Some(Week::from(2)));
        assert_eq!(resolve_end_week(&rows, Some(Week::from(1))), Some(Week::from(1)));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&FetchError::MissingCredentials.into()), 2);
        assert_eq!(
            exit_code(&FetchError::LoginAutomation("x".to_owned()).into()),
            3
        );
        assert_eq!(exit_code(&LeagueConfigError::NoConfiguration.into()), 2);
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
    }
}
