use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use derive_more::{Display, From, FromStr, Into};
use itertools::Itertools;
use log::debug;
use serde::Deserialize;

use crate::names::TeamAliases;

pub const PRIMARY_CONFIG_NAME: &str = "leagues.toml";

#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, From, Into, FromStr,
)]
pub struct LeagueId(u64);

#[derive(Debug, thiserror::Error)]
pub enum LeagueConfigError {
    #[error("Leagues configuration {0:?} does not exist.")]
    MissingFile(PathBuf),
    #[error("Could not read leagues configuration {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Leagues configuration {path:?} is not valid: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("League '{league}' is missing 'league_id' in configuration file {path:?}.")]
    MissingId { league: String, path: PathBuf },
    #[error("League '{league}' has an invalid league_id value {value} in {path:?}.")]
    InvalidId {
        league: String,
        value: String,
        path: PathBuf,
    },
    #[error("No leagues configuration found. Provide --league-id or create {}.", PRIMARY_CONFIG_NAME)]
    NoConfiguration,
    #[error("League '{league}' not found. Available leagues: {available}.")]
    LeagueNotFound { league: String, available: String },
    #[error("Provided league ID {given} conflicts with configured ID {configured} for '{league}'.")]
    IdMismatch {
        league: String,
        given: LeagueId,
        configured: LeagueId,
    },
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    leagues: BTreeMap<String, toml::Value>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

/// Contents of `leagues.toml`:
///
/// ```toml
/// [leagues]
/// main = 123456
/// keeper = { league_id = 654321 }
///
/// [aliases]
/// "JOE SMITH" = "Joe Smith"
/// ```
#[derive(Debug, Default)]
pub struct LeagueConfig {
    leagues: BTreeMap<String, LeagueId>,
    aliases: TeamAliases,
}

impl LeagueConfig {
    /// Reads the explicitly given file, or the first `leagues.toml` found in
    /// the current directory and its ancestors. No file at all yields an empty
    /// configuration.
    pub fn load(leagues_file: Option<&Path>) -> Result<Self, LeagueConfigError> {
        let path = match leagues_file {
            Some(path) if !path.exists() => {
                return Err(LeagueConfigError::MissingFile(path.to_owned()))
            }
            Some(path) => path.to_owned(),
            None => {
                let cwd = std::env::current_dir().map_err(|source| LeagueConfigError::Io {
                    path: PathBuf::from("."),
                    source,
                })?;
                match discover(&cwd) {
                    Some(path) => path,
                    None => {
                        debug!("No {PRIMARY_CONFIG_NAME} found above {cwd:?}");
                        return Ok(Self::default());
                    }
                }
            }
        };
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, LeagueConfigError> {
        let text = fs_err::read_to_string(path).map_err(|source| LeagueConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::from_toml_str(&text, path)?;
        debug!(
            "Loaded {} leagues and {} aliases from {path:?}",
            config.leagues.len(),
            config.aliases.len()
        );
        Ok(config)
    }

    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, LeagueConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| LeagueConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        let leagues = raw
            .leagues
            .into_iter()
            .map(|(name, value)| {
                let id = extract_league_id(&name, &value, path)?;
                Ok((name, id))
            })
            .collect::<Result<_, LeagueConfigError>>()?;
        let aliases = raw
            .aliases
            .into_iter()
            .map(|(raw, canonical)| (raw.into(), canonical.into()))
            .collect();
        Ok(Self { leagues, aliases })
    }

    pub fn get(&self, league: &str) -> Option<LeagueId> {
        self.leagues.get(league).copied()
    }

    pub fn league_names(&self) -> impl Iterator<Item = &str> {
        self.leagues.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.leagues.is_empty()
    }

    pub fn aliases(&self) -> &TeamAliases {
        &self.aliases
    }

    /// Resolves a league from an explicit id, a configured name, or both (which
    /// then have to agree).
    pub fn resolve_league_id(
        &self,
        league_id: Option<LeagueId>,
        league_name: Option<&str>,
    ) -> Result<Option<LeagueId>, LeagueConfigError> {
        match (league_id, league_name) {
            (Some(given), Some(name)) => {
                let configured = self.get(name).ok_or_else(|| self.not_found(name))?;
                if configured != given {
                    return Err(LeagueConfigError::IdMismatch {
                        league: name.to_owned(),
                        given,
                        configured,
                    });
                }
                Ok(Some(given))
            }
            (Some(given), None) => Ok(Some(given)),
            (None, Some(name)) => {
                if self.is_empty() {
                    return Err(LeagueConfigError::NoConfiguration);
                }
                self.get(name).map(Some).ok_or_else(|| self.not_found(name))
            }
            (None, None) => Ok(None),
        }
    }

    fn not_found(&self, league: &str) -> LeagueConfigError {
        LeagueConfigError::LeagueNotFound {
            league: league.to_owned(),
            available: self.league_names().join(", "),
        }
    }
}

/// The first `leagues.toml` in `start` or one of its ancestors.
pub fn discover(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PRIMARY_CONFIG_NAME))
        .find(|candidate| candidate.is_file())
}

fn extract_league_id(
    league: &str,
    value: &toml::Value,
    path: &Path,
) -> Result<LeagueId, LeagueConfigError> {
    let invalid = |value: &toml::Value| LeagueConfigError::InvalidId {
        league: league.to_owned(),
        value: value.to_string(),
        path: path.to_owned(),
    };
    let value = match value {
        toml::Value::Table(table) => {
            table
                .get("league_id")
                .ok_or_else(|| LeagueConfigError::MissingId {
                    league: league.to_owned(),
                    path: path.to_owned(),
                })?
        }
        value => value,
    };
    match value {
        toml::Value::Integer(id) => u64::try_from(*id)
            .map(LeagueId::from)
            .map_err(|_| invalid(value)),
        toml::Value::String(id) => id.trim().parse().map_err(|_| invalid(value)),
        _ => Err(invalid(value)),
    }
}
