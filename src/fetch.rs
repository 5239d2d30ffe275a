//! Downloading schedule pages from ESPN with a real browser.
//!
//! The schedule page is rendered client-side and sits behind the Disney login
//! overlay, so a plain HTTP client is not enough. The browser is reached
//! through [`BrowserPage`]; [`ChromePage`] drives Chromium via
//! `headless_chrome`.

use std::{
    ffi::OsStr,
    io::{self, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
    thread::sleep,
    time::{Duration, Instant},
};

use anyhow::Context;
use fs_err::File;
use headless_chrome::{
    protocol::cdp::Network::{Cookie, CookieParam},
    Browser, LaunchOptions, Tab,
};
use log::{debug, info, warn};
use power_rankings_utils::{
    credentials::{Credentials, PASSWORD_VAR, USERNAME_VAR},
    fs_json_util::write_json,
};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use url::Url;

use crate::config::{LeagueConfig, LeagueConfigError, LeagueId};
use crate::parser::schedule::TABLE;
use crate::schema::Season;

pub const SCHEDULE_URL: &str = "https://fantasy.espn.com/football/league/schedule";
pub const EMAIL_INPUT: &str = "[data-testid='InputIdentityFlowValue']";
pub const PASSWORD_INPUT: &str = "[data-testid='InputPassword']";
pub const SUBMIT_BUTTON: &str = "[data-testid='BtnSubmit']";
/// Where downloaded schedules live when no directory is given.
pub const DEFAULT_DOWNLOAD_ROOT: &str = "html";
const LOGIN_URL_TOKENS: [&str; 3] = ["login", "signin", "registerdisney"];

const OVERLAY_OPEN_JS: &str = "Boolean(document && document.documentElement && \
     document.documentElement.classList.contains('oneid-lightbox-open'))";
/// `"absent"`, `"hidden"` or `"visible"`.
const LOGIN_FRAME_STATE_JS: &str = "(() => { \
     const f = document.querySelector(\"iframe#oneid-iframe, iframe[name='oneid-iframe']\"); \
     if (!f) return 'absent'; \
     const r = f.getBoundingClientRect(); \
     return (r.width > 0 && r.height > 0) ? 'visible' : 'hidden'; })()";
const LOGIN_FRAME_SRC_JS: &str = "(() => { \
     const f = document.querySelector(\"iframe#oneid-iframe, iframe[name='oneid-iframe']\"); \
     return f ? f.src : null; })()";
const PASSWORD_GONE_JS: &str =
    "document.querySelector(\"[data-testid='InputPassword']\") === null";

const TABLE_TIMEOUT: Duration = Duration::from_secs(60);
const EMAIL_TIMEOUT: Duration = Duration::from_secs(20);
const PASSWORD_TIMEOUT: Duration = Duration::from_secs(30);
const CLICK_TIMEOUT: Duration = Duration::from_secs(15);
const SUBMIT_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(
        "ESPN credentials are required. Provide them as options or set the {} and {} environment variables.",
        USERNAME_VAR,
        PASSWORD_VAR
    )]
    MissingCredentials,
    #[error("{0}")]
    MissingInput(String),
    #[error(transparent)]
    LeagueConfig(#[from] LeagueConfigError),
    #[error("Automated login failed: {0}")]
    LoginAutomation(String),
}

impl FetchError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FetchError::MissingCredentials
            | FetchError::MissingInput(_)
            | FetchError::LeagueConfig(_) => 2,
            FetchError::LoginAutomation(_) => 3,
        }
    }
}

/// `~/.cache/power_rankings/espn_state.json`
pub fn default_state_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default();
    home.join(".cache")
        .join("power_rankings")
        .join("espn_state.json")
}

#[derive(Clone, Debug, TypedBuilder)]
pub struct FetchConfig {
    pub league_id: LeagueId,
    pub season: Season,
    pub output_dir: PathBuf,
    #[builder(default)]
    pub output_filename: Option<String>,
    #[builder(default)]
    pub username: Option<String>,
    #[builder(default)]
    pub password: Option<String>,
    #[builder(default)]
    pub force_refresh: bool,
    #[builder(default = true)]
    pub headless: bool,
    #[builder(default = default_state_path())]
    pub state_path: PathBuf,
}

impl FetchConfig {
    pub fn resolve_credentials(&self) -> Result<Credentials, FetchError> {
        Credentials::resolve(self.username.as_deref(), self.password.as_deref())
            .ok_or(FetchError::MissingCredentials)
    }

    pub fn schedule_url(&self) -> anyhow::Result<Url> {
        Ok(Url::parse_with_params(
            SCHEDULE_URL,
            [
                ("leagueId", self.league_id.to_string()),
                ("seasonId", self.season.to_string()),
            ],
        )?)
    }

    pub fn output_path(&self) -> PathBuf {
        let filename = self
            .output_filename
            .clone()
            .unwrap_or_else(|| format!("{}.html", self.season));
        self.output_dir.join(filename)
    }

    /// A headed browser starts minimized so it does not steal focus.
    pub fn launch_args(&self) -> Vec<&'static str> {
        if self.headless {
            vec![]
        } else {
            vec!["--start-minimized", "--window-position=0,0"]
        }
    }
}

/// A cookie as persisted in the session state file.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Absent for session cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

#[derive(Default, Debug, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<StoredCookie>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStateLoadError {
    #[error("Session state was not found.")]
    NotFound,
    #[error("An I/O error occurred when loading the session state: {0:?}")]
    IOError(io::Error),
    #[error("The session state json file is corrupted and could not be loaded: {0:?}")]
    JsonError(#[from] serde_json::Error),
}
impl From<io::Error> for SessionStateLoadError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::IOError(e),
        }
    }
}

impl SessionState {
    pub fn load(path: &Path) -> Result<Self, SessionStateLoadError> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json(path, self)
    }
}

/// The handful of browser operations the download needs.
pub trait BrowserPage {
    /// Loads `url` and waits for the navigation to finish.
    fn navigate(&self, url: &str) -> anyhow::Result<()>;
    fn url(&self) -> String;
    /// Evaluates a JavaScript expression in the page, returning its JSON value.
    fn evaluate(&self, expression: &str) -> anyhow::Result<serde_json::Value>;
    fn wait_for(&self, selector: &str, timeout: Duration) -> anyhow::Result<()>;
    fn fill(&self, selector: &str, value: &str, timeout: Duration) -> anyhow::Result<()>;
    fn click(&self, selector: &str, timeout: Duration) -> anyhow::Result<()>;
    fn content(&self) -> anyhow::Result<String>;
    fn cookies(&self) -> anyhow::Result<Vec<StoredCookie>>;
    fn set_cookies(&self, cookies: Vec<StoredCookie>) -> anyhow::Result<()>;
}

pub struct ChromePage {
    // Dropping the browser closes Chromium.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn launch(config: &FetchConfig) -> anyhow::Result<Self> {
        let args = config.launch_args();
        if !config.headless {
            info!(
                "Launching Chromium in headed mode (window will start minimized). \
                 Bring it to the foreground if interaction is required."
            );
        }
        let browser = Browser::new(
            LaunchOptions::default_builder()
                .headless(config.headless)
                .args(args.iter().copied().map(OsStr::new).collect())
                .idle_browser_timeout(Duration::from_secs(180))
                .build()?,
        )
        .context("Failed to launch Chromium")?;
        let tab = browser.new_tab()?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

impl BrowserPage for ChromePage {
    fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.tab.navigate_to(url)?.wait_until_navigated()?;
        Ok(())
    }

    fn url(&self) -> String {
        self.tab.get_url()
    }

    fn evaluate(&self, expression: &str) -> anyhow::Result<serde_json::Value> {
        let object = self.tab.evaluate(expression, false)?;
        Ok(object.value.unwrap_or(serde_json::Value::Null))
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> anyhow::Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)?;
        Ok(())
    }

    fn fill(&self, selector: &str, value: &str, timeout: Duration) -> anyhow::Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)?
            .type_into(value)?;
        Ok(())
    }

    fn click(&self, selector: &str, timeout: Duration) -> anyhow::Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)?
            .click()?;
        Ok(())
    }

    fn content(&self) -> anyhow::Result<String> {
        self.tab.get_content()
    }

    fn cookies(&self) -> anyhow::Result<Vec<StoredCookie>> {
        self.tab
            .get_cookies()?
            .into_iter()
            .map(stored_cookie)
            .collect()
    }

    fn set_cookies(&self, cookies: Vec<StoredCookie>) -> anyhow::Result<()> {
        let params = cookies
            .into_iter()
            .map(|cookie| Ok(serde_json::from_value(serde_json::to_value(cookie)?)?))
            .collect::<anyhow::Result<Vec<CookieParam>>>()?;
        self.tab.set_cookies(params)?;
        Ok(())
    }
}

fn stored_cookie(cookie: Cookie) -> anyhow::Result<StoredCookie> {
    let session = cookie.session;
    let mut stored: StoredCookie = serde_json::from_value(serde_json::to_value(cookie)?)?;
    if session || stored.expires.is_some_and(|e| e < 0.0) {
        stored.expires = None;
    }
    Ok(stored)
}

/// Whether the page shows the Disney login prompt instead of the schedule.
pub fn requires_login(page: &impl BrowserPage) -> bool {
    let url = page.url().to_lowercase();
    if LOGIN_URL_TOKENS.iter().any(|token| url.contains(token)) {
        debug!("Login required because page URL contains an indicator: {url}");
        return true;
    }
    let overlay_open = match page.evaluate(OVERLAY_OPEN_JS) {
        Ok(value) => value.as_bool().unwrap_or(false),
        Err(e) => {
            debug!("Error checking for login overlay state; assuming it is closed. ({e:#})");
            false
        }
    };
    if overlay_open {
        debug!("Login required because the ESPN overlay is active.");
        return true;
    }
    match page.evaluate(LOGIN_FRAME_STATE_JS) {
        Ok(value) => match value.as_str() {
            Some("visible") => {
                debug!("Login required because the login iframe is visible.");
                true
            }
            Some("hidden") => {
                debug!("Login iframe present but hidden; assuming session is still valid.");
                false
            }
            _ => {
                debug!("Login iframe not detected; assuming session is still valid.");
                false
            }
        },
        Err(e) => {
            debug!("Failed to inspect the login iframe; treating login as required. ({e:#})");
            true
        }
    }
}

fn login_error(message: &str) -> impl FnOnce(anyhow::Error) -> FetchError + '_ {
    move |e| FetchError::LoginAutomation(format!("{message} ({e:#})"))
}

/// Polls `expression` until it evaluates to `true`.
fn wait_until(page: &impl BrowserPage, expression: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(serde_json::Value::Bool(true)) = page.evaluate(expression) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(500));
    }
}

/// Signs in through the login iframe.
///
/// The iframe lives on another origin, so its document is opened directly
/// in the page; the caller navigates back to the schedule afterwards.
pub fn perform_login(page: &impl BrowserPage, credentials: &Credentials) -> Result<(), FetchError> {
    let src = page
        .evaluate(LOGIN_FRAME_SRC_JS)
        .map_err(login_error("Could not locate the ESPN login iframe"))?;
    let src = match src.as_str() {
        Some(src) if !src.is_empty() => src.to_owned(),
        Some(_) => {
            return Err(FetchError::LoginAutomation(
                "Login iframe was found, but no frame content is available.".to_owned(),
            ))
        }
        None => {
            return Err(FetchError::LoginAutomation(
                "Could not locate the ESPN login iframe during login automation.".to_owned(),
            ))
        }
    };
    info!("Starting ESPN login flow via iframe.");
    page.navigate(&src)
        .map_err(login_error("Could not open the login form"))?;

    page.fill(EMAIL_INPUT, credentials.username.as_ref(), EMAIL_TIMEOUT)
        .map_err(login_error("Could not fill the username/email field"))?;
    debug!("Filled username/email field using selector '{EMAIL_INPUT}'.");
    page.click(SUBMIT_BUTTON, CLICK_TIMEOUT)
        .map_err(login_error("Could not click the username submit button"))?;

    page.wait_for(PASSWORD_INPUT, PASSWORD_TIMEOUT).map_err(login_error(
        "Timed out waiting for the ESPN password field after submitting the username.",
    ))?;
    page.fill(PASSWORD_INPUT, credentials.password.as_ref(), CLICK_TIMEOUT)
        .map_err(login_error("Could not fill the password field"))?;
    debug!("Filled password field using selector '{PASSWORD_INPUT}'.");
    page.click(SUBMIT_BUTTON, CLICK_TIMEOUT)
        .map_err(login_error("Could not click the final login button"))?;

    if !wait_until(page, PASSWORD_GONE_JS, SUBMIT_SETTLE_TIMEOUT) {
        warn!("Login form still active after timeout; continuing but downstream waits may fail.");
    }
    Ok(())
}

/// Opens the schedule, signs in when needed and returns the rendered HTML.
///
/// Credentials are only resolved when a login turns out to be necessary.
pub fn get_schedule_html(
    page: &impl BrowserPage,
    config: &FetchConfig,
    credentials: impl FnOnce() -> Result<Credentials, FetchError>,
) -> anyhow::Result<String> {
    let url = config.schedule_url()?;
    page.navigate(url.as_str())?;
    debug!("Navigated to schedule page at {url}");

    if requires_login(page) {
        if config.state_path.exists() {
            info!(
                "Stored ESPN login state missing or invalid; attempting fresh login for league {} season {}.",
                config.league_id, config.season
            );
        }
        let credentials = credentials()?;
        info!(
            "Login required for league {} season {}",
            config.league_id, config.season
        );
        perform_login(page, &credentials)?;
        page.navigate(url.as_str())?;
        if requires_login(page) {
            return Err(FetchError::LoginAutomation(
                "ESPN still asks for a login after submitting the credentials.".to_owned(),
            )
            .into());
        }
    }

    debug!("Waiting for schedule table content to render.");
    page.wait_for(TABLE, TABLE_TIMEOUT).map_err(login_error(
        "Timed out waiting for the schedule table to render after loading the page.",
    ))?;
    debug!("Schedule table detected; capturing HTML.");
    page.content()
}

fn restore_session(page: &impl BrowserPage, state_path: &Path) {
    match SessionState::load(state_path) {
        Ok(state) => {
            debug!(
                "Restoring {} cookies from {state_path:?}",
                state.cookies.len()
            );
            if let Err(e) = page.set_cookies(state.cookies) {
                warn!("Failed to load cached ESPN login state from {state_path:?}; starting a fresh session. ({e:#})");
            }
        }
        Err(SessionStateLoadError::NotFound) => {
            debug!("No stored session at {state_path:?}")
        }
        Err(e) => {
            warn!("Failed to load cached ESPN login state from {state_path:?}; starting a fresh session. ({e})")
        }
    }
}

fn persist_session(page: &impl BrowserPage, state_path: &Path) {
    let saved = page
        .cookies()
        .and_then(|cookies| SessionState { cookies }.save(state_path));
    match saved {
        Ok(()) => debug!("Persisted session state to {state_path:?}"),
        Err(e) => warn!(
            "Failed to persist session state to {state_path:?}; future sessions may require login. ({e:#})"
        ),
    }
}

/// Fetches one schedule with an already opened page and saves it.
pub fn download_with(page: &impl BrowserPage, config: &FetchConfig) -> anyhow::Result<PathBuf> {
    let output_path = config.output_path();
    fs_err::create_dir_all(&config.output_dir)?;
    restore_session(page, &config.state_path);
    let html = get_schedule_html(page, config, || config.resolve_credentials())?;
    persist_session(page, &config.state_path);
    fs_err::write(&output_path, html)?;
    info!("Saved schedule to {output_path:?}");
    Ok(output_path)
}

/// Returns the cached page when present, otherwise downloads it with Chromium.
pub fn download_schedule_html(config: &FetchConfig) -> anyhow::Result<PathBuf> {
    let output_path = config.output_path();
    if output_path.exists() && !config.force_refresh {
        debug!("Using cached schedule {output_path:?}");
        return Ok(output_path);
    }
    let page = ChromePage::launch(config)?;
    download_with(&page, config)
}

/// Where a schedule comes from, as requested on the command line.
#[derive(Clone, Debug, TypedBuilder)]
pub struct ScheduleRequest {
    #[builder(default)]
    pub html: Option<PathBuf>,
    #[builder(default)]
    pub offline: bool,
    #[builder(default)]
    pub league_id: Option<LeagueId>,
    #[builder(default)]
    pub league_name: Option<String>,
    #[builder(default)]
    pub season: Option<Season>,
    #[builder(default)]
    pub download_dir: Option<PathBuf>,
    #[builder(default)]
    pub refresh: bool,
    #[builder(default = true)]
    pub headless: bool,
    #[builder(default)]
    pub username: Option<String>,
    #[builder(default)]
    pub password: Option<String>,
}

#[derive(Debug)]
pub enum FetchPlan {
    Existing(PathBuf),
    Download(FetchConfig),
}

/// Decides between a local file and a download without touching the network.
pub fn plan_fetch(request: &ScheduleRequest, leagues: &LeagueConfig) -> Result<FetchPlan, FetchError> {
    if let Some(html) = &request.html {
        if html.exists() {
            return Ok(FetchPlan::Existing(html.clone()));
        }
        if request.offline {
            return Err(FetchError::MissingInput(format!(
                "HTML file {html:?} does not exist. Drop --offline to download it."
            )));
        }
    }
    if request.offline {
        return Err(FetchError::MissingInput(
            "No HTML file supplied. Drop --offline and pass --league-id or --league to download it."
                .to_owned(),
        ));
    }

    let league_id = leagues
        .resolve_league_id(request.league_id, request.league_name.as_deref())?
        .ok_or_else(|| {
            FetchError::MissingInput(
                "League information is required to download schedules. Specify --league-id or --league."
                    .to_owned(),
            )
        })?;
    let season = request.season.ok_or_else(|| {
        FetchError::MissingInput("--season is required when downloading schedules.".to_owned())
    })?;

    let (output_dir, output_filename) = match &request.html {
        Some(html) => (
            html.parent().map(Path::to_owned).unwrap_or_default(),
            html.file_name().map(|name| name.to_string_lossy().into_owned()),
        ),
        None => {
            let dir = match (&request.download_dir, &request.league_name) {
                (Some(dir), _) => dir.clone(),
                (None, Some(name)) => Path::new(DEFAULT_DOWNLOAD_ROOT).join(name),
                (None, None) => Path::new(DEFAULT_DOWNLOAD_ROOT).join(format!("league_{league_id}")),
            };
            (dir, None)
        }
    };

    Ok(FetchPlan::Download(
        FetchConfig::builder()
            .league_id(league_id)
            .season(season)
            .output_dir(output_dir)
            .output_filename(output_filename)
            .username(request.username.clone())
            .password(request.password.clone())
            .force_refresh(request.refresh)
            .headless(request.headless)
            .build(),
    ))
}

/// The path of a local schedule, downloading it first when necessary.
pub fn ensure_schedule_file(
    request: &ScheduleRequest,
    leagues: &LeagueConfig,
) -> anyhow::Result<PathBuf> {
    match plan_fetch(request, leagues)? {
        FetchPlan::Existing(path) => Ok(path),
        FetchPlan::Download(config) => download_schedule_html(&config),
    }
}
