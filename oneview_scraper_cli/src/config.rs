use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use oneview_scraper_cli::runner::RunnerConfig;
use oneview_scraper_cli::scraper::{FormState, PortalConfig, DEFAULT_PORTAL_URL};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fetch and accumulate OneView results", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Work through the roll number queue, saving after every entry
    Run {
        #[command(flatten)]
        stores: StoreArgs,

        /// Pause between roll numbers, in milliseconds
        #[arg(long, env = "ONEVIEW_DELAY_MS", default_value_t = 100)]
        delay_ms: u64,

        /// Also write a CSV export here once the queue is drained
        #[arg(long)]
        csv: Option<PathBuf>,

        #[command(flatten)]
        portal: PortalArgs,
    },

    /// Look up a single roll number and print the record as JSON
    Fetch {
        /// Roll number to look up
        #[arg(short, long)]
        roll: String,

        #[command(flatten)]
        portal: PortalArgs,
    },

    /// Render the result store as CSV, and optionally as an xlsx result sheet
    Export {
        /// Result store to read
        #[arg(long, env = "ONEVIEW_RESULTS", default_value = "out/results.json")]
        results: PathBuf,

        /// CSV file to write
        #[arg(short, long, default_value = "out/results.csv")]
        out: PathBuf,

        /// Also write the result sheet with summary formulas here
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Queue file, one roll number per line
    #[arg(long, env = "ONEVIEW_QUEUE", default_value = "data/roll_numbers.txt")]
    pub queue: PathBuf,

    /// Result store (JSON array)
    #[arg(long, env = "ONEVIEW_RESULTS", default_value = "out/results.json")]
    pub results: PathBuf,

    /// Append-only log of attempted roll numbers
    #[arg(long, env = "ONEVIEW_AUDIT_LOG", default_value = "logs/attempts.log")]
    pub audit_log: PathBuf,
}

#[derive(Args, Debug)]
pub struct PortalArgs {
    /// Result page of the portal
    #[arg(long, env = "ONEVIEW_URL", default_value = DEFAULT_PORTAL_URL)]
    pub portal_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "ONEVIEW_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Stop retrying a failing request after this many seconds
    #[arg(long, env = "ONEVIEW_MAX_RETRY_SECS", default_value_t = 60)]
    pub max_retry_secs: u64,

    #[arg(long, env = "ONEVIEW_VIEWSTATE", default_value = "", hide_env_values = true)]
    pub view_state: String,

    #[arg(long, env = "ONEVIEW_VIEWSTATE_GENERATOR", default_value = "")]
    pub view_state_generator: String,

    #[arg(long, env = "ONEVIEW_EVENT_VALIDATION", default_value = "", hide_env_values = true)]
    pub event_validation: String,

    /// Cookie header sent with every request (e.g. the ASP.NET session id)
    #[arg(long, env = "ONEVIEW_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,
}

impl PortalArgs {
    pub fn portal_config(&self) -> PortalConfig {
        PortalConfig {
            url: self.portal_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retry: Duration::from_secs(self.max_retry_secs),
            form: FormState {
                view_state: self.view_state.clone(),
                view_state_generator: self.view_state_generator.clone(),
                event_validation: self.event_validation.clone(),
            },
            session_cookie: self.cookie.clone(),
            ..PortalConfig::default()
        }
    }
}

impl StoreArgs {
    pub fn runner_config(&self, delay_ms: u64) -> RunnerConfig {
        RunnerConfig {
            queue_path: self.queue.clone(),
            results_path: self.results.clone(),
            audit_path: self.audit_log.clone(),
            delay: Duration::from_millis(delay_ms),
        }
    }
}
