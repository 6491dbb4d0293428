use std::path::PathBuf;
use std::time::Duration;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use alexa_cleanup_lib::api::AlexaClient;
use alexa_cleanup_lib::config::{
    resolve_session, NoPrompt, ProvidedConfig, Session, Settings, DEFAULT_FILTER_TEXT,
};
use alexa_cleanup_lib::errors::{CleanupError, CleanupResult};
use alexa_cleanup_lib::pipeline::Cleaner;
use alexa_cleanup_lib::report::Reporter;
use alexa_cleanup_lib::setup::{print_banner, TerminalPrompter};

/// Delete Alexa smart-home devices whose description matches a filter.
/// Values not given as flags or environment variables are prompted for.
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Amazon API host (e.g., na-api-alexa.amazon.com)
    #[arg(long, env = "ALEXA_HOST")]
    host: Option<String>,

    /// Full Cookie header value
    #[arg(long, env = "ALEXA_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    /// x-amzn-alexa-app header value
    #[arg(long = "alexa-app", env = "ALEXA_APP", hide_env_values = true)]
    alexa_app: Option<String>,

    /// Skill identifier from a captured DELETE URL
    #[arg(long = "delete-skill", env = "ALEXA_DELETE_SKILL")]
    delete_skill: Option<String>,

    /// Delete devices whose description (entities) or manufacturer (endpoints) contains this text
    #[arg(long, default_value = DEFAULT_FILTER_TEXT)]
    filter: String,

    /// Pause between delete attempts, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Where data.json and graphql.json are written
    #[arg(long, default_value = ".")]
    snapshot_dir: PathBuf,

    /// Do not write raw listing snapshots
    #[arg(long)]
    no_snapshots: bool,

    /// Fail instead of prompting for missing values
    #[arg(long)]
    non_interactive: bool,

    /// Log request and response details to stderr
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn provided(&self) -> ProvidedConfig {
        ProvidedConfig {
            host: self.host.clone(),
            cookie: self.cookie.clone(),
            alexa_app: self.alexa_app.clone(),
            delete_skill: self.delete_skill.clone(),
        }
    }

    fn settings(&self) -> CleanupResult<Settings> {
        if self.filter.is_empty() {
            return Err(CleanupError::EmptyFilter);
        }
        Ok(Settings {
            filter_text: self.filter.clone(),
            delay: self.delay_ms.map(Duration::from_millis),
            snapshots: !self.no_snapshots,
            snapshot_dir: self.snapshot_dir.clone(),
        })
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn configure(args: &Args) -> CleanupResult<(Session, Settings)> {
    let settings = args.settings()?;

    print_banner("Alexa Device Deletion Script - Configuration");
    let provided = args.provided();
    let session = if args.non_interactive {
        resolve_session(&provided, &mut NoPrompt)?
    } else {
        resolve_session(&provided, &mut TerminalPrompter::stdin())?
    };
    print_banner("Configuration complete!");

    Ok((session, settings))
}

fn exit_with(err: &CleanupError) -> ! {
    eprintln!("ERROR: {}", err);
    eprintln!("{}", err.diagnostics());
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();
    init_tracing(args.debug);

    let (session, settings) = match configure(&args) {
        Ok(resolved) => resolved,
        Err(err) => exit_with(&err),
    };
    let client = match AlexaClient::new(session) {
        Ok(client) => client,
        Err(err) => exit_with(&err),
    };

    let cleaner = Cleaner::new(client, settings);
    let mut reporter = Reporter::stdout();
    let report = cleaner.run(&mut reporter).await;

    if report.any_aborted() {
        std::process::exit(1);
    }
    Ok(())
}
