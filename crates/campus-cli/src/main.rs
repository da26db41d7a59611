use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use campus_acquire::config::{DEFAULT_BASE_URL, DEFAULT_COOKIE_KEY};
use campus_acquire::{Portal, PortalConfig};
use campus_model::month::month_number_or_default;
use campus_model::{
    group_by_date, overall_percentage, AttendanceSummary, RawDocument, SessionToken,
};

#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "Academic portal acquisition and extraction tool")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_HASH"), ")"))]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long, global = true)]
    utc: bool,

    #[command(flatten)]
    portal: PortalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Args)]
struct PortalArgs {
    /// Portal base URL
    #[arg(long, global = true, env = "APP_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Name of the session cookie issued on login
    #[arg(long, global = true, env = "APP_COOKIE_KEY", default_value = DEFAULT_COOKIE_KEY)]
    cookie_key: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// Run Chromium without a window
    #[arg(long, global = true, env = "SELENIUM_HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    headless: bool,

    /// Allow the browser-backed strategies when Chromium is available
    #[arg(long, global = true, env = "CLOUDFLARE_BYPASS_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    automation: bool,

    /// Chromium binary; searched on PATH when unset
    #[arg(long, global = true, env = "CAMPUS_CHROMIUM_PATH")]
    chromium: Option<PathBuf>,

    /// Skip the random pauses between attempts
    #[arg(long, global = true)]
    no_jitter: bool,
}

impl PortalArgs {
    fn config(&self) -> PortalConfig {
        PortalConfig {
            base_url: self.base_url.clone(),
            cookie_key: self.cookie_key.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            automation_enabled: self.automation,
            headless: self.headless,
            chromium_path: self.chromium.clone(),
            jitter: !self.no_jitter,
            ..Default::default()
        }
    }
}

#[derive(Args)]
struct TokenArg {
    /// Session token from `campus login`
    #[arg(short, long, env = "CAMPUS_TOKEN")]
    token: String,
}

impl TokenArg {
    fn session(&self) -> SessionToken {
        SessionToken::new(self.token.trim())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the session token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "CAMPUS_PASSWORD")]
        password: String,
    },

    /// Day-by-day attendance for one month, with a summary
    Attendance {
        #[command(flatten)]
        token: TokenArg,

        /// Month as a number, name, or abbreviation (e.g. "10", "Oct")
        #[arg(short, long, default_value = "October")]
        month: String,

        /// Year; defaults to the current year
        #[arg(short, long)]
        year: Option<i32>,

        #[arg(short, long, default_value_t = 1)]
        semester: u32,
    },

    /// Per-subject attendance ratios
    Subjects {
        #[command(flatten)]
        token: TokenArg,

        #[arg(short, long, default_value_t = 1)]
        semester: u32,
    },

    /// Weekly timetable
    Timetable {
        #[command(flatten)]
        token: TokenArg,
    },

    /// Internal assessment results
    Results {
        #[command(flatten)]
        token: TokenArg,
    },

    /// End-semester grade cards linked from the university results page
    ExamResults {
        #[command(flatten)]
        token: TokenArg,
    },

    /// Student profile fields
    Profile {
        #[command(flatten)]
        token: TokenArg,
    },

    /// Run an extractor on a saved page, without touching the network
    Parse {
        /// Which extractor to run
        #[arg(short, long, value_enum)]
        kind: PageKind,

        /// Path to the saved HTML or CSV file
        file: PathBuf,
    },
}

#[derive(Clone, clap::ValueEnum)]
enum PageKind {
    /// Day-by-day attendance grid
    Attendance,
    /// Subject attendance ratios
    Subjects,
    /// Timetable page or CSV export
    Timetable,
    Results,
    /// One end-semester grade card
    ExamResult,
    Profile,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Cap noisy parsing, browser and resolver crates at debug/trace
    let level = match cli.log_level {
        LogLevel::Error => "error",
        LogLevel::Warn  => "warn",
        LogLevel::Info  => "info",
        LogLevel::Debug => "debug,selectors=warn,html5ever=warn,chromiumoxide=warn,hickory_proto=warn,hickory_resolver=warn",
        LogLevel::Trace => "trace,selectors=warn,html5ever=warn,chromiumoxide=warn,hickory_proto=warn,hickory_resolver=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    // Logs go to stderr; stdout carries the JSON output.
    if cli.utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }

    let output = run(&cli.portal, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn connect(args: &PortalArgs) -> Portal {
    let config = args.config();
    tracing::info!(base_url = %config.base_url, "Connecting to portal");
    Portal::from_config(config)
}

async fn run(args: &PortalArgs, command: Commands) -> Result<serde_json::Value> {
    let value = match command {
        Commands::Parse { kind, file } => {
            tracing::info!(file = %file.display(), "Parsing saved page");
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            extract(&kind, &RawDocument::new(text))?
        }
        Commands::Login { username, password } => {
            let token = connect(args).login(&username, &password).await?;
            json!({ "token": token })
        }
        Commands::Attendance {
            token,
            month,
            year,
            semester,
        } => {
            let month = month_number_or_default(&month);
            let year = year.unwrap_or_else(|| chrono::Local::now().year());
            tracing::info!(month, year, semester, "Fetching attendance");
            let doc = connect(args)
                .attendance_page(&token.session(), month, year, semester)
                .await?;
            extract(&PageKind::Attendance, &doc)?
        }
        Commands::Subjects { token, semester } => {
            let doc = connect(args)
                .subject_attendance_page(&token.session(), semester)
                .await?;
            extract(&PageKind::Subjects, &doc)?
        }
        Commands::Timetable { token } => {
            let doc = connect(args).timetable_export(&token.session()).await?;
            extract(&PageKind::Timetable, &doc)?
        }
        Commands::Results { token } => {
            let doc = connect(args).results_page(&token.session()).await?;
            extract(&PageKind::Results, &doc)?
        }
        Commands::ExamResults { token } => {
            let exams = connect(args).exam_results(&token.session()).await?;
            json!({ "exams": exams })
        }
        Commands::Profile { token } => {
            let doc = connect(args).profile_page(&token.session()).await?;
            extract(&PageKind::Profile, &doc)?
        }
    };
    Ok(value)
}

fn extract(kind: &PageKind, doc: &RawDocument) -> Result<serde_json::Value> {
    let value = match kind {
        PageKind::Attendance => {
            let extracted = campus_parse::extract_attendance_grid(doc);
            let summary = AttendanceSummary::from_records(&extracted.records);
            warn_all(campus_validate::validate_summary(&summary));
            tracing::info!(
                periods = summary.total_periods,
                percentage = summary.percentage,
                "Extracted attendance grid"
            );
            json!({
                "dates": group_by_date(&extracted.records),
                "summary": summary,
                "diagnostic": extracted.diagnostic,
            })
        }
        PageKind::Subjects => {
            let extracted = campus_parse::extract_subject_attendance(doc);
            warn_all(campus_validate::validate_subject_records(&extracted.records));
            tracing::info!(subjects = extracted.records.len(), "Extracted subject attendance");
            json!({
                "subjects": extracted.records,
                "overall_percentage": overall_percentage(&extracted.records),
                "diagnostic": extracted.diagnostic,
            })
        }
        PageKind::Timetable => {
            let extraction = campus_parse::extract_timetable(doc);
            serde_json::to_value(&extraction)?
        }
        PageKind::Results => {
            let extracted = campus_parse::extract_results(doc);
            tracing::info!(results = extracted.records.len(), "Extracted results");
            serde_json::to_value(&extracted)?
        }
        PageKind::ExamResult => match campus_parse::extract_exam_result(doc) {
            Some(exam) => serde_json::to_value(&exam)?,
            None => {
                tracing::warn!("No course rows found on grade card");
                serde_json::Value::Null
            }
        },
        PageKind::Profile => serde_json::to_value(campus_parse::extract_profile(doc))?,
    };
    Ok(value)
}

fn warn_all(errors: Vec<campus_validate::ValidationError>) {
    for e in errors {
        tracing::warn!("{e}");
    }
}
