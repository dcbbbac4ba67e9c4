//! CLI entry point for the parking forecast tool.
//!
//! Provides subcommands for logging sensor events, aggregating the event log,
//! fitting and evaluating the availability model, and querying predictions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_forecast::aggregate::{ProbabilityTable, aggregate_events, group_means};
use parking_forecast::config::Settings;
use parking_forecast::evaluate::evaluate;
use parking_forecast::events::{Event, Status, parse_sensor_message, read_events};
use parking_forecast::fetch::{DEFAULT_CHANNEL_RESULTS, load_source, resolve_source};
use parking_forecast::model::ModelArtifact;
use parking_forecast::output::{
    append_event, format_best_time, print_json, print_pretty, write_json,
};
use parking_forecast::predict::Predictor;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "parking_forecast")]
#[command(about = "Predict parking slot availability from sensor logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append one sensor event to the event log
    LogEvent {
        /// Raw sensor message, e.g. "SLOT,1,OCCUPIED"
        #[arg(short, long, conflicts_with_all = ["slot", "status"])]
        message: Option<String>,

        /// Slot identifier
        #[arg(long, requires = "status")]
        slot: Option<String>,

        /// Slot status (free/occupied, 1/0)
        #[arg(long, requires = "slot")]
        status: Option<String>,

        /// CSV event log to append to (defaults to PARKING_EVENT_LOG)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Aggregate an event log into the hour/day-of-week probability table
    Aggregate {
        /// Path to file or URL to fetch (defaults to PARKING_EVENT_LOG)
        #[arg(value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Fetch the CSV export of this sensor channel instead
        #[arg(long, conflicts_with = "source")]
        channel: Option<u64>,

        /// Number of channel entries to request with --channel
        #[arg(long, default_value_t = DEFAULT_CHANNEL_RESULTS)]
        results: u32,

        /// JSON file to write the table to
        #[arg(short, long, default_value = "prob_table.json")]
        output: String,

        /// Also write the long-form (hour, day, slot) means to this JSON file
        #[arg(long)]
        long_output: Option<String>,
    },
    /// Aggregate an event log and save the fitted model
    Fit {
        /// Path to file or URL to fetch (defaults to PARKING_EVENT_LOG)
        #[arg(value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Fetch the CSV export of this sensor channel instead
        #[arg(long, conflicts_with = "source")]
        channel: Option<u64>,

        /// Number of channel entries to request with --channel
        #[arg(long, default_value_t = DEFAULT_CHANNEL_RESULTS)]
        results: u32,

        /// Model artifact to write (defaults to PARKING_MODEL_PATH)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Rank slots by their chance of being free
    Predict {
        /// Hour of day, fractional values allowed (e.g. 10.25)
        #[arg(long, allow_hyphen_values = true)]
        hour: String,

        /// Day of week, 0 = Monday
        #[arg(long, allow_hyphen_values = true)]
        day: String,

        /// Number of slots to list (defaults to PARKING_TOP_N)
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Model artifact to load (defaults to PARKING_MODEL_PATH)
        #[arg(short, long)]
        model: Option<String>,

        /// Print the ranking as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Find the hour and weekday with the highest average availability
    BestTime {
        /// Model artifact to load (defaults to PARKING_MODEL_PATH)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Score the model against an aggregated event log
    Evaluate {
        /// Path to file or URL to fetch (defaults to PARKING_EVENT_LOG)
        #[arg(value_name = "FILE_OR_URL")]
        source: Option<String>,

        /// Fetch the CSV export of this sensor channel instead
        #[arg(long, conflicts_with = "source")]
        channel: Option<u64>,

        /// Number of channel entries to request with --channel
        #[arg(long, default_value_t = DEFAULT_CHANNEL_RESULTS)]
        results: u32,

        /// Model artifact to load (defaults to PARKING_MODEL_PATH)
        #[arg(short, long)]
        model: Option<String>,

        /// Optional JSON file to write the report to
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let settings = Settings::from_env()?;
    let _file_guard = init_tracing(&settings.log_file_path)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::LogEvent {
            message,
            slot,
            status,
            output,
        } => {
            let (slot_id, status) = match (message, slot, status) {
                (Some(message), _, _) => parse_sensor_message(&message)?,
                (None, Some(slot), Some(status)) => {
                    let status = Status::parse(&status)
                        .with_context(|| format!("unknown slot status '{status}'"))?;
                    (slot, status)
                }
                _ => anyhow::bail!("either --message or both --slot and --status are required"),
            };

            let output = output.unwrap_or_else(|| settings.event_log.clone());
            append_event(&output, &Event::now(&slot_id, status))?;
        }
        Commands::Aggregate {
            source,
            channel,
            results,
            output,
            long_output,
        } => {
            let events = load_events(&settings, source, channel, results).await?;
            let table = aggregate_events(&events);

            write_json(&output, &table)?;
            if let Some(long_output) = long_output {
                let observations: Vec<_> = events.iter().filter_map(Event::observe).collect();
                write_json(&long_output, &group_means(&observations))?;
            }

            info!(
                output = %output,
                slots = table.slots().len(),
                buckets = table.rows().len(),
                "Aggregated training table created"
            );
        }
        Commands::Fit {
            source,
            channel,
            results,
            model,
        } => {
            let events = load_events(&settings, source, channel, results).await?;
            let table = aggregate_events(&events);
            if table.is_empty() {
                anyhow::bail!("event log has no usable rows, nothing to fit");
            }

            let model = model.unwrap_or_else(|| settings.model_path.clone());
            ModelArtifact::fit(&table).save(Path::new(&model))?;

            info!(model = %model, slots = table.slots().len(), "Parking probability model saved");
        }
        Commands::Predict {
            hour,
            day,
            top_n,
            model,
            json,
        } => {
            let predictor = load_predictor(&settings, model)?;
            let top_n = top_n.unwrap_or(settings.top_n);

            match predictor.compute_predictions_from_form(Some(&hour), Some(&day), top_n) {
                Ok(ranking) => {
                    if json {
                        print_json(&ranking)?;
                    } else {
                        print_pretty(&ranking);
                    }
                }
                Err(e) => {
                    error!(status = e.http_status(), error = %e, "Prediction request failed");
                    return Err(e.into());
                }
            }
        }
        Commands::BestTime { model } => {
            let predictor = load_predictor(&settings, model)?;
            let best = predictor.best_time()?;
            info!("{}", format_best_time(&best));
        }
        Commands::Evaluate {
            source,
            channel,
            results,
            model,
            output,
        } => {
            let predictor = load_predictor(&settings, model)?;
            let events = load_events(&settings, source, channel, results).await?;
            let table: ProbabilityTable = aggregate_events(&events);

            let report = evaluate(&predictor, &table)?;
            match output {
                Some(path) => {
                    write_json(&path, &report)?;
                    info!(path = %path, "Evaluation report saved");
                }
                None => print_json(&report)?,
            }
        }
    }

    Ok(())
}

/// Colored stderr logs plus a JSON log file rolled daily.
///
/// The returned guard flushes the file writer and must outlive the program.
fn init_tracing(log_file_path: &str) -> Result<WorkerGuard> {
    let log_dir = Path::new(log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("parking_forecast.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

/// Reads the event log named on the command line, the channel export, or the
/// configured log file, in that order of preference.
#[tracing::instrument(skip(settings))]
async fn load_events(
    settings: &Settings,
    source: Option<String>,
    channel: Option<u64>,
    results: u32,
) -> Result<Vec<Event>> {
    let source = resolve_source(source, channel, results, &settings.event_log);

    let bytes = load_source(&source, settings.api_key.as_deref()).await?;
    let events = read_events(bytes.as_slice())?;

    info!(source = %source, rows = events.len(), "Event log read");
    Ok(events)
}

/// Loads the model artifact once and wraps it in a [`Predictor`].
fn load_predictor(settings: &Settings, model: Option<String>) -> Result<Predictor> {
    let model = model.unwrap_or_else(|| settings.model_path.clone());
    let artifact = ModelArtifact::load(Path::new(&model))?;
    info!(model = %model, slots = artifact.slot_names.len(), "Model loaded");
    Ok(Predictor::from_artifact(artifact))
}
