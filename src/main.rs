use std::future::Future;
use std::path::Path;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;
use tokio::io::{BufWriter, Stdout};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use showdown::app::logging;
use showdown::prelude::*;

/// Notifications buffered for the stdout event printer before it lags
const EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.config.log_level);

    let mut app = CliApp::new("showdown");
    if matches!(cli.command, Command::Load(_)) {
        app = app.with_interrupt_note(
            "load interrupted; both stores may hold a partial dataset until the next full load",
        );
    }
    app.run(|out| dispatch(cli, out)).await
}

async fn dispatch(cli: Cli, mut out: BufWriter<Stdout>) -> Result<(), AppError> {
    let Cli { config, command } = cli;
    if let Some(url) = &config.database_url {
        info!(database_url = %redact_url(url), "Relational store configured");
    }

    match command {
        Command::Load(args) => load(&config, &args, &mut out).await,
        Command::Bench(args) => bench(&config, &args, &mut out).await,
        Command::Status => status(&config, &mut out).await,
        Command::Stats(args) => stats(&config, &args, &mut out).await,
    }
}

async fn load(config: &Config, args: &LoadArgs, out: &mut BufWriter<Stdout>) -> Result<(), AppError> {
    if args.dry_run {
        info!("Dry run: loading into in-memory stores");
        let writer = DualSinkWriter::new(InMemorySink::mongodb(), InMemorySink::elasticsearch());
        return run_load(writer, args, out).await;
    }

    info!(
        mongodb_url = %redact_url(&config.mongodb_url),
        elasticsearch_url = %redact_url(&config.elasticsearch_url),
        "Connecting to destinations"
    );
    let mongo = MongoSink::connect(&config.mongodb_url).await?;
    let elastic = ElasticsearchSink::new(&config.elasticsearch_url)?;
    run_load(DualSinkWriter::new(mongo, elastic), args, out).await
}

async fn run_load<D, S>(
    writer: DualSinkWriter<D, S>,
    args: &LoadArgs,
    out: &mut BufWriter<Stdout>,
) -> Result<(), AppError>
where
    D: BulkSink,
    S: BulkSink,
{
    let (notifications, events) = event_printer(args.emit_events);
    let progress = ProgressReporter::new(notifications)
        .with_expected_transactions(args.expected_transactions);
    let pipeline = IngestionPipeline::new(writer, args.options()).with_progress(progress);

    let result = match args.on_row_error {
        RowErrorMode::Silent => run_pipeline(pipeline, &args.data_path).await,
        RowErrorMode::Log => run_pipeline(pipeline.with_policy(SkipRows), &args.data_path).await,
        RowErrorMode::Abort => {
            run_pipeline(pipeline.with_policy(AbortOnError), &args.data_path).await
        }
    };
    finish_events(events).await;

    let summary = result.inspect_err(|failure| {
        for entity in Entity::ALL {
            warn!(
                %entity,
                loaded = failure.stats.entity_total(entity),
                "Records loaded before failure"
            );
        }
    })?;
    write_json(&summary, out).await?;
    Ok(())
}

/// Run the pipeline, then close both destinations whatever the outcome
async fn run_pipeline<D, S, P>(
    mut pipeline: IngestionPipeline<D, S, P>,
    data_dir: &Path,
) -> Result<LoadSummary, LoadFailure>
where
    D: BulkSink,
    S: BulkSink,
    P: ErrorPolicy,
{
    let result = pipeline.run(data_dir).await;
    pipeline.writer().close().await;
    result
}

async fn bench(config: &Config, args: &BenchArgs, out: &mut BufWriter<Stdout>) -> Result<(), AppError> {
    if args.user_id.trim().is_empty() {
        return Err(AppError::InvalidArguments("--user must not be blank".to_string()));
    }

    if args.dry_run {
        info!("Dry run: querying empty in-memory stores");
        return run_bench(InMemorySink::mongodb(), InMemorySink::elasticsearch(), args, out).await;
    }

    let mongo = MongoSink::connect(&config.mongodb_url).await?;
    let elastic = ElasticsearchSink::new(&config.elasticsearch_url)?;
    run_bench(mongo, elastic, args, out).await
}

async fn run_bench<A, B>(
    first: A,
    second: B,
    args: &BenchArgs,
    out: &mut BufWriter<Stdout>,
) -> Result<(), AppError>
where
    A: QueryTarget + BulkSink,
    B: QueryTarget + BulkSink,
{
    let (notifications, events) = event_printer(args.emit_events);
    let harness = BenchmarkHarness::new(first, second)
        .with_rotation(args.rotation)
        .with_notifications(notifications);

    let report = harness.run(&args.user_id, args.operations).await;

    for result in [harness.first().close().await, harness.second().close().await] {
        if let Err(error) = result {
            warn!(%error, "Error closing database client");
        }
    }
    drop(harness);
    finish_events(events).await;

    write_json(&report, out).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    connected: bool,
    /// Milliseconds spent connecting and pinging
    response_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    mongodb: Health,
    elasticsearch: Health,
}

async fn status(config: &Config, out: &mut BufWriter<Stdout>) -> Result<(), AppError> {
    let (mongodb, elasticsearch) = tokio::join!(
        check_health(MongoSink::connect(&config.mongodb_url)),
        check_health(async { ElasticsearchSink::new(&config.elasticsearch_url) }),
    );

    write_json(&StatusReport { mongodb, elasticsearch }, out).await?;
    Ok(())
}

/// Connect and ping one destination, timing both
async fn check_health<S, F>(connect: F) -> Health
where
    S: BulkSink,
    F: Future<Output = Result<S, SinkError>>,
{
    let started = Instant::now();
    let outcome = match connect.await {
        Ok(sink) => {
            let pinged = sink.ping().await;
            if let Err(error) = sink.close().await {
                warn!(sink = sink.name(), %error, "Error closing client");
            }
            pinged
        }
        Err(error) => Err(error),
    };
    let response_time = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => Health {
            connected: true,
            response_time,
            error: None,
        },
        Err(error) => {
            warn!(%error, "Destination unreachable");
            Health {
                connected: false,
                response_time,
                error: Some(error.to_string()),
            }
        }
    }
}

async fn stats(config: &Config, args: &StatsArgs, out: &mut BufWriter<Stdout>) -> Result<(), AppError> {
    if args.dry_run {
        info!("Dry run: computing statistics over an empty in-memory store");
        return run_stats(InMemorySink::mongodb(), out).await;
    }

    match args.source {
        StatsSource::Mongodb => {
            info!(mongodb_url = %redact_url(&config.mongodb_url), "Computing transaction statistics");
            run_stats(MongoSink::connect(&config.mongodb_url).await?, out).await
        }
        StatsSource::Elasticsearch => {
            info!(
                elasticsearch_url = %redact_url(&config.elasticsearch_url),
                "Computing transaction statistics"
            );
            run_stats(ElasticsearchSink::new(&config.elasticsearch_url)?, out).await
        }
    }
}

async fn run_stats<T>(target: T, out: &mut BufWriter<Stdout>) -> Result<(), AppError>
where
    T: QueryTarget + BulkSink,
{
    let result = target.analytics().await;
    if let Err(error) = target.close().await {
        warn!(sink = target.name(), %error, "Error closing client");
    }

    write_json(&result?, out).await?;
    Ok(())
}

/// Route notifications to stdout as NDJSON when `enabled`
///
/// The printer task ends once every `Notifications` clone is dropped.
fn event_printer(enabled: bool) -> (Notifications, Option<JoinHandle<()>>) {
    if !enabled {
        return (Notifications::silent(), None);
    }

    let notifier = BroadcastNotifier::new(EVENT_BUFFER);
    let mut receiver = notifier.subscribe();
    let task = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            match receiver.recv().await {
                Ok(notification) => {
                    if let Err(error) = write_json_line(&notification, &mut stdout).await {
                        warn!(%error, "Stopped printing events");
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event printer fell behind; notifications dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    (Notifications::new(notifier), Some(task))
}

async fn finish_events(events: Option<JoinHandle<()>>) {
    if let Some(task) = events
        && let Err(error) = task.await
    {
        warn!(%error, "Event printer task failed");
    }
}
