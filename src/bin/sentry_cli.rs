use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sound_sentry::engine::{SentryHandle, SyntheticBackend, SystemTimeSource};
use sound_sentry::fixtures::{ExpectationDiff, FixtureCatalog, FixtureProcessor};
use sound_sentry::notify::{LogSink, NotificationRequest, NotificationSink};
use sound_sentry::{EventToggles, SentryConfig};

#[derive(Parser, Debug)]
#[command(
    name = "sentry_cli",
    about = "Deterministic replay harness for the sound event notifier"
)]
struct Cli {
    /// Override directory containing replay fixtures (defaults to fixtures/)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a fixture script and optionally compare against expectations
    Replay {
        #[arg(long)]
        fixture: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the synthetic classifier live and stream notifications to stdout
    Watch(WatchArgs),
    /// List available fixtures on disk
    DumpFixtures,
    /// Post one probe notification on the fallback channel
    Probe,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Seconds to run before stopping (0 waits for Ctrl+C)
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,
    /// Watch for baby crying
    #[arg(long)]
    baby: bool,
    /// Watch for breaking glass
    #[arg(long)]
    glass: bool,
    /// Watch for gunshots
    #[arg(long)]
    gunshot: bool,
    /// Score threshold override
    #[arg(long)]
    threshold: Option<f32>,
    /// Maximum categories per inference
    #[arg(long)]
    results: Option<usize>,
    /// Interpreter thread count
    #[arg(long)]
    threads: Option<usize>,
    /// Overlap selector position (0..=3)
    #[arg(long)]
    overlap_position: Option<usize>,
    /// Config file to load instead of the bundled default
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_else(FixtureCatalog::default);

    match cli.command {
        Commands::Replay {
            fixture,
            expect,
            output,
        } => run_replay(&catalog, &fixture, expect, output),
        Commands::Watch(args) => run_watch(args),
        Commands::DumpFixtures => run_dump(&catalog),
        Commands::Probe => run_probe(),
    }
}

fn run_replay(
    catalog: &FixtureCatalog,
    fixture: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let data = catalog.load(fixture, override_expect)?;
    let outcome = FixtureProcessor::new().run(&data.definition);

    emit_report(&data.metadata.name, &outcome, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&outcome) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

fn run_watch(args: WatchArgs) -> Result<ExitCode> {
    tracing_subscriber::fmt::init();

    let mut config = match &args.config {
        Some(path) => SentryConfig::load_from_file(path),
        None => SentryConfig::load(),
    };
    if let Some(position) = args.overlap_position {
        config.classifier.set_overlap_position(position);
    }
    if let Some(threshold) = args.threshold {
        config.classifier.set_score_threshold(threshold);
    }
    if let Some(results) = args.results {
        config.classifier.set_max_results(results);
    }
    if let Some(threads) = args.threads {
        config.classifier.set_num_threads(threads);
    }

    let backend = Arc::new(SyntheticBackend::new(config.synthetic.clone()));
    let handle = SentryHandle::with_parts(
        config,
        backend,
        Arc::new(LogSink::new()),
        Arc::new(SystemTimeSource),
    );
    // The debug HTTP server and its workers want a handle that outlives
    // this function; the watch loop never returns it anyway.
    let handle: &'static SentryHandle = Box::leak(Box::new(handle));
    sound_sentry::http::spawn_if_enabled(handle);

    handle.set_toggles(resolve_toggles(&args));
    let mut notifications = handle.subscribe_notifications();
    handle.start().context("starting classifier engine")?;
    eprintln!("Watching for sound events (Ctrl+C to stop)...");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building watch runtime")?;

    let posted = rt.block_on(async move {
        let mut posted = 0usize;
        let deadline = async {
            if args.duration_secs == 0 {
                std::future::pending::<()>().await;
            } else {
                tokio::time::sleep(Duration::from_secs(args.duration_secs)).await;
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                maybe = notifications.recv() => match maybe {
                    Some(request) => {
                        println!("{}", serde_json::to_string(&request)?);
                        posted += 1;
                    }
                    None => break,
                },
                _ = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        Ok::<usize, anyhow::Error>(posted)
    })?;

    handle.stop().ok();
    eprintln!("Posted {posted} notifications.");
    Ok(ExitCode::from(0))
}

fn resolve_toggles(args: &WatchArgs) -> EventToggles {
    // No kind flags means watch everything; naming kinds narrows the set.
    if !(args.baby || args.glass || args.gunshot) {
        return EventToggles {
            baby_crying: true,
            glass_break: true,
            gunshot: true,
        };
    }
    EventToggles {
        baby_crying: args.baby,
        glass_break: args.glass,
        gunshot: args.gunshot,
    }
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn run_probe() -> Result<ExitCode> {
    let sink = LogSink::new();
    let request = NotificationRequest::probe(0, 0);
    sink.ensure_channel(&request.channel)
        .context("registering fallback channel")?;
    sink.post(&request).context("posting probe notification")?;
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(ExitCode::from(0))
}

fn emit_report(
    fixture: &str,
    outcome: &sound_sentry::fixtures::ReplayOutcome,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let report = ReplayReportPayload {
        fixture,
        cycles: outcome.cycles,
        notification_count: outcome.notifications.len(),
        notifications: &outcome.notifications,
        final_counter: outcome.final_counter,
        faults: &outcome.faults,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct ReplayReportPayload<'a> {
    fixture: &'a str,
    cycles: usize,
    notification_count: usize,
    notifications: &'a [NotificationRequest],
    final_counter: u64,
    #[serde(skip_serializing_if = "slice_empty")]
    faults: &'a [String],
}

fn slice_empty(faults: &&[String]) -> bool {
    faults.is_empty()
}
