mod cli;

use std::io::Read;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, WatchArgs};
use filetrigger::trigger::{DEFAULT_DEBOUNCE, DEFAULT_QUEUE_DEPTH};
use filetrigger::{BoxError, ErrorCollector, FileTriggerRunner, Trigger, TriggerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Watch(args) => watch(args).await,
        Commands::Write { path, mode } => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
            filetrigger::write_file_atomic(&path, &data, mode)
                .with_context(|| format!("Failed to write {}", path.display()))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "filetrigger=debug"
    } else {
        "filetrigger=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn watch(args: WatchArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => TriggerConfig::load_file(path),
        None => TriggerConfig::load(Path::new(".")),
    };
    let recursive = args.recursive(&config);
    let debounce = args
        .debounce_ms
        .map(Duration::from_millis)
        .or(config.debounce())
        .unwrap_or(DEFAULT_DEBOUNCE);
    let queue_depth = args
        .queue_depth
        .or(config.queue_depth)
        .unwrap_or(DEFAULT_QUEUE_DEPTH);

    let failures = Arc::new(Mutex::new(ErrorCollector::new()));
    let action = CommandAction {
        argv: args.command,
        json: args.json,
        keep_going: args.keep_going,
        failures: Arc::clone(&failures),
    };

    let mut runner = FileTriggerRunner::new(&args.path, recursive, move |trigger| {
        action.run(trigger)
    })
    .with_debounce(debounce)
    .with_queue_depth(queue_depth);
    let stop = runner.stop_handle();

    // The runner blocks; keep it off the async workers so Ctrl-C can still be observed.
    let mut task = tokio::task::spawn_blocking(move || runner.start());
    let outcome = tokio::select! {
        res = &mut task => res,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, stopping");
            // Stop is a no-op until the runner is running, so repeat until it takes.
            loop {
                stop.stop();
                tokio::select! {
                    res = &mut task => break res,
                    _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                }
            }
        }
    };
    outcome
        .context("Watch task panicked")?
        .with_context(|| format!("Failed to watch {}", args.path.display()))?;

    let failures = std::mem::take(&mut *failures.lock().unwrap_or_else(PoisonError::into_inner));
    if let Err(failures) = failures.into_result() {
        for message in failures.messages() {
            error!("{message}");
        }
        bail!("{} command run(s) failed", failures.len());
    }
    Ok(())
}

/// Runs the user's command for each trigger.
struct CommandAction {
    argv: Vec<String>,
    json: bool,
    keep_going: bool,
    failures: Arc<Mutex<ErrorCollector>>,
}

impl CommandAction {
    fn run(&self, trigger: &Trigger) -> Result<(), BoxError> {
        if self.json {
            println!("{}", serde_json::to_string(trigger)?);
        }
        match self.spawn(trigger) {
            Ok(()) => Ok(()),
            Err(err) if self.keep_going => {
                warn!(kind = %trigger.kind, "{err}");
                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .add(err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn spawn(&self, trigger: &Trigger) -> Result<(), BoxError> {
        let (program, rest) = self.argv.split_first().ok_or("no command given")?;
        let status = Command::new(program)
            .args(rest)
            .env("FILETRIGGER_KIND", trigger.kind.as_str())
            .env("FILETRIGGER_PATH", &trigger.path)
            .status()
            .map_err(|err| format!("failed to run {program}: {err}"))?;
        if !status.success() {
            return Err(format!("{program} exited with {status}").into());
        }
        Ok(())
    }
}
