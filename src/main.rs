//! Drover - consumer daemon lifecycle controller.
//!
//! Main entry point: load the configuration, build the logging
//! backend, detach unless running in the foreground, then route
//! signals until a shutdown request stops the main loop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, error, info};

use drover_daemon::config::{load_config, Config};
use drover_daemon::daemonize::{daemonize, DaemonRequest};
use drover_daemon::diagnostics;
use drover_daemon::lifecycle::LifecycleController;
use drover_daemon::logging::setup_logging;
use drover_daemon::signal::install_signal_handlers;

/// Drover CLI.
#[derive(Parser)]
#[command(name = "drover")]
#[command(about = "Signal-driven lifecycle controller for consumer daemons")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: PathBuf,

    /// Run in the foreground in debug mode
    #[arg(short, long)]
    foreground: bool,
}

const IDLE_TICK: Duration = Duration::from_millis(250);

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Startup failures land on stderr; the logging sink may not
            // exist yet and the process is still attached to the shell.
            eprintln!("ERROR: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;

    // The logging sinks are synchronous on purpose: daemonize() forks,
    // and a writer thread spawned here would not survive it.
    setup_logging(&config.logging, cli.foreground)?;

    if !cli.foreground {
        let mut request = DaemonRequest::new();
        if let Some(pidfile) = &config.pidfile {
            request = request.pid_file(pidfile);
        }
        if let Some(user) = &config.user {
            request = request.run_as_user(user);
        }
        let detached = daemonize(request)?;
        info!(
            "Running detached, PID file at {}",
            detached.pid_file().display()
        );
    }

    diagnostics::register_current_thread("main");

    let controller = LifecycleController::new();
    let listener = install_signal_handlers(&controller)?;

    let shutdown = controller.clone();
    controller.set_shutdown_handler(move || shutdown.set_running(false));

    let config_path = cli.config.clone();
    controller.set_rehash_handler(move || match load_config(&config_path) {
        Ok(rehashed) => info!(
            "Configuration rehashed, {} consumer(s) defined",
            rehashed.consumers().len()
        ),
        Err(error) => error!(
            "Rehash failed, keeping the previous configuration: {}",
            error
        ),
    });

    controller.set_running(true);
    info!("Main loop started");
    run_loop(&controller, &config);

    listener.close();
    diagnostics::deregister_current_thread();
    info!("Main loop stopped");
    Ok(())
}

fn run_loop(controller: &LifecycleController, config: &Config) {
    let poll = config.poll_duration();
    let monitoring = config.monitoring_enabled();
    let mut last_poll = Instant::now();

    while controller.is_running() {
        std::thread::sleep(IDLE_TICK);
        if let Some(interval) = poll {
            if last_poll.elapsed() >= interval {
                last_poll = Instant::now();
                if monitoring {
                    debug!("Poll interval elapsed, consumers are idle");
                }
            }
        }
    }
}
