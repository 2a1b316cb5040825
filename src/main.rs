use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use gui_harness::capability::{Automation, Capability, CapabilityStatus, VirtualDisplay};
use gui_harness::config;
use gui_harness::harness::Script;
use gui_harness::interrupt;
use gui_harness::orchestrator::{Orchestrator, RunOptions};
use gui_harness::process::ProcessSupervisor;
use gui_harness::runner::{CleanupReport, LaunchReport, RunOutcome, RunSummary};

/// GUI Harness - launch an application, open a file through its UI, screenshot every step
#[derive(Parser, Debug)]
#[command(
    name = "gui-harness",
    version,
    about = "Launch a GUI application, drive its File-Open workflow with synthetic input, and capture each step",
    after_help = "ENVIRONMENT VARIABLES:\n\
        GUI_HARNESS_OUTPUT_DIR          Directory for screenshots\n\
        GUI_HARNESS_LAUNCH_GRACE_MS     Wait after launch before the liveness check (ms)\n\
        GUI_HARNESS_TERMINATE_GRACE_MS  Wait after terminate before killing (ms)\n\
        GUI_HARNESS_TYPE_INTERVAL_MS    Delay between typed characters (ms)\n\
        GUI_HARNESS_SETTLE_SCALE        Multiplier for settle delays (e.g. 0 for dry runs)\n\
        RUST_LOG                        Log filter (overrides --log-level)"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch the target, open a file through its UI and capture each step
    Run {
        /// Path to the application executable
        #[arg(short, long)]
        exe: PathBuf,

        /// File to open in the application
        #[arg(short, long)]
        file: PathBuf,

        /// Output directory for screenshots
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Do not launch the application (headless dry run)
        #[arg(long)]
        skip_launch: bool,

        /// JSON interaction script replacing the built-in open-file workflow
        #[arg(long)]
        script: Option<PathBuf>,

        /// Drive an in-memory display of this size instead of the desktop (WxH)
        #[arg(long, value_name = "WxH")]
        virtual_display: Option<String>,

        /// Override the launch grace period (ms)
        #[arg(long)]
        launch_grace_ms: Option<u64>,

        /// Override the terminate grace period (ms)
        #[arg(long)]
        terminate_grace_ms: Option<u64>,

        /// Skip the JSON manifest next to each screenshot
        #[arg(long)]
        no_manifest: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,

        /// Arguments passed to the application
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Report whether GUI automation is usable here
    Probe {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match execute(args.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(1)
        }
    }
}

fn execute(command: Commands) -> Result<ExitCode, Box<dyn Error>> {
    match command {
        Commands::Run {
            exe,
            file,
            output_dir,
            skip_launch,
            script,
            virtual_display,
            launch_grace_ms,
            terminate_grace_ms,
            no_manifest,
            json,
            args: target_args,
        } => {
            let mut timings = config::get().timings.clone();
            if let Some(ms) = launch_grace_ms {
                timings.launch_grace = Duration::from_millis(ms);
            }
            if let Some(ms) = terminate_grace_ms {
                timings.terminate_grace = Duration::from_millis(ms);
            }

            let display_size = virtual_display
                .as_deref()
                .map(parse_size)
                .transpose()?;
            let script = script.as_deref().map(Script::from_path).transpose()?;
            let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(config::output_dir()));

            let cancel = match interrupt::install() {
                Ok(flag) => flag,
                Err(err) => {
                    warn!(error = %err, "Could not install signal handlers");
                    interrupt::flag()
                }
            };

            if !json {
                print_banner(&exe, &file, &output_dir, skip_launch, script.as_ref());
            }

            let mut options = RunOptions::new(&exe, &file)
                .output_dir(&output_dir)
                .skip_launch(skip_launch)
                .timings(timings.clone())
                .include_manifest(!no_manifest)
                .cancel(cancel);
            if let Some(script) = script {
                options = options.script(script);
            }

            let supervisor = ProcessSupervisor::new(timings.launch_grace).args(target_args);
            let mut orchestrator = Orchestrator::new(supervisor, options);

            let summary = match display_size {
                Some((width, height)) => orchestrator.run(move || {
                    Capability::probe_with(move || {
                        Ok(Box::new(VirtualDisplay::new(width, height)) as Box<dyn Automation>)
                    })
                }),
                None => orchestrator.run(Capability::probe),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary, &output_dir);
            }

            Ok(ExitCode::from(summary.exit_code()))
        }

        Commands::Probe { json } => {
            let capability = Capability::probe();
            if json {
                println!("{}", serde_json::to_string_pretty(capability.status())?);
            } else {
                match capability.status() {
                    CapabilityStatus::Ready { width, height } => {
                        println!("GUI automation available");
                        println!("  Backend: {}", capability.source_type());
                        println!("  Screen size: {}x{}", width, height);
                    }
                    CapabilityStatus::NoDisplay { reason } => {
                        println!("GUI automation library present, but no display available");
                        println!("  Reason: {}", reason);
                        println!("  This is expected in headless CI environments");
                    }
                    CapabilityStatus::Unavailable { reason } => {
                        println!("GUI automation not available");
                        println!("  Reason: {}", reason);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_banner(
    exe: &Path,
    file: &Path,
    output_dir: &Path,
    skip_launch: bool,
    script: Option<&Script>,
) {
    println!("GUI Harness");
    println!("  Executable: {}", exe.display());
    println!("  File:       {}", file.display());
    println!("  Output:     {}", output_dir.display());
    println!(
        "  Script:     {}",
        script.map_or("open-file (built-in)", |s| s.name.as_str())
    );
    if skip_launch {
        println!("  Skip launch: yes");
    }
    println!();
}

fn print_summary(summary: &RunSummary, output_dir: &Path) {
    println!();
    println!("Run summary");

    match &summary.outcome {
        RunOutcome::Completed => println!("  Outcome: completed"),
        RunOutcome::PreconditionFailed { reason } => {
            println!("  Outcome: precondition failed ({})", reason)
        }
        RunOutcome::LaunchFailed { reason } => println!("  Outcome: launch failed ({})", reason),
    }

    if let Some(status) = &summary.capability {
        println!("  Capability: {}", status);
    }

    match &summary.launch {
        LaunchReport::Skipped => println!("  Launch: skipped"),
        LaunchReport::NotAttempted => println!("  Launch: not attempted"),
        LaunchReport::Launched { pid } => println!("  Launch: pid {}", pid),
        LaunchReport::Failed { error, stdout, stderr, .. } => {
            println!("  Launch: failed ({})", error);
            if !stdout.trim().is_empty() {
                println!("    stdout: {}", stdout.trim());
            }
            if !stderr.trim().is_empty() {
                println!("    stderr: {}", stderr.trim());
            }
        }
    }

    if !summary.steps.is_empty() {
        println!("  Steps:");
        for record in &summary.steps {
            match (record.outcome.artifact(), record.outcome.failure()) {
                (_, Some(cause)) => {
                    println!("    [failed] {}. {}: {}", record.index, record.step, cause)
                }
                (Some(path), None) => println!(
                    "    [ok]     {}. {} -> {}",
                    record.index,
                    record.step,
                    path.display()
                ),
                (None, None) => println!("    [ok]     {}. {}", record.index, record.step),
            }
        }
    }

    if let Some(stop) = &summary.stop_cause {
        println!("  Stopped: {}", stop);
    }
    println!("  Automation success: {}", summary.automation_success);
    if summary.capture_failures > 0 {
        println!("  Capture failures: {}", summary.capture_failures);
    }

    match &summary.cleanup {
        Some(CleanupReport::NotLaunched) => println!("  Cleanup: nothing to clean up"),
        Some(CleanupReport::Terminated { outcome }) => println!("  Cleanup: {:?}", outcome),
        Some(CleanupReport::Failed { error }) => println!("  Cleanup: failed ({})", error),
        None => {}
    }

    if summary.screenshots.is_empty() {
        println!("  No screenshots captured");
    } else {
        println!();
        println!("Screenshots saved to: {}", output_dir.display());
        for path in &summary.screenshots {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            println!("  - {}", name);
        }
    }
}

fn parse_size(value: &str) -> Result<(u32, u32), Box<dyn Error>> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Invalid display size '{}'. Use WxH (e.g. 1280x720)", value))?;
    let width: u32 = w.trim().parse()?;
    let height: u32 = h.trim().parse()?;
    if width == 0 || height == 0 {
        return Err(format!("Display size must be non-zero, got '{}'", value).into());
    }
    Ok((width, height))
}
