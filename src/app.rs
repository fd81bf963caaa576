//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - sets up logging and configuration
//! - builds the coordinator over the built-in models
//! - dispatches to the headless commands or the TUI

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::cli::{Command, FitArgs, GlobalArgs, InspectArgs, TuiArgs};
use crate::config::GeneratorConfig;
use crate::domain::{BrdfModelId, JobReport};
use crate::error::AppError;
use crate::io::TableStore;
use crate::jobs::Coordinator;
use crate::models::ModelRegistry;
use crate::report;

pub mod session;

pub use session::Session;

const SUBCOMMANDS: [&str; 4] = ["list", "fit", "inspect", "tui"];

/// Entry point for the `ltcgen` binary.
pub fn run() -> Result<(), AppError> {
    // `ltcgen` and `ltcgen -o out` behave like `ltcgen tui ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    let default_level = match cli.command {
        Command::Tui(_) => 0,
        _ => 2,
    };
    init_logging(&cli.global, default_level);

    let mut config = GeneratorConfig::from_env()?;
    apply_global_args(&mut config, &cli.global);
    config.validate()?;
    log::debug!("{config:?}");

    match cli.command {
        Command::List => handle_list(&config),
        Command::Fit(args) => handle_fit(&config, args),
        Command::Inspect(args) => handle_inspect(&config, args),
        Command::Tui(args) => handle_tui(&config, args),
    }
}

pub fn log_filter_from_level(level: u8) -> log::LevelFilter {
    match level {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Logs go to stderr. `RUST_LOG` takes precedence over the flags.
fn init_logging(args: &GlobalArgs, default_level: u8) {
    let level = if args.verbose {
        4
    } else {
        args.log_level.unwrap_or(default_level)
    };
    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            let top_level_module = record
                .module_path()
                .and_then(|p| p.split("::").next())
                .unwrap_or("?");
            writeln!(
                buf,
                "{:5} [{}]: {}",
                record.level(),
                top_level_module,
                record.args()
            )
        })
        .filter_level(log_filter_from_level(level))
        .parse_default_env()
        .try_init();
}

fn apply_global_args(config: &mut GeneratorConfig, args: &GlobalArgs) {
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(size) = args.table_size {
        config.table_size = size;
    }
    if let Some(samples) = args.samples {
        config.sample_count = samples;
    }
    if let Some(threads) = args.threads {
        config.worker_threads = threads;
    }
}

fn build_session(config: &GeneratorConfig) -> Result<Session, AppError> {
    let coordinator = Coordinator::new(
        ModelRegistry::builtin(),
        TableStore::new(&config.output_dir),
        Arc::new(config.fit_config()),
        config.worker_threads,
    )?;
    coordinator.set_resume(config.resume);
    Ok(Session::new(coordinator))
}

fn handle_list(config: &GeneratorConfig) -> Result<(), AppError> {
    let session = build_session(config)?;
    println!(
        "{}",
        report::format_model_list(&session.rows(), session.coordinator().store())
    );
    Ok(())
}

fn handle_fit(config: &GeneratorConfig, args: FitArgs) -> Result<(), AppError> {
    let session = build_session(config)?;
    if args.overwrite {
        session.set_resume_computation(false);
    }

    let ids = resolve_models(&session, &args)?;
    if ids.is_empty() {
        println!("Nothing to fit: every table is up to date.");
        return Ok(());
    }

    let start = session.coordinator().request_start(&ids);
    print!("{}", report::format_start_report(&start));
    let expected = start.started.len();

    let mut finished: Vec<JobReport> = Vec::with_capacity(expected);
    let mut last_print = Instant::now();
    while finished.len() < expected {
        for event in session.poll_events() {
            println!("{}", report::format_job_report(&event.report));
            finished.push(event.report);
        }
        if last_print.elapsed() >= Duration::from_secs(1) && finished.len() < expected {
            println!("{}", report::format_progress_line(&session.rows()));
            last_print = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let unfinished = finished
        .iter()
        .filter(|r| r.outcome.requires_refit())
        .count()
        + start.rejected.len();
    if unfinished > 0 {
        return Err(AppError::new(
            5,
            format!("{unfinished} of {} fit(s) did not succeed.", ids.len()),
        ));
    }
    Ok(())
}

fn resolve_models(session: &Session, args: &FitArgs) -> Result<Vec<BrdfModelId>, AppError> {
    if args.all {
        return Ok(session.coordinator().list_models());
    }
    if args.models.is_empty() {
        return Ok(session.selected());
    }
    let registry = ModelRegistry::builtin();
    let mut ids = Vec::new();
    for name in &args.models {
        let id = registry.lookup(name)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn handle_inspect(config: &GeneratorConfig, args: InspectArgs) -> Result<(), AppError> {
    let id = ModelRegistry::builtin().lookup(&args.model)?;
    let store = TableStore::new(&config.output_dir);
    let record = store.load_record(id).ok_or_else(|| {
        AppError::new(
            4,
            format!("No fit record for {id} in {}.", store.dir().display()),
        )
    })?;
    print!("{}", report::format_record(&record));
    Ok(())
}

fn handle_tui(config: &GeneratorConfig, args: TuiArgs) -> Result<(), AppError> {
    let session = build_session(config)?;
    if args.overwrite {
        session.set_resume_computation(false);
    }
    crate::tui::run(session)
}

/// Rewrite argv so `ltcgen` defaults to `ltcgen tui`.
///
/// Rules:
/// - `ltcgen`                      -> `ltcgen tui`
/// - `ltcgen -o out`               -> `ltcgen -o out tui`
/// - `ltcgen --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let rest = argv.get(1..).unwrap_or_default();
    let asks_help_or_version = rest
        .iter()
        .any(|a| matches!(a.as_str(), "-h" | "--help" | "-V" | "--version" | "help"));
    let has_subcommand = rest.iter().any(|a| SUBCOMMANDS.contains(&a.as_str()));
    if !asks_help_or_version && !has_subcommand {
        argv.push("tui".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_opens_the_tui() {
        assert_eq!(rewrite_args(args(&["ltcgen"])), args(&["ltcgen", "tui"]));
        assert_eq!(
            rewrite_args(args(&["ltcgen", "-o", "out"])),
            args(&["ltcgen", "-o", "out", "tui"])
        );
    }

    #[test]
    fn explicit_subcommands_and_help_are_kept() {
        assert_eq!(
            rewrite_args(args(&["ltcgen", "fit", "--all"])),
            args(&["ltcgen", "fit", "--all"])
        );
        assert_eq!(rewrite_args(args(&["ltcgen", "--help"])), args(&["ltcgen", "--help"]));
    }

    #[test]
    fn flags_override_the_environment() {
        let mut config = GeneratorConfig::default();
        let cli = crate::cli::Cli::parse_from(["ltcgen", "list", "-o", "tables", "--samples", "4"]);
        apply_global_args(&mut config, &cli.global);
        assert_eq!(config.output_dir, std::path::PathBuf::from("tables"));
        assert_eq!(config.sample_count, 4);
        assert_eq!(config.table_size, 64);
    }

    #[test]
    fn log_levels_map_like_the_help_text() {
        assert_eq!(log_filter_from_level(0), log::LevelFilter::Error);
        assert_eq!(log_filter_from_level(2), log::LevelFilter::Info);
        assert_eq!(log_filter_from_level(9), log::LevelFilter::Trace);
    }
}
