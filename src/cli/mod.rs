//! Command-line parsing for the LTC table generator.
//!
//! The goal of this module is to keep **argument parsing** separate from job
//! control and rendering.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ltcgen", version, about = "LTC lookup table generator for BRDF models")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand. They override the environment.
#[derive(Debug, Args, Clone, Default)]
pub struct GlobalArgs {
    /// Directory receiving the generated tables (env: LTCGEN_OUTPUT_DIR).
    #[arg(short = 'o', long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Size N of the N x N table (env: LTCGEN_TABLE_SIZE).
    #[arg(long, global = true)]
    pub table_size: Option<usize>,

    /// Samples per dimension when estimating a fit (env: LTCGEN_SAMPLES).
    #[arg(long, global = true)]
    pub samples: Option<usize>,

    /// Worker threads; at least one per model is always used (env: LTCGEN_THREADS).
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Shorthand for `--log-level 4`.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Setting logging verbosity level (higher for more details)
    ///   0 - error
    ///   1 - warn + error
    ///   2 - info + warn + error
    ///   3 - debug + info + warn + error
    ///   4 - trace + debug + info + warn + error
    #[arg(long, global = true, verbatim_doc_comment)]
    pub log_level: Option<u8>,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered BRDF models and the state of their tables.
    List,
    /// Fit tables headlessly, printing progress until every job has ended.
    Fit(FitArgs),
    /// Print the record of the last fit of a model, warnings included.
    Inspect(InspectArgs),
    /// Launch the interactive TUI.
    Tui(TuiArgs),
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Models to fit (case-insensitive). Defaults to every model needing a fit.
    #[arg(value_name = "MODEL")]
    pub models: Vec<String>,

    /// Fit every registered model.
    #[arg(long, conflicts_with = "models")]
    pub all: bool,

    /// Discard partially fitted tables instead of resuming them.
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    #[arg(value_name = "MODEL")]
    pub model: String,
}

#[derive(Debug, Args, Clone, Default)]
pub struct TuiArgs {
    /// Start with "resume computation" disabled.
    #[arg(long)]
    pub overwrite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from(["ltcgen", "fit", "ggx", "--table-size", "16", "-v"]);
        assert_eq!(cli.global.table_size, Some(16));
        assert!(cli.global.verbose);
        match cli.command {
            Command::Fit(args) => {
                assert_eq!(args.models, vec!["ggx".to_string()]);
                assert!(!args.all);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn all_conflicts_with_explicit_models() {
        assert!(Cli::try_parse_from(["ltcgen", "fit", "ggx", "--all"]).is_err());
    }
}
