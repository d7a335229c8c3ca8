use clap::{ArgAction, Parser};
use cloud_archiver::cli::{ArchiveCommand, CliOptions, run_cli};
use cloud_archiver::output::OutputFormatter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Archive files and folders that have not been accessed in a while.
#[derive(Debug, Parser)]
#[command(name = "cloud-archiver", version, about)]
struct Args {
    /// Directory to work in.
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Print the configuration for the directory and exit.
    #[arg(long, conflicts_with = "generate")]
    show_config: bool,

    /// Fill the directory with sample files of varying ages and exit.
    #[arg(long)]
    generate: bool,

    /// Bucket to use when no configuration exists yet.
    #[arg(long)]
    bucket: Option<String>,

    /// User settings file (TOML).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Answer yes to every confirmation.
    #[arg(short, long)]
    yes: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    let command = if args.show_config {
        ArchiveCommand::ShowConfig
    } else if args.generate {
        ArchiveCommand::Generate
    } else {
        ArchiveCommand::Run
    };
    let options = CliOptions {
        bucket: args.bucket,
        settings_path: args.settings,
        assume_yes: args.yes,
    };

    match run_cli(command, &args.dir, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
