//! Command-line interface module for cloud-archiver.
//!
//! This module handles all CLI-related functionality including:
//! - Command dispatch
//! - Loading settings and the sidecar configuration
//! - Wiring the session to a terminal prompter and the AWS CLI

use crate::config::{ArchiveConfig, ConfigOrigin, UserSettings};
use crate::error::ArchiverResult;
use crate::generator::generate_test_set;
use crate::output::OutputFormatter;
use crate::prompt::{AlwaysYes, Prompter, TerminalPrompter};
use crate::scanner::Scanner;
use crate::session::{Session, SessionOutcome};
use crate::uploader::{AwsCliTransfer, Transfer};
use std::path::{Path, PathBuf};

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveCommand {
    /// Scan, archive, upload and delete, asking before each step.
    Run,
    /// Print the configuration, creating it if needed.
    ShowConfig,
    /// Fill the directory with aged sample files.
    Generate,
}

/// Options shared by all commands.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    /// Bucket to record when the sidecar is first created.
    pub bucket: Option<String>,
    /// Explicit user settings file.
    pub settings_path: Option<PathBuf>,
    /// Answer yes to every confirmation.
    pub assume_yes: bool,
}

/// Runs the CLI application with the given command and directory path.
///
/// # Examples
///
/// ```no_run
/// use cloud_archiver::cli::{ArchiveCommand, CliOptions, run_cli};
/// use std::path::Path;
///
/// let result = run_cli(ArchiveCommand::ShowConfig, Path::new("."), &CliOptions::default());
/// if let Err(e) = result {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(command: ArchiveCommand, dir_path: &Path, options: &CliOptions) -> ArchiverResult<()> {
    match command {
        ArchiveCommand::Run => {
            let transfer = AwsCliTransfer::new();
            let mut prompter: Box<dyn Prompter> = if options.assume_yes {
                Box::new(AlwaysYes)
            } else {
                Box::new(TerminalPrompter::stdio())
            };
            run_session(dir_path, options, prompter.as_mut(), &transfer).map(|_| ())
        }
        ArchiveCommand::ShowConfig => {
            let settings = UserSettings::load(options.settings_path.as_deref())?;
            load_config(dir_path, &settings, options).map(|_| ())
        }
        ArchiveCommand::Generate => {
            let created = generate_test_set(dir_path)?;
            OutputFormatter::success(&format!(
                "Generated {} sample entries in {}.",
                created.len(),
                dir_path.display()
            ));
            for name in &created {
                OutputFormatter::plain(&format!(" - {}", name));
            }
            Ok(())
        }
    }
}

/// Runs a full session with the given confirmation source and transfer.
///
/// This function:
/// 1. Loads user settings and the sidecar configuration
/// 2. Compiles the ignore patterns
/// 3. Drives the session through every phase
///
/// # Errors
///
/// Fails if the settings or sidecar are invalid, the directory cannot be
/// scanned, or the prompter fails. Item-level problems are reported in the
/// returned outcome instead.
pub fn run_session(
    dir_path: &Path,
    options: &CliOptions,
    prompter: &mut dyn Prompter,
    transfer: &dyn Transfer,
) -> ArchiverResult<SessionOutcome> {
    let settings = UserSettings::load(options.settings_path.as_deref())?;
    let config = load_config(dir_path, &settings, options)?;
    let scanner = Scanner::new(settings.ignore_rules()?);

    Session::new(dir_path, config, scanner, prompter, transfer).run()
}

fn load_config(
    dir_path: &Path,
    settings: &UserSettings,
    options: &CliOptions,
) -> ArchiverResult<ArchiveConfig> {
    OutputFormatter::section(
        "Configuration",
        Some(&format!(
            "Current configuration for {}. Edit {} to change it.",
            dir_path.display(),
            ArchiveConfig::path_for(dir_path).display()
        )),
    );

    let defaults = settings.config_defaults(options.bucket.clone());
    let (config, origin) = ArchiveConfig::load_or_create(dir_path, &defaults)?;
    match origin {
        ConfigOrigin::Loaded => {}
        ConfigOrigin::Completed => OutputFormatter::info("Missing fields were filled in."),
        ConfigOrigin::Created => OutputFormatter::info("No configuration found; created one."),
    }
    OutputFormatter::config_table(dir_path, &config);
    Ok(config)
}
