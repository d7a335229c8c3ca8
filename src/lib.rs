//! cloud-archiver - stale file archiving for a single directory
//!
//! This library scans a directory for top-level entries that have not been
//! accessed within a retention window, stages them in a hidden `.archive`
//! folder, uploads the staging area to object storage through an external
//! tool, and finally deletes the local copies. Every step is confirmed
//! interactively and can be re-run safely.

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod output;
pub mod prompt;
pub mod purger;
pub mod scanner;
pub mod session;
pub mod stager;
pub mod uploader;

pub use config::{ArchiveConfig, ConfigDefaults, ConfigOrigin, IgnoreRules, UserSettings};
pub use error::{ArchiverError, ArchiverResult, ItemFailure};
pub use prompt::{AlwaysYes, Prompter, ScriptedPrompter, TerminalPrompter};
pub use purger::{PurgeReport, purge, purge_items};
pub use scanner::{CandidateEntry, EntryKind, EntryStatus, Scanner, scan};
pub use session::{Phase, Session, SessionOutcome, UploadStatus};
pub use stager::{ArchiveReport, StagedItem, Stager, staging_contents, staging_dir};
pub use uploader::{AwsCliTransfer, Transfer, UploadReport, Uploader};

pub use cli::{ArchiveCommand, CliOptions, run_cli};
