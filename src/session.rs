//! The interactive archive session.
//!
//! A session walks a fixed sequence of phases:
//!
//! ```text
//! Idle -> Scan -> Archive -> Upload -> Delete -> Done
//! ```
//!
//! Archive, Upload and Delete each run only after a confirmation. Declining
//! moves on to the next phase. Upload and Delete act on the whole staging
//! area, whatever this session's scan found.

use crate::config::ArchiveConfig;
use crate::error::{ArchiverError, ArchiverResult, ItemFailure};
use crate::output::OutputFormatter;
use crate::prompt::Prompter;
use crate::purger::purge;
use crate::scanner::{CandidateEntry, Scanner};
use crate::stager::{STAGING_DIR_NAME, StagedItem, Stager, staging_contents, staging_dir};
use crate::uploader::{Transfer, Uploader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A step of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scan,
    Archive,
    Upload,
    Delete,
    Done,
}

impl Phase {
    /// The phase after this one. `Done` is terminal.
    pub fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::Scan,
            Phase::Scan => Phase::Archive,
            Phase::Archive => Phase::Upload,
            Phase::Upload => Phase::Delete,
            Phase::Delete | Phase::Done => Phase::Done,
        }
    }
}

/// How the upload phase of this session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// The phase has not run yet.
    Pending,
    /// Nothing was staged.
    NothingStaged,
    Declined,
    /// The transfer tool could not be used.
    Aborted(String),
    /// Every staged item was uploaded.
    Completed,
    /// Some items failed.
    Partial,
}

/// What happened during one session, for reporting.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Names the scan found eligible.
    pub eligible: Vec<String>,
    pub archived: Vec<String>,
    pub uploaded: Vec<String>,
    pub deleted: Vec<String>,
    pub upload: UploadStatus,
    /// Every item-level failure, in the order it happened.
    pub failures: Vec<ItemFailure>,
}

impl Default for SessionOutcome {
    fn default() -> Self {
        Self {
            eligible: Vec::new(),
            archived: Vec::new(),
            uploaded: Vec::new(),
            deleted: Vec::new(),
            upload: UploadStatus::Pending,
            failures: Vec::new(),
        }
    }
}

/// Drives the phases for one working root.
pub struct Session<'a> {
    root: PathBuf,
    config: ArchiveConfig,
    scanner: Scanner,
    prompter: &'a mut dyn Prompter,
    transfer: &'a dyn Transfer,
    phase: Phase,
    candidates: Vec<CandidateEntry>,
    outcome: SessionOutcome,
}

impl<'a> Session<'a> {
    pub fn new(
        root: &Path,
        config: ArchiveConfig,
        scanner: Scanner,
        prompter: &'a mut dyn Prompter,
        transfer: &'a dyn Transfer,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            scanner,
            prompter,
            transfer,
            phase: Phase::Idle,
            candidates: Vec::new(),
            outcome: SessionOutcome::default(),
        }
    }

    /// The phase that will run on the next [`Session::step`].
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the current phase and advances to the next one.
    ///
    /// # Errors
    ///
    /// Returns an error only for problems that end the session: the root
    /// cannot be scanned, the sidecar became corrupt, or the confirmation
    /// source failed.
    pub fn step(&mut self) -> ArchiverResult<Phase> {
        debug!(phase = ?self.phase, "running phase");
        match self.phase {
            Phase::Idle | Phase::Done => {}
            Phase::Scan => self.scan()?,
            Phase::Archive => self.archive()?,
            Phase::Upload => self.upload()?,
            Phase::Delete => self.delete()?,
        }
        self.phase = self.phase.next();
        if self.phase == Phase::Done {
            self.summarize();
        }
        Ok(self.phase)
    }

    /// Runs every remaining phase.
    pub fn run(mut self) -> ArchiverResult<SessionOutcome> {
        while self.phase != Phase::Done {
            self.step()?;
        }
        Ok(self.outcome)
    }

    fn confirm(&mut self, question: &str) -> ArchiverResult<bool> {
        self.prompter
            .confirm(question)
            .map_err(ArchiverError::PromptFailed)
    }

    fn scan(&mut self) -> ArchiverResult<()> {
        OutputFormatter::section(
            "Directory Analysis",
            Some(&format!(
                "Entries in this directory not accessed for {} days or more are archived.",
                self.config.days
            )),
        );

        let report = self.scanner.analyze(&self.root, self.config.days)?;
        if report.entries.is_empty() {
            OutputFormatter::plain("This directory is empty.");
        } else {
            OutputFormatter::scan_table(&self.root, &report.entries);
        }
        OutputFormatter::failures(&report.failures);

        self.candidates = report.eligible();
        self.outcome.eligible = self.candidates.iter().map(|c| c.name.clone()).collect();
        self.outcome.failures.extend(report.failures);
        info!(eligible = self.candidates.len(), "scan finished");
        Ok(())
    }

    fn archive(&mut self) -> ArchiverResult<()> {
        OutputFormatter::section("Archiving", None);
        let staging = staging_dir(&self.root);
        let count = self.candidates.len();
        if count == 0 {
            OutputFormatter::plain("No new entries require archiving.");
        }

        let question = format!(
            "Move {} {} to the archive ({})?",
            count,
            plural(count, "entry", "entries"),
            staging.display()
        );
        if !self.confirm(&question)? {
            OutputFormatter::plain("No entries moved.");
            return Ok(());
        }

        match Stager::archive(&self.candidates, &self.root) {
            Ok(report) => {
                if report.moved() > 0 {
                    OutputFormatter::success(&format!(
                        "Moved {} {} to {}.",
                        report.moved(),
                        plural(report.moved(), "entry", "entries"),
                        staging.display()
                    ));
                }
                OutputFormatter::failures(&report.failures);
                self.outcome.archived.extend(report.archived);
                self.outcome.failures.extend(report.failures);
            }
            Err(error) => {
                OutputFormatter::error(&format!("Archive phase failed: {}", error));
                self.outcome
                    .failures
                    .push(ItemFailure::new(STAGING_DIR_NAME, error));
            }
        }
        Ok(())
    }

    fn upload(&mut self) -> ArchiverResult<()> {
        OutputFormatter::section("Uploading", None);
        let staging = staging_dir(&self.root);
        let Some(items) = self.staged_items(&staging) else {
            self.outcome.upload = UploadStatus::Aborted("staging area unreadable".to_string());
            return Ok(());
        };
        let staged = items.len();
        // Re-read so an edit made since the session started is respected.
        let bucket = self.current_bucket()?;
        if staged == 0 {
            OutputFormatter::plain(&format!(
                "No archived entries in {} to upload.",
                staging.display()
            ));
        } else {
            OutputFormatter::plain(&format!(
                "There {} currently {} {} in the archive.",
                plural(staged, "is", "are"),
                staged,
                plural(staged, "entry", "entries")
            ));
            OutputFormatter::staged_table(&items, &bucket);
        }

        let question = format!(
            "Upload {} {} to bucket {}?",
            staged,
            plural(staged, "entry", "entries"),
            bucket
        );
        if !self.confirm(&question)? {
            OutputFormatter::plain(&format!(
                "Nothing uploaded. {} {} will remain in the local archive.",
                staged,
                plural(staged, "entry", "entries")
            ));
            self.outcome.upload = UploadStatus::Declined;
            return Ok(());
        }
        if staged == 0 {
            self.outcome.upload = UploadStatus::NothingStaged;
            return Ok(());
        }

        let progress = OutputFormatter::create_progress_bar(staged as u64);
        let result = Uploader::new(self.transfer).upload_with_progress(&staging, &bucket, |item| {
            progress.set_message(item.name.clone());
            progress.inc(1);
        });
        progress.finish_and_clear();

        match result {
            Ok(report) => {
                if !report.uploaded.is_empty() {
                    OutputFormatter::success(&format!(
                        "Uploaded {} {} to {}.",
                        report.uploaded.len(),
                        plural(report.uploaded.len(), "entry", "entries"),
                        bucket
                    ));
                }
                OutputFormatter::failures(&report.failures);
                self.outcome.upload = if report.is_complete_success() {
                    UploadStatus::Completed
                } else {
                    UploadStatus::Partial
                };
                self.outcome.uploaded.extend(report.uploaded);
                self.outcome.failures.extend(report.failures);
            }
            Err(error) => {
                OutputFormatter::error(&format!("Upload aborted: {}", error));
                self.outcome.upload = UploadStatus::Aborted(error.to_string());
            }
        }
        Ok(())
    }

    fn delete(&mut self) -> ArchiverResult<()> {
        OutputFormatter::section("Deletion", None);
        let staging = staging_dir(&self.root);
        let staged = self.staged_items(&staging).map_or(0, |items| items.len());
        OutputFormatter::plain(&format!(
            "There {} currently {} {} in the archive.",
            plural(staged, "is", "are"),
            staged,
            plural(staged, "entry", "entries")
        ));

        match &self.outcome.upload {
            UploadStatus::Completed | UploadStatus::NothingStaged | UploadStatus::Pending => {}
            UploadStatus::Declined => {
                OutputFormatter::warning("The archive was not uploaded in this session.")
            }
            UploadStatus::Aborted(reason) => OutputFormatter::warning(&format!(
                "The upload in this session did not run: {}",
                reason
            )),
            UploadStatus::Partial => {
                OutputFormatter::warning("Some entries failed to upload in this session.")
            }
        }

        let question = format!(
            "Permanently delete {} {} from the local archive?",
            staged,
            plural(staged, "entry", "entries")
        );
        if !self.confirm(&question)? {
            OutputFormatter::plain("No entries deleted.");
            return Ok(());
        }

        match purge(&staging) {
            Ok(report) => {
                OutputFormatter::success(&format!(
                    "Deleted {} {} from the local archive.",
                    report.count(),
                    plural(report.count(), "entry", "entries")
                ));
                OutputFormatter::failures(&report.failures);
                self.outcome.deleted.extend(report.deleted);
                self.outcome.failures.extend(report.failures);
            }
            Err(error) => {
                OutputFormatter::error(&format!("Delete phase failed: {}", error));
                self.outcome
                    .failures
                    .push(ItemFailure::new(STAGING_DIR_NAME, error));
            }
        }
        Ok(())
    }

    fn staged_items(&mut self, staging: &Path) -> Option<Vec<StagedItem>> {
        match staging_contents(staging) {
            Ok(items) => Some(items),
            Err(error) => {
                OutputFormatter::error(&format!("Cannot read the archive: {}", error));
                self.outcome
                    .failures
                    .push(ItemFailure::new(STAGING_DIR_NAME, error));
                None
            }
        }
    }

    fn current_bucket(&self) -> ArchiverResult<String> {
        Ok(ArchiveConfig::load(&self.root)?
            .and_then(|partial| partial.bucket)
            .unwrap_or_else(|| self.config.bucket.clone()))
    }

    fn summarize(&self) {
        let outcome = &self.outcome;
        OutputFormatter::section("Summary", None);
        OutputFormatter::plain(&format!(
            "  Archived: {}  Uploaded: {}  Deleted: {}",
            outcome.archived.len(),
            outcome.uploaded.len(),
            outcome.deleted.len()
        ));
        if outcome.failures.is_empty() {
            OutputFormatter::success("Session complete.");
        } else {
            OutputFormatter::warning(&format!(
                "Session complete with {} {}; see the errors above.",
                outcome.failures.len(),
                plural(outcome.failures.len(), "failure", "failures")
            ));
        }
    }
}

fn plural<'s>(count: usize, one: &'s str, many: &'s str) -> &'s str {
    if count == 1 { one } else { many }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IgnoreRules;
    use crate::prompt::ScriptedPrompter;
    use crate::stager::StagedItem;
    use serde_json::Map;
    use std::fs;
    use tempfile::TempDir;

    struct NoopTransfer;

    impl Transfer for NoopTransfer {
        fn check_available(&self) -> ArchiverResult<()> {
            Ok(())
        }

        fn transfer(&self, _item: &StagedItem, _bucket: &str) -> ArchiverResult<()> {
            Ok(())
        }
    }

    fn config() -> ArchiveConfig {
        ArchiveConfig {
            bucket: "test-bucket".to_string(),
            days: 60,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_phase_order() {
        let mut phase = Phase::Idle;
        let mut seen = vec![phase];
        while phase != Phase::Done {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                Phase::Idle,
                Phase::Scan,
                Phase::Archive,
                Phase::Upload,
                Phase::Delete,
                Phase::Done
            ]
        );
        assert_eq!(Phase::Done.next(), Phase::Done);
    }

    #[test]
    fn test_step_advances_one_phase() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut prompter = ScriptedPrompter::new(&[]);
        let transfer = NoopTransfer;
        let mut session = Session::new(
            temp_dir.path(),
            config(),
            Scanner::new(IgnoreRules::default()),
            &mut prompter,
            &transfer,
        );

        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.step().unwrap(), Phase::Scan);
        assert_eq!(session.step().unwrap(), Phase::Archive);
    }

    #[test]
    fn test_all_prompts_asked_when_nothing_eligible() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut prompter = ScriptedPrompter::new(&[false, false, false]);
        let transfer = NoopTransfer;

        let outcome = Session::new(
            temp_dir.path(),
            config(),
            Scanner::new(IgnoreRules::default()),
            &mut prompter,
            &transfer,
        )
        .run()
        .unwrap();

        assert!(outcome.eligible.is_empty());
        assert_eq!(outcome.upload, UploadStatus::Declined);
        assert_eq!(prompter.asked.len(), 3);
        assert!(prompter.asked[0].starts_with("Move 0 entries"));
        assert!(prompter.asked[1].starts_with("Upload 0 entries"));
        assert!(prompter.asked[2].starts_with("Permanently delete 0 entries"));
    }

    #[test]
    fn test_upload_reads_bucket_at_upload_time() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(staging_dir(root)).unwrap();
        fs::write(staging_dir(root).join("old.txt"), "old").unwrap();
        fs::write(
            ArchiveConfig::path_for(root),
            r#"{"bucket": "edited-bucket", "days": 60}"#,
        )
        .unwrap();

        let mut prompter = ScriptedPrompter::new(&[false, false, false]);
        let transfer = NoopTransfer;
        Session::new(
            root,
            config(),
            Scanner::new(IgnoreRules::default()),
            &mut prompter,
            &transfer,
        )
        .run()
        .unwrap();

        assert_eq!(prompter.asked[1], "Upload 1 entry to bucket edited-bucket?");
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "entry", "entries"), "entry");
        assert_eq!(plural(0, "entry", "entries"), "entries");
        assert_eq!(plural(2, "entry", "entries"), "entries");
    }
}
