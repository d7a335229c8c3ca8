/// Staging area handling: moving eligible entries into the hidden `.archive`
/// directory and listing what is currently staged.
///
/// Moves are plain renames within the working root, so an entry is either
/// fully staged or untouched.
use crate::error::{ArchiverError, ArchiverResult, ItemFailure};
use crate::scanner::{CandidateEntry, EntryKind};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the staging directory inside the working root.
pub const STAGING_DIR_NAME: &str = ".archive";

/// Returns the staging directory for a working root.
pub fn staging_dir(root: &Path) -> PathBuf {
    root.join(STAGING_DIR_NAME)
}

/// Outcome of an archive run.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    /// Names of entries moved into staging.
    pub archived: Vec<String>,
    /// Entries left in place, with the reason.
    pub failures: Vec<ItemFailure>,
}

impl ArchiveReport {
    /// Number of entries moved.
    pub fn moved(&self) -> usize {
        self.archived.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// An item currently held in the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedItem {
    /// Display name; lossy for names that are not valid UTF-8.
    pub name: String,
    pub file_name: OsString,
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Moves entries into the staging area.
pub struct Stager;

impl Stager {
    /// Moves each entry into the staging directory under `root`.
    ///
    /// The staging directory is created if it doesn't exist, unless there is
    /// nothing to move. An entry whose name is already staged is left in
    /// place and reported as a `Collision`; the remaining entries are still
    /// processed.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemDenied` only if the staging directory cannot be
    /// created. Per-entry failures are collected in the report.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cloud_archiver::scanner::scan;
    /// use cloud_archiver::stager::Stager;
    /// use std::path::Path;
    ///
    /// let root = Path::new("/path/to/directory");
    /// let entries = scan(root, 60).expect("scan failed");
    /// let report = Stager::archive(&entries, root).expect("staging unavailable");
    /// println!("Moved {} entries", report.moved());
    /// ```
    pub fn archive(entries: &[CandidateEntry], root: &Path) -> ArchiverResult<ArchiveReport> {
        let mut report = ArchiveReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        let staging = staging_dir(root);
        fs::create_dir_all(&staging).map_err(|e| ArchiverError::fs(&staging, e))?;

        for entry in entries {
            match Self::stage_entry(entry, &staging) {
                Ok(()) => {
                    debug!(name = %entry.name, "staged entry");
                    report.archived.push(entry.name.clone());
                }
                Err(error) => {
                    warn!(name = %entry.name, %error, "entry not staged");
                    report.failures.push(ItemFailure::new(&entry.name, error));
                }
            }
        }

        Ok(report)
    }

    fn stage_entry(entry: &CandidateEntry, staging: &Path) -> ArchiverResult<()> {
        let destination = staging.join(&entry.file_name);

        // symlink_metadata also catches dangling links that exists() misses
        if destination.symlink_metadata().is_ok() {
            return Err(ArchiverError::Collision {
                name: entry.name.clone(),
            });
        }

        fs::rename(&entry.path, &destination).map_err(|e| ArchiverError::fs(&entry.path, e))
    }
}

/// Lists everything in the staging directory, in name order.
///
/// A staging directory that doesn't exist yet holds nothing.
pub fn staging_contents(staging: &Path) -> ArchiverResult<Vec<StagedItem>> {
    if !staging.exists() {
        return Ok(Vec::new());
    }

    let listing = fs::read_dir(staging).map_err(|e| ArchiverError::fs(staging, e))?;
    let mut items = Vec::new();
    for entry in listing {
        let entry = entry.map_err(|e| ArchiverError::fs(staging, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| ArchiverError::fs(&path, e))?;
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let file_name = entry.file_name();
        items.push(StagedItem {
            name: file_name.to_string_lossy().to_string(),
            file_name,
            path,
            kind,
        });
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}
