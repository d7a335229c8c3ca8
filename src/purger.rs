/// Permanent removal of staged items.
///
/// Purging does not check whether an item was uploaded; the session only
/// offers it after the upload phase.
use crate::error::{ArchiverError, ArchiverResult, ItemFailure};
use crate::scanner::EntryKind;
use crate::stager::{StagedItem, staging_contents};
use std::fs;
use tracing::{debug, warn};

/// Represents the result of a purge.
#[derive(Debug, Default)]
pub struct PurgeReport {
    /// Names of items deleted.
    pub deleted: Vec<String>,
    /// Items that could not be deleted.
    pub failures: Vec<ItemFailure>,
}

impl PurgeReport {
    /// Number of items deleted.
    pub fn count(&self) -> usize {
        self.deleted.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Deletes everything in the staging directory.
///
/// A missing or empty staging directory is not an error and yields an empty
/// report. Each item is removed independently; failures are recorded and the
/// remaining items are still deleted.
///
/// # Errors
///
/// Returns `FilesystemDenied` only if the staging directory cannot be listed.
///
/// # Examples
///
/// ```no_run
/// use cloud_archiver::purger::purge;
/// use std::path::Path;
///
/// let report = purge(Path::new("/path/to/directory/.archive")).expect("purge failed");
/// println!("Deleted {} items", report.count());
/// ```
pub fn purge(staging: &std::path::Path) -> ArchiverResult<PurgeReport> {
    Ok(purge_items(staging_contents(staging)?))
}

/// Deletes the given staged items, continuing past failures.
pub fn purge_items(items: Vec<StagedItem>) -> PurgeReport {
    let mut report = PurgeReport::default();

    for item in items {
        match remove_item(&item) {
            Ok(()) => {
                debug!(name = %item.name, "deleted staged item");
                report.deleted.push(item.name);
            }
            Err(error) => {
                warn!(name = %item.name, %error, "could not delete staged item");
                report.failures.push(ItemFailure::new(item.name, error));
            }
        }
    }

    report
}

fn remove_item(item: &StagedItem) -> ArchiverResult<()> {
    let result = match item.kind {
        EntryKind::Directory => fs::remove_dir_all(&item.path),
        EntryKind::File | EntryKind::Symlink => fs::remove_file(&item.path),
    };
    result.map_err(|e| ArchiverError::fs(&item.path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stager::STAGING_DIR_NAME;
    use tempfile::TempDir;

    #[test]
    fn test_purge_removes_files_and_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let staging = temp_dir.path().join(STAGING_DIR_NAME);
        fs::create_dir_all(staging.join("project").join("src")).unwrap();
        fs::write(staging.join("project").join("src").join("lib.rs"), "").unwrap();
        fs::write(staging.join("notes.txt"), "notes").unwrap();

        let report = purge(&staging).expect("Purge failed");

        assert_eq!(report.count(), 2);
        assert!(report.is_complete_success());
        assert!(staging.exists());
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[test]
    fn test_purge_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let staging = temp_dir.path().join(STAGING_DIR_NAME);
        fs::create_dir(&staging).unwrap();
        fs::write(staging.join("a.txt"), "a").unwrap();

        assert_eq!(purge(&staging).unwrap().count(), 1);
        assert_eq!(purge(&staging).unwrap().count(), 0);
    }

    #[test]
    fn test_purge_missing_staging_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let report = purge(&temp_dir.path().join(STAGING_DIR_NAME)).unwrap();
        assert_eq!(report.count(), 0);
    }

    #[test]
    fn test_failed_item_reported_and_rest_deleted() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let staging = temp_dir.path().join(STAGING_DIR_NAME);
        fs::create_dir_all(staging.join("project")).unwrap();
        fs::write(staging.join("a.txt"), "a").unwrap();

        let mut items = staging_contents(&staging).unwrap();
        items.insert(
            1,
            StagedItem {
                name: "gone.txt".to_string(),
                file_name: "gone.txt".into(),
                path: staging.join("gone.txt"),
                kind: EntryKind::File,
            },
        );

        let report = purge_items(items);

        assert_eq!(report.deleted, vec!["a.txt", "project"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "gone.txt");
        assert!(matches!(
            report.failures[0].error,
            ArchiverError::FilesystemDenied { .. }
        ));
        assert!(!report.is_complete_success());
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_purge_removes_symlink_not_target() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let staging = temp_dir.path().join(STAGING_DIR_NAME);
        fs::create_dir(&staging).unwrap();
        let target = temp_dir.path().join("keep.txt");
        fs::write(&target, "keep").unwrap();
        std::os::unix::fs::symlink(&target, staging.join("link")).unwrap();

        let report = purge(&staging).unwrap();

        assert_eq!(report.count(), 1);
        assert!(target.exists());
    }
}
