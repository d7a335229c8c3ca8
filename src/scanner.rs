//! Staleness scan over the immediate children of a working root.
//!
//! Eligibility is decided per top-level entry from that entry's own access
//! time. Directory contents are never inspected for eligibility, so a folder
//! is archived whole or not at all.

use crate::config::IgnoreRules;
use crate::error::{ArchiverError, ArchiverResult, ItemFailure};
use filetime::FileTime;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

pub const SECONDS_PER_DAY: u64 = 86_400;

/// What kind of filesystem object an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks are judged by their own metadata and never followed.
    Symlink,
}

impl EntryKind {
    fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "dir",
            EntryKind::Symlink => "link",
        }
    }
}

/// A top-level entry of the working root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    /// Display name; lossy for names that are not valid UTF-8.
    pub name: String,
    /// The entry's name exactly as stored on disk.
    pub file_name: OsString,
    pub path: PathBuf,
    pub kind: EntryKind,
    pub last_access: SystemTime,
}

/// Scan verdict for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Idle for at least the threshold.
    Eligible,
    /// Accessed too recently.
    Recent,
    /// Staging area, sidecar, or matched by an ignore pattern.
    Ignored,
}

/// An entry together with the data shown in the scan report.
#[derive(Debug, Clone)]
pub struct ScannedEntry {
    pub entry: CandidateEntry,
    pub days_idle: u64,
    /// Total size in bytes; `None` for ignored entries.
    pub size_bytes: Option<u64>,
    pub status: EntryStatus,
}

/// Everything a scan found, name-sorted.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub entries: Vec<ScannedEntry>,
    /// Entries whose metadata could not be read.
    pub failures: Vec<ItemFailure>,
}

impl ScanReport {
    /// The eligible entries, in name order.
    pub fn eligible(&self) -> Vec<CandidateEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Eligible)
            .map(|e| e.entry.clone())
            .collect()
    }
}

/// Scans a working root for stale entries.
#[derive(Debug, Clone)]
pub struct Scanner {
    ignore: IgnoreRules,
    now: SystemTime,
    measure_sizes: bool,
}

impl Scanner {
    pub fn new(ignore: IgnoreRules) -> Self {
        Self {
            ignore,
            now: SystemTime::now(),
            measure_sizes: true,
        }
    }

    /// Evaluate ages relative to `now` instead of the current time.
    pub fn at(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    /// Skip the recursive size computation.
    pub fn without_sizes(mut self) -> Self {
        self.measure_sizes = false;
        self
    }

    /// Classifies every top-level entry of `root`.
    ///
    /// # Errors
    ///
    /// Returns `FilesystemDenied` if `root` itself cannot be listed. Entries
    /// whose metadata cannot be read are recorded in the report instead.
    pub fn analyze(&self, root: &Path, threshold_days: u32) -> ArchiverResult<ScanReport> {
        let listing = fs::read_dir(root).map_err(|e| ArchiverError::fs(root, e))?;
        let mut report = ScanReport::default();

        for dir_entry in listing {
            let dir_entry = match dir_entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.failures.push(ItemFailure::new(
                        root.display().to_string(),
                        ArchiverError::fs(root, e),
                    ));
                    continue;
                }
            };

            match self.inspect(dir_entry.file_name(), dir_entry.path(), threshold_days) {
                Ok(scanned) => report.entries.push(scanned),
                Err(failure) => report.failures.push(failure),
            }
        }

        report
            .entries
            .sort_by(|a, b| a.entry.name.cmp(&b.entry.name));
        Ok(report)
    }

    fn inspect(
        &self,
        file_name: OsString,
        path: PathBuf,
        threshold_days: u32,
    ) -> Result<ScannedEntry, ItemFailure> {
        let name = file_name.to_string_lossy().to_string();

        // symlink_metadata so links are judged on their own timestamps
        let metadata = fs::symlink_metadata(&path)
            .map_err(|e| ItemFailure::new(&name, ArchiverError::fs(&path, e)))?;
        let last_access = metadata
            .accessed()
            .map_err(|e| ItemFailure::new(&name, ArchiverError::fs(&path, e)))?;

        let kind = EntryKind::from_file_type(metadata.file_type());
        let days_idle = days_since(last_access, self.now);
        let status = if self.ignore.is_ignored(&name) {
            EntryStatus::Ignored
        } else if days_idle >= u64::from(threshold_days) {
            EntryStatus::Eligible
        } else {
            EntryStatus::Recent
        };
        debug!(name = %name, days_idle, ?status, "scanned entry");

        let size_bytes = match (status, self.measure_sizes) {
            (EntryStatus::Ignored, _) | (_, false) => None,
            _ => Some(entry_size(&path, kind, metadata.len(), last_access)),
        };

        Ok(ScannedEntry {
            entry: CandidateEntry {
                name,
                file_name,
                path,
                kind,
                last_access,
            },
            days_idle,
            size_bytes,
            status,
        })
    }

    /// Returns the eligible entries of `root`, in name order.
    pub fn scan(&self, root: &Path, threshold_days: u32) -> ArchiverResult<Vec<CandidateEntry>> {
        Ok(self.analyze(root, threshold_days)?.eligible())
    }
}

/// Returns the entries of `root` idle for at least `threshold_days`.
///
/// Only the staging area and the sidecar are excluded.
pub fn scan(root: &Path, threshold_days: u32) -> ArchiverResult<Vec<CandidateEntry>> {
    Scanner::new(IgnoreRules::default())
        .without_sizes()
        .scan(root, threshold_days)
}

/// Whole days elapsed between `last_access` and `now`, rounded down.
///
/// Access times in the future count as zero days.
pub fn days_since(last_access: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(last_access)
        .map(|elapsed| elapsed.as_secs() / SECONDS_PER_DAY)
        .unwrap_or(0)
}

/// Total size in bytes of a file, link, or directory tree.
///
/// Unreadable parts count as zero. A directory's access time is left as it
/// was.
pub fn total_size(path: &Path) -> u64 {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return 0;
    };
    match metadata.accessed() {
        Ok(last_access) => entry_size(
            path,
            EntryKind::from_file_type(metadata.file_type()),
            metadata.len(),
            last_access,
        ),
        Err(_) if metadata.is_dir() => directory_size(path),
        Err(_) => metadata.len(),
    }
}

fn entry_size(path: &Path, kind: EntryKind, own_len: u64, last_access: SystemTime) -> u64 {
    if kind != EntryKind::Directory {
        return own_len;
    }

    let total = directory_size(path);

    // Listing the directory bumps its access time; put it back so the
    // report does not reset the entry's age.
    if let Err(e) = filetime::set_file_atime(path, FileTime::from_system_time(last_access)) {
        warn!(path = %path.display(), error = %e, "could not restore access time");
    }
    total
}

fn directory_size(dir: &Path) -> u64 {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "could not read directory for size");
            return 0;
        }
    };

    let mut total = 0;
    for entry in entries.flatten() {
        let Ok(metadata) = entry.path().symlink_metadata() else {
            continue;
        };
        if metadata.is_dir() {
            total += directory_size(&entry.path());
        } else {
            total += metadata.len();
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG_FILE_NAME;
    use crate::stager::STAGING_DIR_NAME;
    use std::time::Duration;
    use tempfile::TempDir;

    fn days_ago(days: u64) -> SystemTime {
        SystemTime::now() - Duration::from_secs(days * SECONDS_PER_DAY + 60)
    }

    fn touch(path: &Path, days: u64) {
        let time = FileTime::from_system_time(days_ago(days));
        filetime::set_file_times(path, time, time).expect("Failed to set file times");
    }

    fn write_aged(root: &Path, name: &str, days: u64) -> PathBuf {
        let path = root.join(name);
        fs::write(&path, "content").expect("Failed to write test file");
        touch(&path, days);
        path
    }

    fn names(entries: &[CandidateEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_days_since_rounds_down() {
        let now = SystemTime::now();
        let accessed = now - Duration::from_secs(SECONDS_PER_DAY * 2 - 1);
        assert_eq!(days_since(accessed, now), 1);
        assert_eq!(days_since(now - Duration::from_secs(SECONDS_PER_DAY), now), 1);
        assert_eq!(days_since(now, now), 0);
    }

    #[test]
    fn test_future_access_time_is_zero_days() {
        let now = SystemTime::now();
        assert_eq!(days_since(now + Duration::from_secs(3600), now), 0);
    }

    #[test]
    fn test_scan_selects_stale_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write_aged(root, "a.txt", 90);
        write_aged(root, "b.txt", 10);

        let found = scan(root, 60).unwrap();
        assert_eq!(names(&found), vec!["a.txt"]);
        assert_eq!(found[0].kind, EntryKind::File);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write_aged(root, "exactly.txt", 60);
        write_aged(root, "almost.txt", 59);

        let found = scan(root, 60).unwrap();
        assert_eq!(names(&found), vec!["exactly.txt"]);
    }

    #[test]
    fn test_results_are_name_sorted() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        for name in ["zeta.txt", "alpha.txt", "mid.txt"] {
            write_aged(root, name, 100);
        }

        let found = scan(root, 1).unwrap();
        assert_eq!(names(&found), vec!["alpha.txt", "mid.txt", "zeta.txt"]);
    }

    #[test]
    fn test_staging_and_sidecar_never_candidates() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let staging = root.join(STAGING_DIR_NAME);
        fs::create_dir(&staging).unwrap();
        touch(&staging, 500);
        write_aged(root, CONFIG_FILE_NAME, 500);

        assert!(scan(root, 1).unwrap().is_empty());

        let report = Scanner::new(IgnoreRules::default())
            .analyze(root, 1)
            .unwrap();
        assert_eq!(report.entries.len(), 2);
        assert!(
            report
                .entries
                .iter()
                .all(|e| e.status == EntryStatus::Ignored)
        );
    }

    #[test]
    fn test_directory_uses_own_access_time() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();

        // Old folder with a freshly used file inside is still eligible.
        let old_dir = root.join("old_project");
        fs::create_dir(&old_dir).unwrap();
        write_aged(&old_dir, "recent.txt", 0);
        touch(&old_dir, 120);

        // Fresh folder with ancient contents is not.
        let fresh_dir = root.join("fresh_project");
        fs::create_dir(&fresh_dir).unwrap();
        write_aged(&fresh_dir, "ancient.txt", 400);
        touch(&fresh_dir, 0);

        let found = scan(root, 60).unwrap();
        assert_eq!(names(&found), vec!["old_project"]);
        assert_eq!(found[0].kind, EntryKind::Directory);
    }

    #[test]
    fn test_size_walk_keeps_directory_eligible() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let dir = root.join("photos");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("one.jpg"), vec![0u8; 100]).unwrap();
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("two.jpg"), vec![0u8; 50]).unwrap();
        touch(&dir, 90);

        let scanner = Scanner::new(IgnoreRules::default());
        let first = scanner.analyze(root, 60).unwrap();
        assert_eq!(first.entries[0].size_bytes, Some(150));
        assert_eq!(first.entries[0].status, EntryStatus::Eligible);

        let second = scanner.analyze(root, 60).unwrap();
        assert_eq!(second.entries[0].status, EntryStatus::Eligible);
    }

    #[test]
    fn test_total_size_of_tree_keeps_access_time() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("bundle");
        fs::create_dir_all(dir.join("inner")).unwrap();
        fs::write(dir.join("a.bin"), vec![0u8; 10]).unwrap();
        fs::write(dir.join("inner").join("b.bin"), vec![0u8; 5]).unwrap();
        touch(&dir, 90);
        let before = fs::metadata(&dir).unwrap().accessed().unwrap();

        assert_eq!(total_size(&dir), 15);
        assert_eq!(total_size(&dir.join("a.bin")), 10);
        assert_eq!(total_size(&dir.join("missing")), 0);
        assert_eq!(fs::metadata(&dir).unwrap().accessed().unwrap(), before);
    }

    #[test]
    fn test_empty_root_is_not_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        assert!(scan(temp_dir.path(), 60).unwrap().is_empty());
    }

    #[test]
    fn test_missing_root_is_filesystem_error() {
        let result = scan(Path::new("/non/existent/root"), 60);
        assert!(matches!(
            result,
            Err(ArchiverError::FilesystemDenied { .. })
        ));
    }

    #[test]
    fn test_scanner_clock_is_injectable() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        write_aged(root, "report.pdf", 10);

        let later = SystemTime::now() + Duration::from_secs(SECONDS_PER_DAY * 60);
        let found = Scanner::new(IgnoreRules::default())
            .without_sizes()
            .at(later)
            .scan(root, 60)
            .unwrap();
        assert_eq!(names(&found), vec!["report.pdf"]);
    }

    #[test]
    fn test_vanished_entry_is_reported_not_fatal() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let scanner = Scanner::new(IgnoreRules::default());

        let failure = scanner
            .inspect(OsString::from("gone.txt"), root.join("gone.txt"), 60)
            .expect_err("missing entry should fail");

        assert_eq!(failure.name, "gone.txt");
        assert!(matches!(
            failure.error,
            ArchiverError::FilesystemDenied { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_kept_verbatim() {
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let raw = std::ffi::OsStr::from_bytes(b"bad\xff.txt");
        let path = root.join(raw);
        fs::write(&path, "content").expect("Failed to write test file");
        touch(&path, 90);

        let found = scan(root, 60).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name.as_os_str(), raw);
        assert_eq!(found[0].path, path);
        assert_eq!(found[0].name, "bad\u{fffd}.txt");
    }
}
