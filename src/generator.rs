//! Synthetic test data for trying the eligibility boundary by hand.

use crate::error::{ArchiverError, ArchiverResult};
use crate::scanner::SECONDS_PER_DAY;
use filetime::FileTime;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Files created at the top level, with their age in days.
pub const GENERATED_FILES: &[(&str, u64)] = &[
    ("fresh.txt", 0),
    ("yesterday.txt", 1),
    ("last_month.txt", 30),
    ("almost_stale.txt", 59),
    ("boundary.txt", 60),
    ("just_stale.txt", 61),
    ("quarter_old.txt", 90),
    ("year_old.txt", 365),
];

/// Directories created at the top level, with their age and contents.
pub const GENERATED_DIRS: &[(&str, u64, &[&str])] = &[
    ("old_project", 120, &["notes.md", "src/main.rs"]),
    ("fresh_project", 0, &["draft.md"]),
];

/// Populates `root` with aged files and directories and returns their names.
///
/// Access and modification times are backdated by the listed number of
/// days plus one minute, so each entry sits just past its day boundary.
pub fn generate_test_set(root: &Path) -> ArchiverResult<Vec<String>> {
    fs::create_dir_all(root).map_err(|e| ArchiverError::fs(root, e))?;
    let mut created = Vec::new();

    for (name, days) in GENERATED_FILES {
        let path = root.join(name);
        fs::write(&path, format!("{} days old\n", days)).map_err(|e| ArchiverError::fs(&path, e))?;
        backdate(&path, *days)?;
        created.push(name.to_string());
    }

    for (name, days, files) in GENERATED_DIRS {
        let dir = root.join(name);
        for file in *files {
            let path = dir.join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| ArchiverError::fs(parent, e))?;
            }
            fs::write(&path, format!("part of {}\n", name)).map_err(|e| ArchiverError::fs(&path, e))?;
            backdate(&path, *days)?;
        }
        // Last, since creating the contents touches the directory.
        backdate(&dir, *days)?;
        created.push(name.to_string());
    }

    created.sort();
    Ok(created)
}

fn backdate(path: &Path, days: u64) -> ArchiverResult<()> {
    let when = SystemTime::now() - Duration::from_secs(days * SECONDS_PER_DAY + 60);
    let time = FileTime::from_system_time(when);
    filetime::set_file_times(path, time, time).map_err(|e| ArchiverError::fs(path, e))
}
