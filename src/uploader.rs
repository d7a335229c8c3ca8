//! Upload of staged items to remote object storage.
//!
//! The network transfer itself is delegated to an external tool behind the
//! [`Transfer`] trait. Every upload covers the complete staging area, not
//! only what the current session archived, so a run interrupted earlier is
//! picked up again on the next upload.

use crate::error::{ArchiverError, ArchiverResult, ItemFailure};
use crate::scanner::EntryKind;
use crate::stager::{StagedItem, staging_contents};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info, warn};

/// Environment variable overriding the location of the `aws` binary.
pub const AWS_BIN_ENV: &str = "CLOUD_ARCHIVER_AWS_BIN";

/// A mechanism able to copy one staged item to a bucket.
pub trait Transfer {
    /// Fails with `TransferUnavailable` if the tool is missing or cannot
    /// authenticate.
    fn check_available(&self) -> ArchiverResult<()>;

    /// Makes sure `bucket` can receive uploads.
    fn prepare(&self, _bucket: &str) -> ArchiverResult<()> {
        Ok(())
    }

    /// Copies `item` to `bucket`. Never removes the local copy.
    fn transfer(&self, item: &StagedItem, bucket: &str) -> ArchiverResult<()>;
}

/// Outcome of an upload run.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl UploadReport {
    pub fn attempted(&self) -> usize {
        self.uploaded.len() + self.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Uploads the staging area through a [`Transfer`].
pub struct Uploader<'a> {
    transfer: &'a dyn Transfer,
}

impl<'a> Uploader<'a> {
    pub fn new(transfer: &'a dyn Transfer) -> Self {
        Self { transfer }
    }

    /// Uploads every item in `staging` to `bucket`.
    pub fn upload(&self, staging: &Path, bucket: &str) -> ArchiverResult<UploadReport> {
        self.upload_with_progress(staging, bucket, |_| {})
    }

    /// Like [`Uploader::upload`], calling `on_item` after each attempt.
    ///
    /// Items are transferred one at a time in name order. A failed item is
    /// recorded and the rest are still attempted; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns `TransferUnavailable` before any item is attempted when the
    /// tool is unusable, and `FilesystemDenied` if the staging directory
    /// cannot be listed.
    pub fn upload_with_progress(
        &self,
        staging: &Path,
        bucket: &str,
        mut on_item: impl FnMut(&StagedItem),
    ) -> ArchiverResult<UploadReport> {
        let items = staging_contents(staging)?;
        let mut report = UploadReport::default();
        if items.is_empty() {
            return Ok(report);
        }

        self.transfer.check_available()?;
        self.transfer.prepare(bucket)?;

        for item in &items {
            match self.transfer.transfer(item, bucket) {
                Ok(()) => {
                    debug!(name = %item.name, bucket, "uploaded");
                    report.uploaded.push(item.name.clone());
                }
                Err(error) => {
                    warn!(name = %item.name, %error, "upload failed");
                    report.failures.push(ItemFailure::new(&item.name, error));
                }
            }
            on_item(item);
        }

        info!(
            uploaded = report.uploaded.len(),
            failed = report.failures.len(),
            bucket,
            "upload finished"
        );
        Ok(report)
    }
}

/// [`Transfer`] backed by the AWS command-line tool.
///
/// Credentials and region come from the tool's own configuration.
#[derive(Debug, Clone, Default)]
pub struct AwsCliTransfer {
    bin: Option<PathBuf>,
}

impl AwsCliTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `aws` executable instead of searching for one.
    pub fn with_binary(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: Some(bin.into()),
        }
    }

    fn resolve_bin(&self) -> ArchiverResult<PathBuf> {
        if let Some(bin) = &self.bin {
            if bin.exists() {
                return Ok(bin.clone());
            }
            return Err(ArchiverError::TransferUnavailable {
                reason: format!("aws CLI not found at {}", bin.display()),
            });
        }

        if let Ok(from_env) = std::env::var(AWS_BIN_ENV) {
            let bin = PathBuf::from(from_env);
            if bin.exists() {
                return Ok(bin);
            }
        }

        which::which("aws").map_err(|e| ArchiverError::TransferUnavailable {
            reason: format!("aws CLI not found in {} or PATH: {}", AWS_BIN_ENV, e),
        })
    }

    fn run(bin: &Path, args: &[OsString]) -> std::io::Result<Output> {
        debug!(bin = %bin.display(), ?args, "running aws");
        Command::new(bin).args(args).output()
    }

    fn stderr_of(output: &Output) -> String {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    }
}

fn os_args(args: &[&str]) -> Vec<OsString> {
    args.iter().map(|arg| OsString::from(*arg)).collect()
}

/// Whether the item has to be copied as a tree.
///
/// The tool follows symlinks, so a link to a directory is copied like one.
fn is_tree(item: &StagedItem) -> bool {
    match item.kind {
        EntryKind::Directory => true,
        EntryKind::Symlink => item.path.is_dir(),
        EntryKind::File => false,
    }
}

/// Where `item` ends up in `bucket`. Trees get a trailing slash.
pub fn remote_url(item: &StagedItem, bucket: &str) -> String {
    if is_tree(item) {
        format!("s3://{}/{}/", bucket, item.name)
    } else {
        format!("s3://{}/{}", bucket, item.name)
    }
}

/// Arguments for copying one staged item to `s3://<bucket>/<name>`.
fn copy_args(item: &StagedItem, bucket: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "s3".into(),
        "cp".into(),
        item.path.clone().into(),
        remote_url(item, bucket).into(),
    ];
    if is_tree(item) {
        args.push("--recursive".into());
    }
    args.push("--only-show-errors".into());
    args
}

impl Transfer for AwsCliTransfer {
    fn check_available(&self) -> ArchiverResult<()> {
        let bin = self.resolve_bin()?;
        let output = Self::run(&bin, &os_args(&["sts", "get-caller-identity"])).map_err(
            |e| ArchiverError::TransferUnavailable {
                reason: format!("failed to run {}: {}", bin.display(), e),
            },
        )?;

        if output.status.success() {
            return Ok(());
        }
        Err(ArchiverError::TransferUnavailable {
            reason: format!("not authenticated: {}", Self::stderr_of(&output)),
        })
    }

    fn prepare(&self, bucket: &str) -> ArchiverResult<()> {
        let bin = self.resolve_bin()?;
        let unavailable = |reason: String| ArchiverError::TransferUnavailable { reason };

        let head = Self::run(
            &bin,
            &os_args(&["s3api", "head-bucket", "--bucket", bucket]),
        )
        .map_err(|e| unavailable(e.to_string()))?;
        if head.status.success() {
            return Ok(());
        }

        info!(bucket, "bucket not found, creating it");
        let make = Self::run(&bin, &os_args(&["s3", "mb", &format!("s3://{bucket}")]))
            .map_err(|e| unavailable(e.to_string()))?;
        if make.status.success() {
            return Ok(());
        }
        Err(unavailable(format!(
            "cannot create bucket {}: {}",
            bucket,
            Self::stderr_of(&make)
        )))
    }

    fn transfer(&self, item: &StagedItem, bucket: &str) -> ArchiverResult<()> {
        let bin = self.resolve_bin()?;
        let failed = |reason: String| ArchiverError::TransferFailed {
            name: item.name.clone(),
            reason,
        };

        let output = Self::run(&bin, &copy_args(item, bucket)).map_err(|e| failed(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(failed(Self::stderr_of(&output)))
        }
    }
}
