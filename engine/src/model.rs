//! Core data model for the sync engine.
//!
//! This module defines the data structures exchanged with callers:
//! - Profile / FolderMapping: what to copy where
//! - FileInventoryResult: what a source tree contains
//! - StorageValidationResult: whether the destination volume has room
//! - EnhancedTransferProgress / EnhancedTransferResult / TransferError: a run
//! - VerificationResult / VerificationReport: post-transfer reconciliation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::error::ErrorCategory;
use crate::units::{format_bytes, format_duration};

/// Longest accepted profile name, in characters.
pub const MAX_PROFILE_NAME_LEN: usize = 100;

/// One source folder copied into one destination folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMapping {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

impl FolderMapping {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        FolderMapping {
            id: Uuid::new_v4(),
            source_path: source.into(),
            destination_path: destination.into(),
        }
    }

    /// Both paths are non-empty and not just whitespace.
    pub fn is_valid(&self) -> bool {
        !is_blank(&self.source_path) && !is_blank(&self.destination_path)
    }

    /// Case-insensitive comparison of both paths.
    pub fn is_equal_to(&self, other: &FolderMapping) -> bool {
        eq_ignore_case(&self.source_path, &other.source_path)
            && eq_ignore_case(&self.destination_path, &other.destination_path)
    }

    pub fn display_text(&self) -> String {
        format!(
            "{} → {}",
            self.source_path.display(),
            self.destination_path.display()
        )
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

fn eq_ignore_case(a: &Path, b: &Path) -> bool {
    a.as_os_str()
        .to_string_lossy()
        .to_lowercase()
        .eq(&b.as_os_str().to_string_lossy().to_lowercase())
}

/// A named set of folder mappings plus transfer options.
///
/// Profiles are replaced as a whole: clone, edit the clone, store the clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub folder_mappings: Vec<FolderMapping>,
    #[serde(default)]
    pub overwrite_existing: bool,
    pub created_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Profile {
            id: Uuid::new_v4(),
            name: name.into(),
            folder_mappings: Vec::new(),
            overwrite_existing: false,
            created_date: now,
            last_modified: now,
        }
    }

    /// Builder-style helper appending a mapping.
    pub fn with_mapping(
        mut self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        self.folder_mappings.push(FolderMapping::new(source, destination));
        self
    }

    pub fn is_valid(&self) -> bool {
        self.validation_errors().is_empty()
    }

    /// Human-readable reasons why this profile cannot be used.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Profile name is required".to_string());
        } else if self.name.chars().count() > MAX_PROFILE_NAME_LEN {
            errors.push(format!(
                "Profile name must be between 1 and {} characters",
                MAX_PROFILE_NAME_LEN
            ));
        }

        if self.folder_mappings.is_empty() {
            errors.push("At least one folder mapping is required".to_string());
        }

        for (i, mapping) in self.folder_mappings.iter().enumerate() {
            if !mapping.is_valid() {
                errors.push(format!("Folder mapping {} has invalid paths", i + 1));
            }
        }

        errors
    }

    /// Same name (ignoring case) and the same set of mappings (ignoring case and order).
    pub fn is_duplicate(&self, other: &Profile) -> bool {
        if self.name.to_lowercase() != other.name.to_lowercase() {
            return false;
        }
        if self.folder_mappings.len() != other.folder_mappings.len() {
            return false;
        }
        self.folder_mappings
            .iter()
            .all(|m| other.folder_mappings.iter().any(|o| o.is_equal_to(m)))
    }

    /// Bump the modification timestamp.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

/// A file discovered during an inventory scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl FileEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Result of scanning a source directory tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInventoryResult {
    pub total_file_count: usize,
    pub total_size_bytes: u64,
    /// Files in enumeration order
    pub files: Vec<FileEntry>,
    /// Subdirectories below the scanned root
    pub directory_count: usize,
    /// Diagnostics for paths that could not be read
    pub inaccessible_paths: Vec<String>,
}

impl FileInventoryResult {
    pub fn has_errors(&self) -> bool {
        !self.inaccessible_paths.is_empty()
    }

    pub fn formatted_size(&self) -> String {
        format_bytes(self.total_size_bytes)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} files ({}) in {} directories",
            self.total_file_count,
            self.formatted_size(),
            self.directory_count
        )
    }
}

/// Outcome of comparing a byte requirement against a volume's free space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageValidationResult {
    pub has_sufficient_space: bool,
    pub required_bytes: u64,
    pub available_bytes: u64,
    pub destination_drive: String,
    pub message: String,
}

impl StorageValidationResult {
    pub fn formatted_required(&self) -> String {
        format_bytes(self.required_bytes)
    }

    pub fn formatted_available(&self) -> String {
        format_bytes(self.available_bytes)
    }

    /// Bytes missing on the volume, zero when there is enough room.
    pub fn shortage_bytes(&self) -> u64 {
        self.required_bytes.saturating_sub(self.available_bytes)
    }

    pub fn formatted_shortage(&self) -> String {
        if self.has_sufficient_space {
            String::new()
        } else {
            format_bytes(self.shortage_bytes())
        }
    }

    /// Required bytes as a percentage of the available bytes.
    pub fn usage_percentage(&self) -> f64 {
        if self.required_bytes == 0 {
            0.0
        } else if self.available_bytes == 0 {
            f64::INFINITY
        } else {
            self.required_bytes as f64 / self.available_bytes as f64 * 100.0
        }
    }
}

/// A file (or mapping) that failed during a run. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferError {
    pub source_path: Option<PathBuf>,
    pub destination_path: Option<PathBuf>,
    pub message: String,
    pub category: ErrorCategory,
    pub timestamp: DateTime<Utc>,
}

impl TransferError {
    pub fn new(
        source_path: Option<PathBuf>,
        destination_path: Option<PathBuf>,
        message: impl Into<String>,
        category: ErrorCategory,
    ) -> Self {
        TransferError {
            source_path,
            destination_path,
            message: message.into(),
            category,
            timestamp: Utc::now(),
        }
    }

    /// Both paths are known, so the file can be re-attempted.
    pub fn is_retryable(&self) -> bool {
        let present = |p: &Option<PathBuf>| p.as_deref().is_some_and(|p| !is_blank(p));
        present(&self.source_path) && present(&self.destination_path)
    }

    /// File name of the source, or an empty string.
    pub fn short_path(&self) -> String {
        self.source_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn formatted(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S"),
            self.category,
            self.message
        )
    }
}

/// Lifecycle of one transfer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    NotStarted,
    Running,
    /// Every mapping was attempted (individual files may still have failed)
    Completed,
    /// The run stopped early: low disk space or a run-level error
    Failed,
    Cancelled,
}

impl TransferState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Cancelled
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransferState::NotStarted => "Ready",
            TransferState::Running => "Running",
            TransferState::Completed => "Completed",
            TransferState::Failed => "Failed",
            TransferState::Cancelled => "Cancelled",
        };
        f.write_str(text)
    }
}

/// Live counters for a run. Owned by the engine; sinks receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedTransferProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    /// Files left untouched because the destination existed and overwrite was off
    pub skipped_files: usize,
    pub total_bytes: u64,
    /// Bytes of every processed file, copied or not
    pub processed_bytes: u64,
    /// Bytes of files that were actually copied
    pub transferred_bytes: u64,
    pub current_file: String,
    pub errors: Vec<TransferError>,
    pub start_time: DateTime<Utc>,
}

impl EnhancedTransferProgress {
    pub fn new() -> Self {
        EnhancedTransferProgress {
            total_files: 0,
            processed_files: 0,
            successful_files: 0,
            failed_files: 0,
            skipped_files: 0,
            total_bytes: 0,
            processed_bytes: 0,
            transferred_bytes: 0,
            current_file: String::new(),
            errors: Vec::new(),
            start_time: Utc::now(),
        }
    }

    pub fn percent_complete(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.processed_files as f64 / self.total_files as f64 * 100.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.start_time).to_std().unwrap_or_default()
    }

    pub fn formatted_progress(&self) -> String {
        format!(
            "{}/{} files ({:.1}%)",
            self.processed_files,
            self.total_files,
            self.percent_complete()
        )
    }

    pub fn formatted_bytes(&self) -> String {
        format!(
            "{} / {}",
            format_bytes(self.processed_bytes),
            format_bytes(self.total_bytes)
        )
    }
}

impl Default for EnhancedTransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a finished (or retried) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedTransferResult {
    pub is_success: bool,
    pub state: TransferState,
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub duration: Duration,
    pub errors: Vec<TransferError>,
    pub storage_info: Option<StorageValidationResult>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Default for EnhancedTransferResult {
    /// A run that has not started: no files, no errors.
    fn default() -> Self {
        let now = Utc::now();
        EnhancedTransferResult {
            is_success: false,
            state: TransferState::NotStarted,
            total_files: 0,
            successful_files: 0,
            failed_files: 0,
            skipped_files: 0,
            total_bytes: 0,
            transferred_bytes: 0,
            duration: Duration::ZERO,
            errors: Vec::new(),
            storage_info: None,
            start_time: now,
            end_time: now,
        }
    }
}

/// How many errors `detailed_summary` lists before truncating.
const SUMMARY_ERROR_LIMIT: usize = 5;

impl EnhancedTransferResult {
    /// Success requires zero failures and at least one successful file.
    pub fn compute_success(failed_files: usize, successful_files: usize) -> bool {
        failed_files == 0 && successful_files > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Transferred {}/{} files successfully",
            self.successful_files, self.total_files
        )
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.successful_files as f64 / self.total_files as f64 * 100.0
        }
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration)
    }

    pub fn formatted_bytes(&self) -> String {
        format!(
            "{} / {}",
            format_bytes(self.transferred_bytes),
            format_bytes(self.total_bytes)
        )
    }

    pub fn detailed_summary(&self) -> String {
        let mut summary = format!("Transfer completed in {}\n", self.formatted_duration());
        summary.push_str(&format!(
            "Files: {} successful, {} failed out of {} total\n",
            self.successful_files, self.failed_files, self.total_files
        ));
        if self.skipped_files > 0 {
            summary.push_str(&format!(
                "Skipped (already present): {}\n",
                self.skipped_files
            ));
        }
        summary.push_str(&format!("Data: {}\n", self.formatted_bytes()));
        summary.push_str(&format!("Success rate: {:.1}%", self.success_rate()));

        if !self.errors.is_empty() {
            summary.push_str(&format!("\n\nErrors ({}):\n", self.errors.len()));
            let lines: Vec<String> = self
                .errors
                .iter()
                .take(SUMMARY_ERROR_LIMIT)
                .map(|e| format!("• {}: {}", e.short_path(), e.message))
                .collect();
            summary.push_str(&lines.join("\n"));
            if self.errors.len() > SUMMARY_ERROR_LIMIT {
                summary.push_str(&format!(
                    "\n... and {} more errors",
                    self.errors.len() - SUMMARY_ERROR_LIMIT
                ));
            }
        }

        summary
    }
}

/// Outcome of the quick file-count verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub profile_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_successful: bool,
    pub source_file_count: usize,
    pub destination_file_count: usize,
    pub files_match: bool,
    pub error_message: Option<String>,
}

impl VerificationResult {
    pub fn duration(&self) -> Duration {
        self.end_time
            .and_then(|end| (end - self.start_time).to_std().ok())
            .unwrap_or_default()
    }

    pub fn summary_message(&self) -> String {
        if self.is_successful {
            format!(
                "Verification passed. Source: {} files, Destination: {} files.",
                self.source_file_count, self.destination_file_count
            )
        } else {
            format!(
                "Verification failed. {}",
                self.error_message.as_deref().unwrap_or_default()
            )
        }
    }

    pub fn detailed_summary(&self) -> String {
        let mut summary = String::from("Verification Summary:\n");
        summary.push_str(&format!("- Source file count: {}\n", self.source_file_count));
        summary.push_str(&format!(
            "- Destination file count: {}\n",
            self.destination_file_count
        ));
        summary.push_str(&format!("- Files match: {}\n", self.files_match));
        summary.push_str(&format!(
            "- Verification duration: {}\n",
            format_duration(self.duration())
        ));
        if let Some(message) = &self.error_message {
            summary.push_str(&format!("- Error: {}\n", message));
        }
        summary
    }
}

/// Sizes of a file present on both sides with different lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeMismatch {
    pub source_size: u64,
    pub destination_size: u64,
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Source: {}, Dest: {}",
            format_bytes(self.source_size),
            format_bytes(self.destination_size)
        )
    }
}

/// Relative-path reconciliation of source and destination trees.
///
/// Keys are relative paths with `/` separators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// In source, absent from destination
    pub missing_files: Vec<String>,
    /// In destination, absent from source
    pub extra_files: Vec<String>,
    pub size_mismatches: BTreeMap<String, SizeMismatch>,
    pub total_source_files: usize,
    pub total_destination_files: usize,
    pub matching_files: usize,
    /// Entries that could not be read while building the report
    pub scan_errors: Vec<String>,
}

/// How many entries per list `detailed_report` prints.
const REPORT_LIST_LIMIT: usize = 10;

impl VerificationReport {
    /// Extra files alone never fail verification.
    pub fn is_successful(&self) -> bool {
        self.missing_files.is_empty() && self.size_mismatches.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_successful() {
            return format!(
                "Verification successful! All {} files match.",
                self.total_source_files
            );
        }

        let mut issues = Vec::new();
        if !self.missing_files.is_empty() {
            issues.push(format!("{} missing files", self.missing_files.len()));
        }
        if !self.size_mismatches.is_empty() {
            issues.push(format!("{} size mismatches", self.size_mismatches.len()));
        }
        if !self.extra_files.is_empty() {
            issues.push(format!("{} extra files", self.extra_files.len()));
        }
        format!("Verification found issues: {}", issues.join(", "))
    }

    pub fn detailed_report(&self) -> String {
        let mut out = String::new();
        out.push_str("Verification Report\n");
        out.push_str("===================\n\n");
        out.push_str(&format!("Total Source Files: {}\n", self.total_source_files));
        out.push_str(&format!(
            "Total Destination Files: {}\n",
            self.total_destination_files
        ));
        out.push_str(&format!("Matching Files: {}\n\n", self.matching_files));

        push_section(&mut out, "Missing Files", self.missing_files.iter().cloned());
        push_section(
            &mut out,
            "Size Mismatches",
            self.size_mismatches
                .iter()
                .map(|(path, mismatch)| format!("{}: {}", path, mismatch)),
        );
        push_section(
            &mut out,
            "Extra Files in Destination",
            self.extra_files.iter().cloned(),
        );
        push_section(&mut out, "Unreadable Entries", self.scan_errors.iter().cloned());

        out
    }
}

fn push_section(out: &mut String, title: &str, items: impl ExactSizeIterator<Item = String>) {
    let count = items.len();
    if count == 0 {
        return;
    }
    out.push_str(&format!("{} ({}):\n", title, count));
    for item in items.take(REPORT_LIST_LIMIT) {
        out.push_str(&format!("  - {}\n", item));
    }
    if count > REPORT_LIST_LIMIT {
        out.push_str(&format!("  ... and {} more\n", count - REPORT_LIST_LIMIT));
    }
    out.push('\n');
}
