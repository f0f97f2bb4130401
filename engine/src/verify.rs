//! Post-transfer verification.
//!
//! Two checks are offered. `verify_quick` compares total file counts under
//! every mapping's source and destination. `generate_detailed_report` maps
//! each side to relative path and size, then reconciles the two maps.
//!
//! Relative paths are taken against each mapping's own source and
//! destination roots.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::error::CopyError;
use crate::fs_ops::{FileOperations, LocalFileOperations};
use crate::model::{
    EnhancedTransferResult, Profile, SizeMismatch, VerificationReport, VerificationResult,
};

/// Compares source and destination trees after a run.
#[derive(Clone)]
pub struct VerificationEngine {
    ops: Arc<dyn FileOperations>,
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new(Arc::new(LocalFileOperations))
    }
}

impl VerificationEngine {
    pub fn new(ops: Arc<dyn FileOperations>) -> Self {
        VerificationEngine { ops }
    }

    /// Count-only check: passes when source and destination hold the same
    /// number of files across all mappings.
    pub fn verify_quick(
        &self,
        profile: &Profile,
        transfer: &EnhancedTransferResult,
    ) -> VerificationResult {
        log::info!(
            "Starting verification for profile: {} (last run: {})",
            profile.name,
            transfer.summary()
        );

        let mut result = VerificationResult {
            profile_id: profile.id,
            start_time: Utc::now(),
            end_time: None,
            is_successful: true,
            source_file_count: 0,
            destination_file_count: 0,
            files_match: false,
            error_message: None,
        };

        let sources = profile.folder_mappings.iter().map(|m| m.source_path.as_path());
        let destinations = profile
            .folder_mappings
            .iter()
            .map(|m| m.destination_path.as_path());

        let counts = self
            .count_files_in_folders(sources)
            .and_then(|source| Ok((source, self.count_files_in_folders(destinations)?)));

        match counts {
            Ok((source, destination)) => {
                result.source_file_count = source;
                result.destination_file_count = destination;
                result.files_match = source == destination;
                if !result.files_match {
                    result.is_successful = false;
                    result.error_message = Some(format!(
                        "File count mismatch: Source has {} files, destination has {} files",
                        source, destination
                    ));
                    log::warn!(
                        "File count mismatch for profile {}: source {}, destination {}",
                        profile.name,
                        source,
                        destination
                    );
                }
            }
            Err(err) => {
                log::error!("Verification failed for profile {}: {}", profile.name, err);
                result.is_successful = false;
                result.error_message = Some(err.to_string());
            }
        }

        result.end_time = Some(Utc::now());
        log::info!(
            "Verification completed for profile: {}. Success: {}",
            profile.name,
            result.is_successful
        );
        result
    }

    /// Total files under every existing folder in `folders`. Missing folders count as empty.
    pub fn count_files_in_folders<'a>(
        &self,
        folders: impl IntoIterator<Item = &'a Path>,
    ) -> Result<usize, CopyError> {
        let mut total = 0;
        for folder in folders {
            if self.ops.directory_exists(folder) {
                total += self.ops.count_files_recursively(folder)?;
            }
        }
        Ok(total)
    }

    /// Full relative-path and size reconciliation of every mapping.
    ///
    /// Unreadable entries are listed in `scan_errors` and otherwise ignored.
    pub fn generate_detailed_report(&self, profile: &Profile) -> VerificationReport {
        log::info!(
            "Generating detailed verification report for profile: {}",
            profile.name
        );

        let mut report = VerificationReport::default();
        let mut source_files = BTreeMap::new();
        let mut destination_files = BTreeMap::new();

        for mapping in &profile.folder_mappings {
            if self.ops.directory_exists(&mapping.source_path) {
                collect_sizes(
                    &mapping.source_path,
                    &mut source_files,
                    &mut report.scan_errors,
                );
            }
        }
        for mapping in &profile.folder_mappings {
            if self.ops.directory_exists(&mapping.destination_path) {
                collect_sizes(
                    &mapping.destination_path,
                    &mut destination_files,
                    &mut report.scan_errors,
                );
            }
        }

        report.total_source_files = source_files.len();
        report.total_destination_files = destination_files.len();

        for (path, &source_size) in &source_files {
            match destination_files.get(path) {
                None => report.missing_files.push(path.clone()),
                Some(&destination_size) if destination_size != source_size => {
                    report.size_mismatches.insert(
                        path.clone(),
                        SizeMismatch {
                            source_size,
                            destination_size,
                        },
                    );
                }
                Some(_) => report.matching_files += 1,
            }
        }

        report.extra_files = destination_files
            .keys()
            .filter(|path| !source_files.contains_key(*path))
            .cloned()
            .collect();

        log::info!(
            "Detailed report generated. Missing: {}, Mismatches: {}, Extra: {}",
            report.missing_files.len(),
            report.size_mismatches.len(),
            report.extra_files.len()
        );

        report
    }
}

/// Add every file below `root` to `sizes`, keyed by its `/`-separated path relative to `root`.
fn collect_sizes(root: &Path, sizes: &mut BTreeMap<String, u64>, errors: &mut Vec<String>) {
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                errors.push(err.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                errors.push(format!("{}: {}", entry.path().display(), err));
                continue;
            }
        };

        if let Ok(relative) = entry.path().strip_prefix(root) {
            sizes.insert(relative_key(relative), size);
        }
    }
}

fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree(root: &Path, files: &[(&str, &str)]) {
        for (relative, content) in files {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().expect("No parent")).expect("Failed to create dirs");
            fs::write(path, content).expect("Failed to write file");
        }
    }

    fn empty_result() -> EnhancedTransferResult {
        EnhancedTransferResult::default()
    }

    #[test]
    fn test_identical_trees() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("src");
        let dest = temp_dir.path().join("dst");
        let files = [("a.txt", "alpha"), ("nested/b.txt", "beta")];
        tree(&source, &files);
        tree(&dest, &files);

        let profile = Profile::new("Same").with_mapping(&source, &dest);
        let report = VerificationEngine::default().generate_detailed_report(&profile);

        assert!(report.is_successful());
        assert_eq!(report.total_source_files, 2);
        assert_eq!(report.matching_files, 2);
        assert!(report.missing_files.is_empty());
        assert!(report.extra_files.is_empty());
        assert!(report.size_mismatches.is_empty());
    }

    #[test]
    fn test_missing_file_fails() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("src");
        let dest = temp_dir.path().join("dst");
        tree(&source, &[("a.txt", "alpha"), ("nested/b.txt", "beta")]);
        tree(&dest, &[("a.txt", "alpha")]);

        let profile = Profile::new("Missing").with_mapping(&source, &dest);
        let report = VerificationEngine::default().generate_detailed_report(&profile);

        assert!(!report.is_successful());
        assert_eq!(report.missing_files, vec!["nested/b.txt".to_string()]);
    }

    #[test]
    fn test_extra_file_is_informational() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("src");
        let dest = temp_dir.path().join("dst");
        tree(&source, &[("a.txt", "alpha")]);
        tree(&dest, &[("a.txt", "alpha"), ("stray.log", "noise")]);

        let profile = Profile::new("Extra").with_mapping(&source, &dest);
        let report = VerificationEngine::default().generate_detailed_report(&profile);

        assert!(report.is_successful());
        assert_eq!(report.extra_files, vec!["stray.log".to_string()]);
    }

    #[test]
    fn test_size_mismatch_fails() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("src");
        let dest = temp_dir.path().join("dst");
        tree(&source, &[("a.txt", "full content")]);
        tree(&dest, &[("a.txt", "trunc")]);

        let profile = Profile::new("Mismatch").with_mapping(&source, &dest);
        let report = VerificationEngine::default().generate_detailed_report(&profile);

        assert!(!report.is_successful());
        let mismatch = report.size_mismatches.get("a.txt").expect("Mismatch not recorded");
        assert_eq!(mismatch.source_size, 12);
        assert_eq!(mismatch.destination_size, 5);
        assert_eq!(report.matching_files, 0);
    }

    #[test]
    fn test_missing_folders_count_as_empty() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let profile = Profile::new("Ghost").with_mapping(
            temp_dir.path().join("nope"),
            temp_dir.path().join("nada"),
        );

        let report = VerificationEngine::default().generate_detailed_report(&profile);
        assert!(report.is_successful());
        assert_eq!(report.total_source_files, 0);

        let quick = VerificationEngine::default().verify_quick(&profile, &empty_result());
        assert!(quick.is_successful);
        assert!(quick.files_match);
    }

    #[test]
    fn test_quick_counts_match() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("src");
        let dest = temp_dir.path().join("dst");
        tree(&source, &[("a.txt", "1"), ("b/c.txt", "2")]);
        tree(&dest, &[("x.txt", "1"), ("y.txt", "2")]);

        let profile = Profile::new("Counts").with_mapping(&source, &dest);
        let result = VerificationEngine::default().verify_quick(&profile, &empty_result());

        assert!(result.is_successful);
        assert_eq!(result.source_file_count, 2);
        assert_eq!(result.destination_file_count, 2);
        assert!(result.end_time.is_some());
        assert!(result.summary_message().starts_with("Verification passed"));
    }

    #[test]
    fn test_quick_count_mismatch() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("src");
        let dest = temp_dir.path().join("dst");
        tree(&source, &[("a.txt", "1"), ("b.txt", "2")]);
        tree(&dest, &[("a.txt", "1")]);

        let profile = Profile::new("Short").with_mapping(&source, &dest);
        let result = VerificationEngine::default().verify_quick(&profile, &empty_result());

        assert!(!result.is_successful);
        assert!(!result.files_match);
        assert_eq!(
            result.error_message.as_deref(),
            Some("File count mismatch: Source has 2 files, destination has 1 files")
        );
    }
}
