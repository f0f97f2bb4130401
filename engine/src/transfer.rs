//! Transfer orchestration.
//!
//! A run goes through four steps:
//! 1. Build an inventory of every mapping's source, in parallel
//! 2. Validate destination free space (a warning, never a blocker)
//! 3. Copy each mapping's files one by one, in profile order
//! 4. After each mapping, stop early if the destination is critically low
//!
//! Per-file failures are recorded and the loop moves on. Cancellation ends the
//! run immediately with state `Cancelled`. Any other run-level failure is
//! recorded as a single System error and the run ends `Failed`.

use chrono::Utc;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cancel::CancellationToken;
use crate::config::EngineConfig;
use crate::error::{CopyError, EngineError, ErrorCategory};
use crate::fs_ops::{FileOperations, LocalFileOperations};
use crate::inventory::build_inventory;
use crate::model::{
    EnhancedTransferProgress, EnhancedTransferResult, FileInventoryResult, FolderMapping,
    Profile, StorageValidationResult, TransferError, TransferState,
};
use crate::progress::{ProgressSink, ProgressThrottle};
use crate::storage::StorageValidator;

/// Sink type accepted by `TransferEngine` operations.
pub type TransferProgressSink<'a> = Option<&'a dyn ProgressSink<EnhancedTransferProgress>>;

/// Copies profiles and retries failed subsets.
#[derive(Clone)]
pub struct TransferEngine {
    ops: Arc<dyn FileOperations>,
    storage: StorageValidator,
    config: EngineConfig,
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new(Arc::new(LocalFileOperations), StorageValidator::default())
    }
}

impl TransferEngine {
    pub fn new(ops: Arc<dyn FileOperations>, storage: StorageValidator) -> Self {
        Self::with_config(ops, storage, EngineConfig::default())
    }

    pub fn with_config(
        ops: Arc<dyn FileOperations>,
        storage: StorageValidator,
        config: EngineConfig,
    ) -> Self {
        TransferEngine {
            ops,
            storage,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageValidator {
        &self.storage
    }

    /// Inventories of every mapping's source, in profile order.
    ///
    /// # Errors
    /// Returns `EngineError::Cancelled` if `cancel` fires during any scan.
    pub fn build_inventories(
        &self,
        profile: &Profile,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileInventoryResult>, EngineError> {
        profile
            .folder_mappings
            .par_iter()
            .map(|mapping| build_inventory(&mapping.source_path, cancel))
            .collect()
    }

    /// Copy every mapping of `profile`.
    ///
    /// Never fails: the outcome, including cancellation and run-level errors,
    /// is described by the returned result.
    pub fn transfer(
        &self,
        profile: &Profile,
        sink: TransferProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> EnhancedTransferResult {
        let started = Instant::now();
        let start_time = Utc::now();
        let throttle = ProgressThrottle::new(self.config.progress_interval);
        let mut progress = EnhancedTransferProgress::new();
        let mut storage_info = None;

        log::info!("Starting transfer for profile: {}", profile.name);

        let state = match self.run(
            profile,
            &mut progress,
            &mut storage_info,
            sink,
            &throttle,
            cancel,
        ) {
            Ok(state) => state,
            Err(EngineError::Cancelled) => {
                log::info!("Transfer cancelled for profile: {}", profile.name);
                TransferState::Cancelled
            }
            Err(err) => {
                log::error!("Transfer failed for profile {}: {}", profile.name, err);
                progress.errors.push(TransferError::new(
                    None,
                    None,
                    err.to_string(),
                    ErrorCategory::System,
                ));
                TransferState::Failed
            }
        };

        throttle.force(sink, progress.clone());

        let result = finish(progress, state, storage_info, start_time, started);
        log::info!(
            "Transfer {} for profile {}: {}/{} files in {}",
            result.state,
            profile.name,
            result.successful_files,
            result.total_files,
            result.formatted_duration()
        );
        result
    }

    fn run(
        &self,
        profile: &Profile,
        progress: &mut EnhancedTransferProgress,
        storage_info: &mut Option<StorageValidationResult>,
        sink: TransferProgressSink<'_>,
        throttle: &ProgressThrottle,
        cancel: &CancellationToken,
    ) -> Result<TransferState, EngineError> {
        if let Some(index) = profile.folder_mappings.iter().position(|m| !m.is_valid()) {
            return Err(EngineError::InvalidMapping { index: index + 1 });
        }

        progress.current_file = "Building file inventory...".to_string();
        throttle.report(sink, || progress.clone());

        let inventories = self.build_inventories(profile, cancel)?;
        for (mapping, inventory) in profile.folder_mappings.iter().zip(&inventories) {
            for diagnostic in &inventory.inaccessible_paths {
                log::warn!("{}: {}", mapping.source_path.display(), diagnostic);
            }
        }
        progress.total_files = inventories.iter().map(|i| i.total_file_count).sum();
        progress.total_bytes = inventories.iter().map(|i| i.total_size_bytes).sum();

        progress.current_file = "Validating storage space...".to_string();
        throttle.report(sink, || progress.clone());

        let validation = self
            .storage
            .validate_profile_with_inventories(profile, &inventories);
        if !validation.has_sufficient_space {
            log::warn!("Insufficient storage space for transfer: {}", validation.message);
        }
        *storage_info = Some(validation);

        progress.current_file = "Starting file transfers...".to_string();
        throttle.report(sink, || progress.clone());

        for (mapping, inventory) in profile.folder_mappings.iter().zip(&inventories) {
            if inventory.total_file_count == 0 {
                log::info!("No files to transfer in {}", mapping.source_path.display());
                continue;
            }

            progress.current_file = format!("Processing {}", mapping.source_path.display());
            throttle.report(sink, || progress.clone());

            self.transfer_mapping(
                mapping,
                inventory,
                profile.overwrite_existing,
                progress,
                sink,
                throttle,
                cancel,
            )?;

            if self
                .storage
                .is_critically_low(&mapping.destination_path, self.config.critical_space_threshold)
            {
                log::warn!(
                    "Stopping transfer: critically low disk space on {}",
                    mapping.destination_path.display()
                );
                progress.errors.push(TransferError::new(
                    None,
                    Some(mapping.destination_path.clone()),
                    "Transfer paused: Critically low disk space",
                    ErrorCategory::Storage,
                ));
                return Ok(TransferState::Failed);
            }
        }

        Ok(TransferState::Completed)
    }

    #[allow(clippy::too_many_arguments)]
    fn transfer_mapping(
        &self,
        mapping: &FolderMapping,
        inventory: &FileInventoryResult,
        overwrite: bool,
        progress: &mut EnhancedTransferProgress,
        sink: TransferProgressSink<'_>,
        throttle: &ProgressThrottle,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        if !self.ops.directory_exists(&mapping.destination_path) {
            // Per-file copies recreate parents and record the real failure
            if let Err(err) = self.ops.create_directory(&mapping.destination_path) {
                log::warn!("{}", err);
            }
        }

        for file in &inventory.files {
            cancel.check()?;

            let destination = destination_for(mapping, &file.path);
            progress.current_file = file.file_name();

            match self.ops.copy_file(&file.path, &destination, overwrite, cancel) {
                Ok(true) => {
                    progress.successful_files += 1;
                    progress.transferred_bytes += file.size;
                }
                Ok(false) => {
                    log::debug!("Skipped existing file: {}", destination.display());
                    progress.successful_files += 1;
                    progress.skipped_files += 1;
                }
                Err(CopyError::Cancelled) => return Err(EngineError::Cancelled),
                Err(err) => {
                    log::error!("Failed to copy file {}: {}", file.path.display(), err);
                    progress.failed_files += 1;
                    progress.errors.push(TransferError::new(
                        Some(file.path.clone()),
                        Some(destination),
                        err.to_string(),
                        err.category(),
                    ));
                }
            }

            progress.processed_files += 1;
            progress.processed_bytes += file.size;
            throttle.report(sink, || progress.clone());
        }

        Ok(())
    }

    /// Re-attempt only the entries of `previous.errors`.
    ///
    /// The new result covers just that subset: `total_files` is the number of
    /// errors passed in. Entries missing either path are not attempted. A
    /// result without errors is returned unchanged.
    pub fn retry_failed(
        &self,
        previous: &EnhancedTransferResult,
        sink: TransferProgressSink<'_>,
    ) -> EnhancedTransferResult {
        if previous.errors.is_empty() {
            return previous.clone();
        }

        let started = Instant::now();
        let start_time = Utc::now();
        let throttle = ProgressThrottle::new(self.config.progress_interval);
        let cancel = CancellationToken::new();
        let mut progress = EnhancedTransferProgress::new();

        progress.total_files = previous.errors.len();
        progress.total_bytes = previous
            .errors
            .iter()
            .filter_map(|e| e.source_path.as_deref())
            .filter_map(|p| self.ops.file_size(p).ok())
            .sum();

        log::info!("Retrying {} failed transfers", previous.errors.len());

        for error in &previous.errors {
            let (Some(source), Some(destination)) = (&error.source_path, &error.destination_path)
            else {
                continue;
            };
            if !error.is_retryable() {
                continue;
            }

            progress.current_file = error.short_path();
            throttle.report(sink, || progress.clone());

            let size = self.ops.file_size(source).unwrap_or(0);
            match self
                .ops
                .copy_file(source, destination, self.config.overwrite_on_retry, &cancel)
            {
                Ok(copied) => {
                    progress.successful_files += 1;
                    if copied {
                        progress.transferred_bytes += size;
                    } else {
                        progress.skipped_files += 1;
                    }
                }
                Err(err) => {
                    log::error!("Retry failed for {}: {}", source.display(), err);
                    progress.failed_files += 1;
                    progress.errors.push(TransferError::new(
                        Some(source.clone()),
                        Some(destination.clone()),
                        err.to_string(),
                        err.category(),
                    ));
                }
            }

            progress.processed_files += 1;
            progress.processed_bytes += size;
        }

        throttle.force(sink, progress.clone());

        finish(
            progress,
            TransferState::Completed,
            None,
            start_time,
            started,
        )
    }
}

/// Where `file` lands: the mapping destination plus the file's path relative
/// to the parent of the mapping source, so the source folder name is kept.
pub fn destination_for(mapping: &FolderMapping, file: &Path) -> PathBuf {
    let base = mapping
        .source_path
        .parent()
        .unwrap_or(&mapping.source_path);

    match file.strip_prefix(base) {
        Ok(relative) => mapping.destination_path.join(relative),
        Err(_) => mapping
            .destination_path
            .join(file.file_name().unwrap_or(file.as_os_str())),
    }
}

fn finish(
    progress: EnhancedTransferProgress,
    state: TransferState,
    storage_info: Option<StorageValidationResult>,
    start_time: chrono::DateTime<Utc>,
    started: Instant,
) -> EnhancedTransferResult {
    let is_success = state != TransferState::Cancelled
        && EnhancedTransferResult::compute_success(
            progress.failed_files,
            progress.successful_files,
        );

    EnhancedTransferResult {
        is_success,
        state,
        total_files: progress.total_files,
        successful_files: progress.successful_files,
        failed_files: progress.failed_files,
        skipped_files: progress.skipped_files,
        total_bytes: progress.total_bytes,
        transferred_bytes: progress.transferred_bytes,
        duration: started.elapsed(),
        errors: progress.errors,
        storage_info,
        start_time,
        end_time: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::VolumeProbe;
    use std::fs;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedProbe(u64);

    impl VolumeProbe for FixedProbe {
        fn available_space(&self, _path: &Path) -> io::Result<u64> {
            Ok(self.0)
        }

        fn volume_id(&self, _path: &Path) -> String {
            "TEST:".to_string()
        }
    }

    /// Local copies, except that files named `bad.txt` are always denied.
    struct DenyBadFiles;

    impl FileOperations for DenyBadFiles {
        fn copy_file(
            &self,
            src: &Path,
            dst: &Path,
            overwrite: bool,
            cancel: &CancellationToken,
        ) -> Result<bool, CopyError> {
            if src.file_name().is_some_and(|n| n == "bad.txt") {
                return Err(CopyError::from_io(
                    src,
                    io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                ));
            }
            LocalFileOperations.copy_file(src, dst, overwrite, cancel)
        }

        fn create_directory(&self, path: &Path) -> Result<(), CopyError> {
            LocalFileOperations.create_directory(path)
        }
    }

    fn engine_with_free_space(free: u64, config: EngineConfig) -> TransferEngine {
        TransferEngine::with_config(
            Arc::new(LocalFileOperations),
            StorageValidator::new(Arc::new(FixedProbe(free))),
            config,
        )
    }

    fn write_files(dir: &Path, files: &[(&str, &str)]) {
        fs::create_dir_all(dir).expect("Failed to create source dir");
        for (name, content) in files {
            fs::write(dir.join(name), content).expect("Failed to write file");
        }
    }

    #[test]
    fn test_transfer_two_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        let dest = temp_dir.path().join("dest");
        write_files(&source, &[("test1.txt", "Content 1"), ("test2.txt", "Content 2")]);

        let profile = Profile::new("Test").with_mapping(&source, &dest);
        let result = TransferEngine::default().transfer(&profile, None, &CancellationToken::new());

        assert!(result.is_success);
        assert_eq!(result.state, TransferState::Completed);
        assert_eq!(result.total_files, 2);
        assert_eq!(result.successful_files, 2);
        assert_eq!(result.failed_files, 0);
        assert_eq!(result.total_bytes, 18);
        assert_eq!(result.transferred_bytes, 18);
        assert!(result.storage_info.is_some());

        let copied = dest.join("source").join("test1.txt");
        assert_eq!(fs::read_to_string(copied).expect("Failed to read copy"), "Content 1");
    }

    #[test]
    fn test_transfer_keeps_nested_layout() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("photos");
        write_files(&source.join("2024").join("june"), &[("beach.jpg", "jpg")]);

        let dest = temp_dir.path().join("backup");
        let profile = Profile::new("Photos").with_mapping(&source, &dest);
        let result = TransferEngine::default().transfer(&profile, None, &CancellationToken::new());

        assert!(result.is_success);
        assert!(dest.join("photos").join("2024").join("june").join("beach.jpg").exists());
    }

    #[test]
    fn test_empty_profile_is_not_success() {
        let result = TransferEngine::default().transfer(
            &Profile::new("Empty"),
            None,
            &CancellationToken::new(),
        );
        assert!(!result.is_success);
        assert_eq!(result.state, TransferState::Completed);
        assert_eq!(result.total_files, 0);
    }

    #[test]
    fn test_already_cancelled_token() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        write_files(&source, &[("a.txt", "a")]);

        let token = CancellationToken::new();
        token.cancel();

        let profile = Profile::new("Cancelled").with_mapping(&source, temp_dir.path().join("dest"));
        let result = TransferEngine::default().transfer(&profile, None, &token);

        assert!(!result.is_success);
        assert_eq!(result.state, TransferState::Cancelled);
        assert!(result.errors.is_empty());
        assert!(!temp_dir.path().join("dest").join("source").join("a.txt").exists());
    }

    #[test]
    fn test_cancel_mid_run_keeps_copied_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        let dest = temp_dir.path().join("dest");
        write_files(
            &source,
            &[("a.txt", "1"), ("b.txt", "2"), ("c.txt", "3"), ("d.txt", "4"), ("e.txt", "5")],
        );

        let token = CancellationToken::new();
        let trigger = token.clone();
        let cancel_after_two = move |p: EnhancedTransferProgress| {
            if p.processed_files >= 2 {
                trigger.cancel();
            }
        };
        let sink: &dyn ProgressSink<EnhancedTransferProgress> = &cancel_after_two;

        let config = EngineConfig {
            progress_interval: Duration::ZERO,
            ..Default::default()
        };
        let engine = engine_with_free_space(u64::MAX, config);
        let profile = Profile::new("Interrupted").with_mapping(&source, &dest);
        let result = engine.transfer(&profile, Some(sink), &token);

        assert_eq!(result.state, TransferState::Cancelled);
        assert!(!result.is_success);
        assert_eq!(result.successful_files, 2);
        assert_eq!(result.failed_files, 0);
        assert!(result.errors.is_empty());

        let copied = dest.join("source");
        assert!(copied.join("a.txt").exists());
        assert!(copied.join("b.txt").exists());
        assert!(!copied.join("c.txt").exists());

        let leftovers = walkdir::WalkDir::new(&dest)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".syncflow-part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_blank_mapping_is_system_failure() {
        let profile = Profile::new("Broken").with_mapping("", "/tmp/out");
        let result = TransferEngine::default().transfer(&profile, None, &CancellationToken::new());

        assert!(!result.is_success);
        assert_eq!(result.state, TransferState::Failed);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, ErrorCategory::System);
    }

    #[test]
    fn test_failed_file_does_not_stop_mapping() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        write_files(&source, &[("a.txt", "a"), ("bad.txt", "b"), ("c.txt", "c")]);

        let engine = TransferEngine::new(
            Arc::new(DenyBadFiles),
            StorageValidator::new(Arc::new(FixedProbe(u64::MAX))),
        );
        let profile = Profile::new("Partial").with_mapping(&source, temp_dir.path().join("dest"));
        let result = engine.transfer(&profile, None, &CancellationToken::new());

        assert!(!result.is_success);
        assert_eq!(result.state, TransferState::Completed);
        assert_eq!(result.successful_files, 2);
        assert_eq!(result.failed_files, 1);
        assert_eq!(result.errors.len(), 1);

        let error = &result.errors[0];
        assert_eq!(error.category, ErrorCategory::AccessDenied);
        assert_eq!(error.short_path(), "bad.txt");
        assert!(error.is_retryable());
    }

    #[test]
    fn test_existing_files_are_skipped_without_overwrite() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        let dest = temp_dir.path().join("dest");
        write_files(&source, &[("keep.txt", "new")]);
        write_files(&dest.join("source"), &[("keep.txt", "old")]);

        let profile = Profile::new("Skip").with_mapping(&source, &dest);
        let result = TransferEngine::default().transfer(&profile, None, &CancellationToken::new());

        assert!(result.is_success);
        assert_eq!(result.skipped_files, 1);
        assert_eq!(result.transferred_bytes, 0);
        assert_eq!(
            fs::read_to_string(dest.join("source").join("keep.txt")).expect("Failed to read"),
            "old"
        );
    }

    #[test]
    fn test_insufficient_space_is_only_a_warning() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        write_files(&source, &[("a.txt", "0123456789")]);

        let config = EngineConfig {
            critical_space_threshold: 0,
            ..Default::default()
        };
        let engine = engine_with_free_space(1, config);
        let profile = Profile::new("Tight").with_mapping(&source, temp_dir.path().join("dest"));
        let result = engine.transfer(&profile, None, &CancellationToken::new());

        assert!(result.is_success);
        let storage = result.storage_info.expect("Storage snapshot missing");
        assert!(!storage.has_sufficient_space);
        assert_eq!(storage.required_bytes, 10);
    }

    #[test]
    fn test_critically_low_space_stops_after_mapping() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        write_files(&first, &[("one.txt", "1")]);
        write_files(&second, &[("two.txt", "2")]);

        let dest = temp_dir.path().join("dest");
        let engine = engine_with_free_space(1024, EngineConfig::default());
        let profile = Profile::new("Full")
            .with_mapping(&first, &dest)
            .with_mapping(&second, &dest);
        let result = engine.transfer(&profile, None, &CancellationToken::new());

        assert_eq!(result.state, TransferState::Failed);
        assert_eq!(result.successful_files, 1);
        assert!(dest.join("first").join("one.txt").exists());
        assert!(!dest.join("second").join("two.txt").exists());

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, ErrorCategory::Storage);
        assert!(!result.errors[0].is_retryable());
    }

    #[test]
    fn test_progress_reports_first_and_last_state() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("source");
        let names: Vec<String> = (0..20).map(|i| format!("file{:02}.txt", i)).collect();
        let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "x")).collect();
        write_files(&source, &files);

        let snapshots = Mutex::new(Vec::new());
        let record = |p: EnhancedTransferProgress| {
            snapshots.lock().expect("Lock poisoned").push(p);
        };
        let sink: &dyn ProgressSink<EnhancedTransferProgress> = &record;

        let config = EngineConfig {
            progress_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let engine = TransferEngine::with_config(
            Arc::new(LocalFileOperations),
            StorageValidator::new(Arc::new(FixedProbe(u64::MAX))),
            config,
        );
        let profile = Profile::new("Many").with_mapping(&source, temp_dir.path().join("dest"));
        let result = engine.transfer(&profile, Some(sink), &CancellationToken::new());
        assert!(result.is_success);

        let snapshots = snapshots.into_inner().expect("Lock poisoned");
        assert_eq!(snapshots.len(), 2, "only the first and terminal reports pass");
        assert_eq!(snapshots[0].processed_files, 0);
        let last = snapshots.last().expect("No snapshots");
        assert_eq!(last.processed_files, 20);
        assert_eq!(last.percent_complete(), 100.0);
    }

    #[test]
    fn test_retry_single_entry_now_copyable() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("retry.txt");
        let destination = temp_dir.path().join("out").join("retry.txt");
        fs::write(&source, "retry me").expect("Failed to write source");

        let previous = EnhancedTransferResult {
            is_success: false,
            state: TransferState::Completed,
            total_files: 10,
            successful_files: 9,
            failed_files: 1,
            skipped_files: 0,
            total_bytes: 100,
            transferred_bytes: 90,
            duration: Duration::from_secs(1),
            errors: vec![TransferError::new(
                Some(source.clone()),
                Some(destination.clone()),
                "locked",
                ErrorCategory::Io,
            )],
            storage_info: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
        };

        let result = TransferEngine::default().retry_failed(&previous, None);

        assert_eq!(result.total_files, 1);
        assert_eq!(result.successful_files, 1);
        assert_eq!(result.failed_files, 0);
        assert!(result.is_success);
        assert_eq!(fs::read_to_string(destination).expect("Failed to read"), "retry me");
    }

    #[test]
    fn test_retry_skips_entries_without_paths() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let missing = temp_dir.path().join("ghost.txt");

        let mut previous = TransferEngine::default().transfer(
            &Profile::new("Empty"),
            None,
            &CancellationToken::new(),
        );
        previous.errors = vec![
            TransferError::new(None, Some(temp_dir.path().into()), "low", ErrorCategory::Storage),
            TransferError::new(
                Some(missing.clone()),
                Some(temp_dir.path().join("out.txt")),
                "gone",
                ErrorCategory::FileNotFound,
            ),
        ];

        let result = TransferEngine::default().retry_failed(&previous, None);

        assert_eq!(result.total_files, 2);
        assert_eq!(result.successful_files, 0);
        assert_eq!(result.failed_files, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, ErrorCategory::FileNotFound);
        assert!(!result.is_success);
    }

    #[test]
    fn test_retry_sizes_come_from_file_operations() {
        /// Reports every file as 4 KiB and copies nothing.
        struct FakeSizes;

        impl FileOperations for FakeSizes {
            fn copy_file(
                &self,
                _src: &Path,
                _dst: &Path,
                _overwrite: bool,
                _cancel: &CancellationToken,
            ) -> Result<bool, CopyError> {
                Ok(true)
            }

            fn create_directory(&self, _path: &Path) -> Result<(), CopyError> {
                Ok(())
            }

            fn file_size(&self, _path: &Path) -> Result<u64, CopyError> {
                Ok(4096)
            }
        }

        let previous = EnhancedTransferResult {
            failed_files: 2,
            errors: vec![
                TransferError::new(
                    Some(PathBuf::from("/nowhere/a.bin")),
                    Some(PathBuf::from("/elsewhere/a.bin")),
                    "locked",
                    ErrorCategory::Io,
                ),
                TransferError::new(
                    Some(PathBuf::from("/nowhere/b.bin")),
                    Some(PathBuf::from("/elsewhere/b.bin")),
                    "locked",
                    ErrorCategory::Io,
                ),
            ],
            ..Default::default()
        };

        let engine = TransferEngine::new(
            Arc::new(FakeSizes),
            StorageValidator::new(Arc::new(FixedProbe(u64::MAX))),
        );
        let result = engine.retry_failed(&previous, None);

        assert!(result.is_success);
        assert_eq!(result.successful_files, 2);
        assert_eq!(result.total_bytes, 8192);
        assert_eq!(result.transferred_bytes, 8192);
    }

    #[test]
    fn test_retry_without_errors_returns_previous() {
        let previous = TransferEngine::default().transfer(
            &Profile::new("Empty"),
            None,
            &CancellationToken::new(),
        );
        let result = TransferEngine::default().retry_failed(&previous, None);
        assert_eq!(result, previous);
    }

    #[test]
    fn test_destination_for_keeps_source_folder_name() {
        let mapping = FolderMapping::new("/data/photos", "/mnt/backup");
        assert_eq!(
            destination_for(&mapping, Path::new("/data/photos/2024/a.jpg")),
            PathBuf::from("/mnt/backup/photos/2024/a.jpg")
        );
    }
}
