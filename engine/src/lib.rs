//! # SyncFlow Engine - Transfer and Verification Library
//!
//! A headless engine that copies folder mappings and checks the result.
//! Designed as the foundation for multiple front ends (CLI, automation).
//!
//! ## Overview
//!
//! The engine provides:
//! - Parallel inventory of every mapping's source tree
//! - Free-space validation of the destination volume
//! - Per-file copying with error isolation, cancellation and throttled progress
//! - Retry of just the files that failed in an earlier run
//! - Count-based and path-by-path verification of source against destination
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{CancellationToken, Profile, TransferEngine, VerificationEngine};
//!
//! let profile = Profile::new("Photos").with_mapping("/home/me/photos", "/mnt/backup");
//!
//! let engine = TransferEngine::default();
//! let result = engine.transfer(&profile, None, &CancellationToken::new());
//! println!("{}", result.detailed_summary());
//!
//! if !result.errors.is_empty() {
//!     let retried = engine.retry_failed(&result, None);
//!     println!("{}", retried.summary());
//! }
//!
//! let report = VerificationEngine::default().generate_detailed_report(&profile);
//! println!("{}", report.summary());
//! ```
//!
//! ## Modules
//!
//! - **model**: Profiles, inventories, results and reports
//! - **error**: Error categories and error types
//! - **fs_ops**: The injectable file-copy primitive
//! - **inventory**: Source tree scanning
//! - **storage**: Free-space validation
//! - **transfer**: Run orchestration and retry
//! - **verify**: Post-transfer verification
//! - **progress**: Progress sink trait and throttle

pub mod cancel;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod inventory;
pub mod model;
pub mod progress;
pub mod storage;
pub mod transfer;
pub mod units;
pub mod verify;
pub mod volume;

// Re-export main types and functions
pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use error::{CopyError, EngineError, ErrorCategory};
pub use fs_ops::{FileOperations, LocalFileOperations};
pub use inventory::{build_inventory, calculate_directory_size, count_files};
pub use model::{
    EnhancedTransferProgress, EnhancedTransferResult, FileEntry, FileInventoryResult,
    FolderMapping, Profile, SizeMismatch, StorageValidationResult, TransferError, TransferState,
    VerificationReport, VerificationResult,
};
pub use progress::{ProgressSink, ProgressThrottle};
pub use storage::StorageValidator;
pub use transfer::TransferEngine;
pub use units::{format_bytes, format_duration};
pub use verify::VerificationEngine;
pub use volume::{SystemVolumes, VolumeProbe};
