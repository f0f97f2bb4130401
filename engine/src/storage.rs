//! Destination free-space validation.

use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::config::DEFAULT_CRITICAL_SPACE_THRESHOLD;
use crate::inventory::build_inventory;
use crate::model::{FileInventoryResult, Profile, StorageValidationResult};
use crate::units::format_bytes;
use crate::volume::{SystemVolumes, VolumeProbe};

/// Compares byte requirements against the free space of destination volumes.
#[derive(Clone)]
pub struct StorageValidator {
    probe: Arc<dyn VolumeProbe>,
}

impl Default for StorageValidator {
    fn default() -> Self {
        Self::new(Arc::new(SystemVolumes))
    }
}

impl StorageValidator {
    pub fn new(probe: Arc<dyn VolumeProbe>) -> Self {
        StorageValidator { probe }
    }

    /// Check whether the volume holding `destination` can take `required_bytes`.
    ///
    /// A failed free-space query never errors; it yields an insufficient
    /// result whose message carries the cause.
    pub fn validate(&self, destination: &Path, required_bytes: u64) -> StorageValidationResult {
        let mut result = StorageValidationResult {
            required_bytes,
            destination_drive: self.probe.volume_id(destination),
            ..Default::default()
        };

        match self.probe.available_space(destination) {
            Ok(available) => {
                result.available_bytes = available;
                result.has_sufficient_space = available >= required_bytes;
                result.message = if result.has_sufficient_space {
                    format!(
                        "Sufficient space available on {}\nRequired: {}\nAvailable: {}",
                        result.destination_drive,
                        result.formatted_required(),
                        result.formatted_available()
                    )
                } else {
                    format!(
                        "Insufficient space on {}\nRequired: {}\nAvailable: {}\nShortage: {}\n\n\
                         Please free up at least {} of space or choose a different destination.",
                        result.destination_drive,
                        result.formatted_required(),
                        result.formatted_available(),
                        result.formatted_shortage(),
                        format_bytes(result.shortage_bytes())
                    )
                };
            }
            Err(err) => {
                log::warn!(
                    "Free space query failed for {}: {}",
                    destination.display(),
                    err
                );
                result.has_sufficient_space = false;
                result.message = format!("Unable to check available space: {}", err);
            }
        }

        result
    }

    /// Validate a whole profile, scanning every mapping's source in parallel.
    ///
    /// Only the first mapping's destination volume is checked; all mappings
    /// are assumed to share it.
    pub fn validate_profile(&self, profile: &Profile) -> StorageValidationResult {
        if profile.folder_mappings.is_empty() {
            return no_mappings();
        }

        let cancel = CancellationToken::new();
        let sizes: Vec<u64> = profile
            .folder_mappings
            .par_iter()
            .map(|mapping| match build_inventory(&mapping.source_path, &cancel) {
                Ok(inventory) => inventory.total_size_bytes,
                Err(err) => {
                    log::debug!(
                        "Skipping {} in storage estimate: {}",
                        mapping.source_path.display(),
                        err
                    );
                    0
                }
            })
            .collect();

        self.validate(
            &profile.folder_mappings[0].destination_path,
            sizes.iter().sum(),
        )
    }

    /// Like `validate_profile`, reusing inventories already built for the
    /// profile's mappings (same order).
    pub fn validate_profile_with_inventories(
        &self,
        profile: &Profile,
        inventories: &[FileInventoryResult],
    ) -> StorageValidationResult {
        let Some(first) = profile.folder_mappings.first() else {
            return no_mappings();
        };

        let required = inventories.iter().map(|i| i.total_size_bytes).sum();
        self.validate(&first.destination_path, required)
    }

    /// True when the volume holding `path` has less than `threshold` bytes
    /// free, or when free space cannot be determined.
    pub fn is_critically_low(&self, path: &Path, threshold: u64) -> bool {
        match self.probe.available_space(path) {
            Ok(available) => available < threshold,
            Err(err) => {
                log::warn!(
                    "Free space query failed for {}, assuming critically low: {}",
                    path.display(),
                    err
                );
                true
            }
        }
    }

    /// `is_critically_low` with the default 100 MiB threshold.
    pub fn is_critically_low_default(&self, path: &Path) -> bool {
        self.is_critically_low(path, DEFAULT_CRITICAL_SPACE_THRESHOLD)
    }
}

fn no_mappings() -> StorageValidationResult {
    StorageValidationResult {
        has_sufficient_space: false,
        message: "No folder mappings defined in profile".to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe reporting a fixed amount of free space and counting queries.
    struct FixedProbe {
        free: Option<u64>,
        queries: AtomicUsize,
    }

    impl FixedProbe {
        fn new(free: Option<u64>) -> Arc<Self> {
            Arc::new(FixedProbe {
                free,
                queries: AtomicUsize::new(0),
            })
        }
    }

    impl VolumeProbe for FixedProbe {
        fn available_space(&self, _path: &Path) -> io::Result<u64> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.free
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such volume"))
        }

        fn volume_id(&self, _path: &Path) -> String {
            "TEST:".to_string()
        }
    }

    #[test]
    fn test_validate_sufficient() {
        let validator = StorageValidator::new(FixedProbe::new(Some(10_000)));
        let result = validator.validate(Path::new("/backup"), 1000);

        assert!(result.has_sufficient_space);
        assert_eq!(result.available_bytes, 10_000);
        assert_eq!(result.destination_drive, "TEST:");
        assert!(result.message.starts_with("Sufficient space available on TEST:"));
    }

    #[test]
    fn test_validate_insufficient_reports_shortage() {
        let validator = StorageValidator::new(FixedProbe::new(Some(1024)));
        let result = validator.validate(Path::new("/backup"), 3 * 1024);

        assert!(!result.has_sufficient_space);
        assert!(result.message.contains("Insufficient"));
        assert!(result.message.contains("Shortage: 2.0 KB"));
    }

    #[test]
    fn test_validate_query_failure_is_insufficient() {
        let validator = StorageValidator::new(FixedProbe::new(None));
        let result = validator.validate(Path::new("/nowhere"), 1);

        assert!(!result.has_sufficient_space);
        assert!(result.message.starts_with("Unable to check available space"));
    }

    #[test]
    fn test_validate_real_volume_extremes() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let validator = StorageValidator::default();

        let huge = validator.validate(temp_dir.path(), u64::MAX);
        assert!(!huge.has_sufficient_space);
        assert!(huge.message.contains("Insufficient"));

        let tiny = validator.validate(temp_dir.path(), 1);
        assert!(tiny.has_sufficient_space);
    }

    #[test]
    fn test_profile_sums_every_mapping() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        fs::create_dir_all(&first).expect("Failed to create first");
        fs::create_dir_all(&second).expect("Failed to create second");
        fs::write(first.join("a.bin"), vec![0u8; 1000]).expect("Failed to write a");
        fs::write(second.join("b.bin"), vec![0u8; 2000]).expect("Failed to write b");

        let profile = Profile::new("Sum")
            .with_mapping(&first, temp_dir.path().join("out"))
            .with_mapping(&second, temp_dir.path().join("out"));

        let validator = StorageValidator::new(FixedProbe::new(Some(u64::MAX)));
        let result = validator.validate_profile(&profile);

        assert_eq!(result.required_bytes, 3000);
        assert!(result.has_sufficient_space);
    }

    #[test]
    fn test_profile_missing_source_contributes_zero() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let present = temp_dir.path().join("present");
        fs::create_dir_all(&present).expect("Failed to create present");
        fs::write(present.join("a.bin"), vec![0u8; 500]).expect("Failed to write a");

        let profile = Profile::new("Partial")
            .with_mapping(temp_dir.path().join("absent"), temp_dir.path().join("out"))
            .with_mapping(&present, temp_dir.path().join("out"));

        let validator = StorageValidator::new(FixedProbe::new(Some(u64::MAX)));
        assert_eq!(validator.validate_profile(&profile).required_bytes, 500);
    }

    #[test]
    fn test_profile_without_mappings_does_no_io() {
        let probe = FixedProbe::new(Some(u64::MAX));
        let validator = StorageValidator::new(probe.clone());

        let result = validator.validate_profile(&Profile::new("Empty"));
        assert!(!result.has_sufficient_space);
        assert_eq!(result.message, "No folder mappings defined in profile");

        let result = validator.validate_profile_with_inventories(&Profile::new("Empty"), &[]);
        assert!(!result.has_sufficient_space);
        assert_eq!(probe.queries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_profile_with_inventories_reuses_sizes() {
        let profile = Profile::new("Reuse")
            .with_mapping("/a", "/out")
            .with_mapping("/b", "/out");
        let inventories = vec![
            FileInventoryResult {
                total_size_bytes: 10,
                ..Default::default()
            },
            FileInventoryResult {
                total_size_bytes: 32,
                ..Default::default()
            },
        ];

        let validator = StorageValidator::new(FixedProbe::new(Some(40)));
        let result = validator.validate_profile_with_inventories(&profile, &inventories);
        assert_eq!(result.required_bytes, 42);
        assert!(!result.has_sufficient_space);
    }

    #[test]
    fn test_critically_low() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let validator = StorageValidator::default();

        assert!(validator.is_critically_low(temp_dir.path(), u64::MAX));
        assert!(!validator.is_critically_low(temp_dir.path(), 1));
    }

    #[test]
    fn test_critically_low_when_unknown() {
        let validator = StorageValidator::new(FixedProbe::new(None));
        assert!(validator.is_critically_low_default(Path::new("/nowhere")));
    }
}
