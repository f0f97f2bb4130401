//! JSON profile store.
//!
//! Profiles live in one pretty-printed JSON array with camelCase keys. Older
//! files may hold records with `sourceFolders` + `destinationFolder` instead
//! of `folderMappings`; `upgrade_legacy` converts those on load and import.

use chrono::Utc;
use engine::Profile;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access profile store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid profile data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Profile is invalid:\n  {}", .0.join("\n  "))]
    Validation(Vec<String>),

    #[error("A profile with the same configuration already exists: '{name}'")]
    Duplicate { name: String },

    #[error("Profile not found: {key}")]
    NotFound { key: String },

    #[error("{count} profiles are named '{key}'; use the profile id instead")]
    Ambiguous { key: String, count: usize },
}

/// Profiles backed by a JSON file. Every mutation is written through.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<Profile>,
}

impl ProfileStore {
    /// Load the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let profiles = match fs::read_to_string(&path) {
            Ok(json) => parse_profiles(&json)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        log::debug!("Loaded {} profiles from {}", profiles.len(), path.display());
        Ok(ProfileStore { path, profiles })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn get(&self, id: Uuid) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Look a profile up by id, falling back to its name.
    ///
    /// Names are not unique, so a name shared by several profiles is an error.
    pub fn resolve(&self, key: &str) -> Result<&Profile, StoreError> {
        if let Some(profile) = Uuid::parse_str(key).ok().and_then(|id| self.get(id)) {
            return Ok(profile);
        }

        let name = key.to_lowercase();
        let mut matches = self.profiles.iter().filter(|p| p.name.to_lowercase() == name);
        match (matches.next(), matches.count()) {
            (Some(profile), 0) => Ok(profile),
            (Some(_), others) => Err(StoreError::Ambiguous {
                key: key.to_string(),
                count: others + 1,
            }),
            (None, _) => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    /// Validate and insert or replace `profile`, stamping its timestamps.
    pub fn save(&mut self, mut profile: Profile) -> Result<Profile, StoreError> {
        let errors = validate_for_save(&profile);
        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }

        if let Some(duplicate) = self
            .profiles
            .iter()
            .find(|p| p.id != profile.id && p.is_duplicate(&profile))
        {
            log::warn!("Duplicate profile detected: {}", profile.name);
            return Err(StoreError::Duplicate {
                name: duplicate.name.clone(),
            });
        }

        let now = Utc::now();
        match self.profiles.iter().position(|p| p.id == profile.id) {
            Some(index) => {
                profile.created_date = self.profiles[index].created_date;
                profile.touch();
                self.profiles[index] = profile.clone();
            }
            None => {
                profile.created_date = now;
                profile.last_modified = now;
                self.profiles.push(profile.clone());
            }
        }

        self.persist()?;
        Ok(profile)
    }

    pub fn delete(&mut self, id: Uuid) -> Result<Profile, StoreError> {
        let index = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound { key: id.to_string() })?;

        let removed = self.profiles.remove(index);
        self.persist()?;
        Ok(removed)
    }

    /// Pretty JSON for `profiles`, in the store's own format.
    pub fn export(profiles: &[Profile]) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(profiles)?)
    }

    /// Add every profile in `json` under a fresh id. Returns how many were added.
    pub fn import(&mut self, json: &str) -> Result<usize, StoreError> {
        let imported = parse_profiles(json)?;
        let count = imported.len();
        let now = Utc::now();

        for mut profile in imported {
            profile.id = Uuid::new_v4();
            profile.created_date = now;
            profile.last_modified = now;
            self.profiles.push(profile);
        }

        self.persist()?;
        log::info!("Imported {} profiles", count);
        Ok(count)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.profiles)?;
        fs::write(&self.path, json).map_err(io_err)
    }
}

fn parse_profiles(json: &str) -> Result<Vec<Profile>, StoreError> {
    let records: Vec<Value> = serde_json::from_str(json)?;
    records
        .into_iter()
        .map(|record| -> Result<Profile, StoreError> {
            Ok(serde_json::from_value(upgrade_legacy(record))?)
        })
        .collect()
}

/// Profile checks plus the store's own rule that every source must exist.
fn validate_for_save(profile: &Profile) -> Vec<String> {
    let mut errors = profile.validation_errors();
    for (i, mapping) in profile.folder_mappings.iter().enumerate() {
        if mapping.is_valid() && !mapping.source_path.is_dir() {
            errors.push(format!(
                "Folder mapping {}: Source folder does not exist: {}",
                i + 1,
                mapping.source_path.display()
            ));
        }
    }
    errors
}

/// Convert a stored record from the single-destination format.
///
/// A record without `folderMappings` (or with an empty list) that carries a
/// `sourceFolders` array and a non-blank `destinationFolder` gets one mapping
/// per non-blank source, all sharing that destination. The legacy keys are
/// removed. Missing ids and timestamps are filled in. Anything else is
/// returned untouched.
pub fn upgrade_legacy(record: Value) -> Value {
    let mut fields = match record {
        Value::Object(fields) => fields,
        other => return other,
    };

    let has_mappings = fields
        .get("folderMappings")
        .and_then(Value::as_array)
        .is_some_and(|m| !m.is_empty());

    let sources = fields.remove("sourceFolders");
    let destination = fields.remove("destinationFolder");

    if !has_mappings {
        let destination = destination
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty());

        if let (Some(Value::Array(sources)), Some(destination)) = (&sources, destination) {
            let mappings: Vec<Value> = sources
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(|source| legacy_mapping(source, destination))
                .collect();
            fields.insert("folderMappings".to_string(), Value::Array(mappings));
        }
    }

    let now = Value::String(Utc::now().to_rfc3339());
    fields
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    fields.entry("createdDate").or_insert_with(|| now.clone());
    fields.entry("lastModified").or_insert(now);

    Value::Object(fields)
}

fn legacy_mapping(source: &str, destination: &str) -> Value {
    let mut mapping = Map::new();
    mapping.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    mapping.insert("sourcePath".to_string(), Value::String(source.to_string()));
    mapping.insert(
        "destinationPath".to_string(),
        Value::String(destination.to_string()),
    );
    Value::Object(mapping)
}
