//! SyncFlow - Command-line interface for the transfer engine.
//!
//! Manages saved profiles and runs, retries and verifies transfers with
//! progress reporting to stderr.

mod config;
mod display;
mod store;

use clap::{Parser, Subcommand};
use engine::{
    build_inventory, CancellationToken, EnhancedTransferProgress, EnhancedTransferResult,
    FolderMapping, Profile, ProgressSink, StorageValidator, TransferEngine, TransferState,
    VerificationEngine,
};
use std::fs;
use std::path::{Path, PathBuf};

use crate::display::ProgressPrinter;
use crate::store::ProfileStore;

/// SyncFlow - Copy folder mappings and verify the result
#[derive(Parser, Debug)]
#[command(name = "syncflow")]
#[command(version = "0.1.0")]
#[command(about = "Copy folder mappings with storage checks, retry and verification")]
struct Cli {
    /// Profile store file
    #[arg(long, global = true, value_name = "FILE", env = config::STORE_ENV)]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage saved profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Show the inventory of a directory
    Scan {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Check destination free space for a profile or a byte count
    Space {
        /// Profile name or id
        #[arg(value_name = "PROFILE", required_unless_present = "path")]
        profile: Option<String>,

        /// Destination to check instead of a profile
        #[arg(long, value_name = "PATH", requires = "bytes", conflicts_with = "profile")]
        path: Option<PathBuf>,

        /// Bytes required at --path
        #[arg(long, value_name = "BYTES", requires = "path")]
        bytes: Option<u64>,
    },

    /// Transfer every mapping of a profile
    Run {
        /// Profile name or id
        #[arg(value_name = "PROFILE")]
        profile: String,

        /// Compare file counts after the transfer
        #[arg(long)]
        verify: bool,

        /// Print a path-by-path verification report after the transfer
        #[arg(long)]
        report: bool,

        /// Retry failed files once before finishing
        #[arg(long)]
        retry_failed: bool,

        /// Write the final result as JSON for a later `retry`
        #[arg(long, value_name = "FILE")]
        save_result: Option<PathBuf>,
    },

    /// Retry the failed files of a saved result
    Retry {
        #[arg(value_name = "RESULT_FILE")]
        result_file: PathBuf,

        /// Write the retry result as JSON
        #[arg(long, value_name = "FILE")]
        save_result: Option<PathBuf>,
    },

    /// Verify a profile's destinations against its sources
    Verify {
        /// Profile name or id
        #[arg(value_name = "PROFILE")]
        profile: String,

        /// Compare every file by relative path and size
        #[arg(long)]
        detailed: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Create a profile
    Add {
        name: String,

        /// Folder mapping as SOURCE=DESTINATION (repeatable)
        #[arg(long = "map", value_name = "SRC=DST", required = true, value_parser = parse_mapping)]
        mappings: Vec<FolderMapping>,

        /// Overwrite files that already exist at the destination
        #[arg(long)]
        overwrite: bool,
    },

    /// List saved profiles
    List,

    /// Show one profile
    Show { profile: String },

    /// Delete a profile
    Remove { profile: String },

    /// Export profiles as JSON (all when none are named)
    Export {
        profiles: Vec<String>,

        /// Write to a file instead of stdout
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Import profiles from a JSON export
    Import { file: PathBuf },
}

fn parse_mapping(value: &str) -> Result<FolderMapping, String> {
    match value.split_once('=') {
        Some((source, destination))
            if !source.trim().is_empty() && !destination.trim().is_empty() =>
        {
            Ok(FolderMapping::new(source.trim(), destination.trim()))
        }
        _ => Err(format!(
            "Invalid mapping '{}'. Expected SOURCE=DESTINATION",
            value
        )),
    }
}

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Clean,
    /// Files failed, space ran short or verification found issues
    WithFailures,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let cancel = CancellationToken::new();
    if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.flag()) {
        log::warn!("Ctrl-C will not cancel transfers: {}", e);
    }

    // Exit code tracking
    let exit_code = match run_cli(&cli, &cancel) {
        Ok(Completion::Clean) => 0,
        Ok(Completion::WithFailures) => 1,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli, cancel: &CancellationToken) -> Result<Completion, String> {
    match &cli.command {
        Command::Profile(command) => {
            let mut store = open_store(cli)?;
            run_profile_command(&mut store, command)
        }
        Command::Scan { path } => scan(path, cancel),
        Command::Space {
            profile,
            path,
            bytes,
        } => {
            let validator = StorageValidator::default();
            let storage = match (profile, path, bytes) {
                (_, Some(path), Some(bytes)) => validator.validate(path, *bytes),
                (Some(key), _, _) => {
                    let store = open_store(cli)?;
                    let profile = store.resolve(key).map_err(|e| e.to_string())?;
                    validator.validate_profile(profile)
                }
                _ => return Err("Either PROFILE or --path with --bytes is required".to_string()),
            };
            println!("{}", display::render_storage(&storage));
            Ok(if storage.has_sufficient_space {
                Completion::Clean
            } else {
                Completion::WithFailures
            })
        }
        Command::Run {
            profile,
            verify,
            report,
            retry_failed,
            save_result,
        } => {
            let store = open_store(cli)?;
            let profile = store.resolve(profile).map_err(|e| e.to_string())?.clone();
            let options = RunOptions {
                verify: *verify,
                report: *report,
                retry_failed: *retry_failed,
                save_result: save_result.as_deref(),
                verbose: cli.verbose,
            };
            run_profile(&profile, &options, cancel)
        }
        Command::Retry {
            result_file,
            save_result,
        } => retry_saved(result_file, save_result.as_deref(), cli.verbose),
        Command::Verify { profile, detailed } => {
            let store = open_store(cli)?;
            let profile = store.resolve(profile).map_err(|e| e.to_string())?;
            Ok(verify(profile, None, *detailed))
        }
    }
}

fn open_store(cli: &Cli) -> Result<ProfileStore, String> {
    let path = config::resolve_store_path(cli.store.clone())?;
    ProfileStore::open(path).map_err(|e| e.to_string())
}

fn run_profile_command(
    store: &mut ProfileStore,
    command: &ProfileCommand,
) -> Result<Completion, String> {
    match command {
        ProfileCommand::Add {
            name,
            mappings,
            overwrite,
        } => {
            let mut profile = Profile::new(name.as_str());
            profile.folder_mappings = mappings.clone();
            profile.overwrite_existing = *overwrite;
            let saved = store.save(profile).map_err(|e| e.to_string())?;
            println!("Saved profile '{}' ({})", saved.name, saved.id);
        }
        ProfileCommand::List => {
            if store.list().is_empty() {
                println!("No profiles in {}", store.path().display());
            }
            for profile in store.list() {
                println!(
                    "{}  {}  ({} mappings)",
                    profile.id,
                    profile.name,
                    profile.folder_mappings.len()
                );
            }
        }
        ProfileCommand::Show { profile } => {
            let profile = store.resolve(profile).map_err(|e| e.to_string())?;
            println!("Name: {}", profile.name);
            println!("Id: {}", profile.id);
            println!("Overwrite existing: {}", profile.overwrite_existing);
            println!("Created: {}", profile.created_date.to_rfc3339());
            println!("Last modified: {}", profile.last_modified.to_rfc3339());
            println!("Mappings:");
            for mapping in &profile.folder_mappings {
                println!("  {}", mapping.display_text());
            }
        }
        ProfileCommand::Remove { profile } => {
            let id = store.resolve(profile).map_err(|e| e.to_string())?.id;
            let removed = store.delete(id).map_err(|e| e.to_string())?;
            println!("Removed profile '{}'", removed.name);
        }
        ProfileCommand::Export { profiles, output } => {
            let selected: Vec<Profile> = if profiles.is_empty() {
                store.list().to_vec()
            } else {
                profiles
                    .iter()
                    .map(|key| store.resolve(key).cloned().map_err(|e| e.to_string()))
                    .collect::<Result<_, _>>()?
            };
            let json = ProfileStore::export(&selected).map_err(|e| e.to_string())?;
            match output {
                Some(path) => {
                    fs::write(path, json)
                        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
                    println!("Exported {} profiles to {}", selected.len(), path.display());
                }
                None => println!("{}", json),
            }
        }
        ProfileCommand::Import { file } => {
            let json = fs::read_to_string(file)
                .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
            let count = store.import(&json).map_err(|e| e.to_string())?;
            println!("Imported {} profiles", count);
        }
    }
    Ok(Completion::Clean)
}

fn scan(path: &Path, cancel: &CancellationToken) -> Result<Completion, String> {
    let inventory = build_inventory(path, cancel).map_err(|e| e.to_string())?;
    println!("{}", display::render_inventory(&inventory));
    Ok(if inventory.has_errors() {
        Completion::WithFailures
    } else {
        Completion::Clean
    })
}

struct RunOptions<'a> {
    verify: bool,
    report: bool,
    retry_failed: bool,
    save_result: Option<&'a Path>,
    verbose: bool,
}

fn run_profile(
    profile: &Profile,
    options: &RunOptions<'_>,
    cancel: &CancellationToken,
) -> Result<Completion, String> {
    let engine = TransferEngine::default();

    eprintln!("Running profile '{}'...", profile.name);
    for mapping in &profile.folder_mappings {
        eprintln!("  {}", mapping.display_text());
    }

    let printer = ProgressPrinter::spawn(options.verbose);
    let result = {
        let forward = printer.sink();
        let sink: &dyn ProgressSink<EnhancedTransferProgress> = &forward;
        let result = engine.transfer(profile, Some(sink), cancel);

        let retryable = result.errors.iter().filter(|e| e.is_retryable()).count();
        if options.retry_failed && result.state != TransferState::Cancelled && retryable > 0 {
            eprintln!("\nRetrying {} failed items...", retryable);
            engine.retry_failed(&result, Some(sink))
        } else {
            result
        }
    };
    printer.finish();

    println!("{}", display::render_result(&result));

    if let Some(path) = options.save_result {
        save_result(&result, path)?;
    }

    let mut completion = if result.state == TransferState::Completed && result.failed_files == 0
    {
        Completion::Clean
    } else {
        Completion::WithFailures
    };

    if result.state != TransferState::Cancelled && (options.verify || options.report) {
        let verified = verify(profile, Some(&result), options.report);
        if verified == Completion::WithFailures {
            completion = Completion::WithFailures;
        }
    }

    Ok(completion)
}

fn retry_saved(
    result_file: &Path,
    save_to: Option<&Path>,
    verbose: bool,
) -> Result<Completion, String> {
    let previous = load_result(result_file)?;
    if previous.errors.is_empty() {
        println!("Nothing to retry: {}", previous.summary());
        return Ok(Completion::Clean);
    }

    let engine = TransferEngine::default();
    let printer = ProgressPrinter::spawn(verbose);
    let result = {
        let forward = printer.sink();
        let sink: &dyn ProgressSink<EnhancedTransferProgress> = &forward;
        engine.retry_failed(&previous, Some(sink))
    };
    printer.finish();

    println!("{}", display::render_result(&result));
    if let Some(path) = save_to {
        save_result(&result, path)?;
    }

    Ok(if result.failed_files == 0 {
        Completion::Clean
    } else {
        Completion::WithFailures
    })
}

/// Quick count check, or the full report when `detailed` is set.
fn verify(
    profile: &Profile,
    transfer: Option<&EnhancedTransferResult>,
    detailed: bool,
) -> Completion {
    let verifier = VerificationEngine::default();

    let passed = if detailed {
        let report = verifier.generate_detailed_report(profile);
        println!("{}", report.detailed_report());
        println!("{}", report.summary());
        report.is_successful()
    } else {
        let fallback = EnhancedTransferResult::default();
        let result = verifier.verify_quick(profile, transfer.unwrap_or(&fallback));
        println!("{}", result.summary_message());
        result.is_successful
    };

    if passed {
        Completion::Clean
    } else {
        Completion::WithFailures
    }
}

fn save_result(result: &EnhancedTransferResult, path: &Path) -> Result<(), String> {
    let json = serde_json::to_string_pretty(result)
        .map_err(|e| format!("Failed to serialize result: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    eprintln!("Result saved to {}", path.display());
    Ok(())
}

fn load_result(path: &Path) -> Result<EnhancedTransferResult, String> {
    let json =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&json).map_err(|e| format!("Invalid result file {}: {}", path.display(), e))
}
