//! Terminal output for the CLI.
//!
//! Live progress is drawn on stderr by a printer thread that receives
//! snapshots over a channel, so the engine never blocks on the terminal.

use crossbeam_channel::{unbounded, Sender};
use engine::{
    format_bytes, format_duration, EnhancedTransferProgress, EnhancedTransferResult,
    FileInventoryResult, StorageValidationResult,
};
use std::io::Write;
use std::thread::{self, JoinHandle};

/// Progress printer running on its own thread.
pub struct ProgressPrinter {
    sender: Sender<EnhancedTransferProgress>,
    handle: JoinHandle<()>,
}

impl ProgressPrinter {
    pub fn spawn(verbose: bool) -> Self {
        let (sender, receiver) = unbounded::<EnhancedTransferProgress>();

        let handle = thread::spawn(move || {
            let mut last_file = String::new();
            let mut drew = false;
            for progress in receiver {
                if verbose && progress.current_file != last_file {
                    if drew {
                        eprintln!();
                    }
                    eprintln!("  {}", progress.current_file);
                    last_file = progress.current_file.clone();
                }
                eprint!("\r{}", render_progress(&progress));
                let _ = std::io::stderr().flush();
                drew = true;
            }
            if drew {
                eprintln!();
            }
        });

        ProgressPrinter { sender, handle }
    }

    /// A sink closure feeding this printer. Usable as `&dyn ProgressSink`.
    pub fn sink(&self) -> impl Fn(EnhancedTransferProgress) + Send + Sync {
        let sender = self.sender.clone();
        move |progress| {
            let _ = sender.send(progress);
        }
    }

    /// Close the channel and wait for the printer to drain it.
    ///
    /// Every sink returned by `sink` must be dropped first.
    pub fn finish(self) {
        drop(self.sender);
        let _ = self.handle.join();
    }
}

pub fn progress_bar(percent: u32) -> String {
    let filled = (percent.min(100) / 5) as usize;
    let empty = 20 - filled;
    format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(empty), percent.min(100))
}

pub fn render_progress(progress: &EnhancedTransferProgress) -> String {
    let mut line = format!(
        "Progress: {} | {} | {}",
        progress_bar(progress.percent_complete() as u32),
        progress.formatted_progress(),
        progress.formatted_bytes()
    );
    if progress.failed_files > 0 {
        line.push_str(&format!(" | {} failed", progress.failed_files));
    }
    line
}

pub fn render_inventory(inventory: &FileInventoryResult) -> String {
    let mut out = inventory.summary();
    if inventory.has_errors() {
        out.push_str(&format!(
            "\n{} paths could not be read:",
            inventory.inaccessible_paths.len()
        ));
        for diagnostic in &inventory.inaccessible_paths {
            out.push_str(&format!("\n  {}", diagnostic));
        }
    }
    out
}

pub fn render_storage(storage: &StorageValidationResult) -> String {
    let mut out = storage.message.clone();
    if storage.required_bytes > 0 && storage.available_bytes > 0 {
        out.push_str(&format!(
            "\nUsage: {:.1}% of available space",
            storage.usage_percentage()
        ));
    }
    out
}

pub fn render_result(result: &EnhancedTransferResult) -> String {
    let mut out = format!("Transfer {}: {}\n", result.state, result.summary());
    if let Some(storage) = &result.storage_info {
        if !storage.has_sufficient_space {
            out.push_str("Warning: ");
            out.push_str(&storage.message);
            out.push('\n');
        }
    }
    out.push_str(&result.detailed_summary());
    out.push_str(&format!("\nElapsed: {}", format_duration(result.duration)));
    if result.transferred_bytes > 0 {
        out.push_str(&format!(" ({} copied)", format_bytes(result.transferred_bytes)));
    }
    out
}
