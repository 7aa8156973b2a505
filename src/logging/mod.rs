//! User-visible output
//!
//! [`Logger`] owns every line a person reads: run sections, per-tag outcome lines and the
//! final summary. Diagnostics meant for debugging go through `tracing` instead.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, Instant};

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("📝 {}", message);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("ℹ️  {}", message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("✅ {}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("⚠️  WARNING: {}", message);
        }
    }

    /// Error message
    pub fn error(&self, message: &str) {
        eprintln!("❌ ERROR: {}", message);
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            println!("▶️  {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("   {}", message);
        }
    }

    /// Raw request/response dump, printed whenever dumping is enabled
    pub fn dump(&self, message: &str) {
        println!("{}", message);
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            println!("\n--- {} ---", title);
            for (key, value) in items {
                println!("  {}: {}", key, value);
            }
        }
    }

    /// Final totals, always printed
    pub fn summary(&self, line: &str) {
        println!("{}", line);
    }

    /// A tag was removed from the registry
    pub fn tag_deleted(&self, repository: &str, tag: &str, created_at: &DateTime<Utc>) {
        println!("{}", Self::tag_line("deleted", repository, tag, created_at));
    }

    /// A tag would have been removed
    pub fn tag_dry_run(&self, repository: &str, tag: &str, created_at: &DateTime<Utc>) {
        println!("{}", Self::tag_line("dryrun", repository, tag, created_at));
    }

    /// A tag could not be removed
    pub fn tag_error(&self, repository: &str, tag: &str, created_at: &DateTime<Utc>, reason: &str) {
        eprintln!(
            "{}: {}",
            Self::tag_line("error", repository, tag, created_at),
            reason
        );
    }

    pub fn tag_line(kind: &str, repository: &str, tag: &str, created_at: &DateTime<Utc>) -> String {
        format!(
            "{} {} {}:{}",
            kind,
            created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            repository,
            tag
        )
    }

    /// Time since the logger was created
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        } else {
            format!("{}d{}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
