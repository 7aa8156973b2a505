//! Command-line runner: validate, clean, summarize

use crate::cleanup;
use crate::cli::args::Args;
use crate::cli::config::{CleanupOptions, RetentionConfig};
use crate::error::Result;
use crate::logging::Logger;
use crate::model::CleanupReport;

pub struct Runner {
    options: CleanupOptions,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let options = args.to_options();
        let output = Logger::new(options.verbose);
        Self { options, output }
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    pub async fn run(&self) -> Result<CleanupReport> {
        self.output.section("Registry Cleanup");

        let config = self.options.validate()?;
        self.describe(&config);

        let report = cleanup::run(&config, &self.output).await?;

        self.output.summary_kv(
            "Summary",
            &[
                ("Discovered", report.discovered.to_string()),
                ("Resolved", report.candidates.to_string()),
                ("Selected", report.selected.to_string()),
            ],
        );
        self.output.summary(&report.summary_line());
        self.output.verbose(&format!(
            "Finished in {}",
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(report)
    }

    fn describe(&self, config: &RetentionConfig) {
        let policy = config.policy();
        self.output.info(&format!(
            "Cleaning {} on {} ({})",
            config.repository(),
            config.registry(),
            if config.is_hub() { "hub" } else { "registry v2" }
        ));
        self.output.verbose(&format!(
            "Keeping the {} most recent tags matching {}, deleting older than {}",
            policy.min_keep,
            config.filter().pattern().as_str(),
            self.output.format_duration(policy.max_age.to_std().unwrap_or_default())
        ));
        if config.dry_run() {
            self.output.warning("Dry run: nothing will be deleted");
        }
    }
}
