//! Cleanup pipeline
//!
//! authenticate -> discover (name-filtered) -> resolve timestamps -> sort -> retention policy
//! -> concurrent deletion. Everything up to the policy runs sequentially; deletions fan out
//! with at most `concurrency` requests in flight and are all joined before the report is
//! built.

use crate::cli::config::RetentionConfig;
use crate::error::Result;
use crate::logging::Logger;
use crate::model::{CleanupReport, DeletionOutcome, DeletionStatus, TagCandidate};
use crate::registry::{HubAdapter, RegistryV2Adapter, TagBackend};
use crate::rest::RestClient;
use crate::retention::{RetentionPolicy, TagFilter, sort_newest_first};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

/// What to delete and how, independent of the backend
#[derive(Debug, Clone)]
pub struct CleanupPlan {
    pub filter: TagFilter,
    pub policy: RetentionPolicy,
    pub dry_run: bool,
    pub concurrency: usize,
}

impl From<&RetentionConfig> for CleanupPlan {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            filter: config.filter().clone(),
            policy: config.policy(),
            dry_run: config.dry_run(),
            concurrency: config.concurrency(),
        }
    }
}

/// Pick the backend for the configured registry: the hub API for the default URL,
/// Registry v2 for anything else.
pub fn select_backend(config: &RetentionConfig, output: &Logger) -> Result<Box<dyn TagBackend>> {
    let client = RestClient::builder()
        .with_skip_tls(config.insecure())
        .with_dump(config.dump())
        .with_output(output.clone())
        .build()?;

    let backend: Box<dyn TagBackend> = if config.is_hub() {
        Box::new(HubAdapter::new(
            client,
            config.registry(),
            config.repository(),
            config.credentials().clone(),
            output.clone(),
        ))
    } else {
        Box::new(RegistryV2Adapter::new(
            client,
            config.registry(),
            config.repository(),
            config.credentials().clone(),
            config.concurrency(),
            output.clone(),
        ))
    };
    Ok(backend)
}

/// Run a full cleanup for a validated configuration
pub async fn run(config: &RetentionConfig, output: &Logger) -> Result<CleanupReport> {
    let backend = select_backend(config, output)?;
    Cleanup::new(backend, CleanupPlan::from(config), output.clone())
        .execute(Utc::now())
        .await
}

pub struct Cleanup {
    backend: Box<dyn TagBackend>,
    plan: CleanupPlan,
    output: Logger,
}

impl Cleanup {
    pub fn new(backend: Box<dyn TagBackend>, plan: CleanupPlan, output: Logger) -> Self {
        Self {
            backend,
            plan,
            output,
        }
    }

    /// Drive the pipeline; `now` anchors the age threshold
    pub async fn execute(mut self, now: DateTime<Utc>) -> Result<CleanupReport> {
        let mut report = CleanupReport {
            dry_run: self.plan.dry_run,
            ..Default::default()
        };

        self.output.step(&format!(
            "Authenticating against {} backend",
            self.backend.kind()
        ));
        self.backend.authenticate().await?;
        self.output.success("Authenticated");

        let discovered = self.backend.discover_tags(&self.plan.filter).await?;
        report.discovered = discovered.len();
        self.output.info(&format!(
            "Found {} tag(s) matching {}",
            discovered.len(),
            self.plan.filter.pattern().as_str()
        ));

        let mut candidates = self.backend.resolve_timestamps(discovered).await;
        report.candidates = candidates.len();
        sort_newest_first(&mut candidates);

        let selected = self.plan.policy.select(&candidates, now);
        report.selected = selected.len();
        self.output.info(&format!(
            "{} tag(s) older than {} beyond the {} most recent",
            selected.len(),
            self.plan.policy.threshold(now).to_rfc3339(),
            self.plan.policy.min_keep
        ));

        for outcome in self.delete_all(selected).await {
            report.record(&outcome);
        }
        Ok(report)
    }

    async fn delete_all(&self, selected: Vec<TagCandidate>) -> Vec<DeletionOutcome> {
        let backend = self.backend.as_ref();
        let output = &self.output;
        let dry_run = self.plan.dry_run;

        stream::iter(selected)
            .map(|tag| async move { delete_one(backend, output, dry_run, tag).await })
            .buffer_unordered(self.plan.concurrency.max(1))
            .collect()
            .await
    }
}

async fn delete_one(
    backend: &dyn TagBackend,
    output: &Logger,
    dry_run: bool,
    tag: TagCandidate,
) -> DeletionOutcome {
    let repository = backend.repository();
    let status = if dry_run {
        output.tag_dry_run(repository, &tag.name, &tag.created_at);
        DeletionStatus::DryRun
    } else {
        match backend.delete_tag(&tag).await {
            Ok(()) => {
                output.tag_deleted(repository, &tag.name, &tag.created_at);
                DeletionStatus::Deleted
            }
            Err(e) => {
                output.tag_error(repository, &tag.name, &tag.created_at, &e.to_string());
                DeletionStatus::Failed(e.to_string())
            }
        }
    };

    DeletionOutcome {
        name: tag.name,
        created_at: tag.created_at,
        status,
    }
}
