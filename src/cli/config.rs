//! Configuration management module
//!
//! [`CleanupOptions`] is whatever the command line and environment supplied.
//! [`CleanupOptions::validate`] turns it into a [`RetentionConfig`], which is never
//! mutated afterwards.

use crate::error::{CleanupError, Result};
use crate::registry::Credentials;
use crate::retention::{RetentionPolicy, TagFilter};
use chrono::TimeDelta;
use regex::Regex;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Public hub API; any other registry URL is treated as a Registry v2 server
pub const DEFAULT_REGISTRY: &str = "https://hub.docker.com/v2";
pub const DEFAULT_TAG_REGEX: &str = "^[0-9A-Fa-f]+$";
pub const DEFAULT_MIN_KEEP: usize = 3;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(360 * 3600);
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Patterns that would put every tag up for deletion
const MATCH_ALL_PATTERNS: [&str; 2] = [".*", "^.*$"];

/// Unvalidated settings
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupOptions {
    pub username: String,
    pub password: String,
    pub repository: String,
    pub registry: String,
    pub regex: String,
    pub min_keep: usize,
    pub max_age: Duration,
    pub concurrency: usize,
    pub insecure: bool,
    pub verbose: bool,
    pub dry_run: bool,
    pub dump: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            repository: String::new(),
            registry: DEFAULT_REGISTRY.to_string(),
            regex: DEFAULT_TAG_REGEX.to_string(),
            min_keep: DEFAULT_MIN_KEEP,
            max_age: DEFAULT_MAX_AGE,
            concurrency: DEFAULT_CONCURRENCY,
            insecure: false,
            verbose: false,
            dry_run: false,
            dump: false,
        }
    }
}

impl CleanupOptions {
    /// Check every rule in order and stop at the first violation
    pub fn validate(&self) -> Result<RetentionConfig> {
        let repository = self.repository.trim();
        if repository.is_empty() {
            return Err(CleanupError::Configuration(
                "repository cannot be empty".to_string(),
            ));
        }

        let registry = Url::parse(self.registry.trim()).map_err(|e| {
            CleanupError::Configuration(format!("invalid registry url {:?}: {}", self.registry, e))
        })?;
        if registry.scheme() != "http" && registry.scheme() != "https" {
            return Err(CleanupError::Configuration(format!(
                "invalid registry url {:?}: must start with http:// or https://",
                self.registry
            )));
        }

        if MATCH_ALL_PATTERNS.contains(&self.regex.trim()) {
            return Err(CleanupError::Configuration(format!(
                "tag regex {:?} matches every tag",
                self.regex
            )));
        }
        let pattern = Regex::new(&self.regex)?;

        if self.min_keep == 0 {
            return Err(CleanupError::Configuration(
                "minimum number of tags to keep must be at least 1".to_string(),
            ));
        }

        if self.max_age.is_zero() {
            return Err(CleanupError::Configuration(
                "maximum age must be greater than 0".to_string(),
            ));
        }
        let max_age = TimeDelta::from_std(self.max_age).map_err(|_| {
            CleanupError::Configuration(format!("maximum age {:?} is out of range", self.max_age))
        })?;

        if self.concurrency == 0 {
            return Err(CleanupError::Configuration(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        let is_hub = is_hub_url(&registry);
        if is_hub && (self.username.is_empty() || self.password.is_empty()) {
            return Err(CleanupError::Configuration(
                "username and password are required for the hub registry".to_string(),
            ));
        }

        Ok(RetentionConfig {
            credentials: Credentials::new(self.username.clone(), self.password.clone()),
            repository: repository.to_string(),
            registry,
            is_hub,
            filter: TagFilter::new(pattern),
            policy: RetentionPolicy::new(self.min_keep, max_age),
            concurrency: self.concurrency,
            insecure: self.insecure,
            dry_run: self.dry_run,
            dump: self.dump,
        })
    }
}

fn is_hub_url(url: &Url) -> bool {
    url.as_str().trim_end_matches('/') == DEFAULT_REGISTRY
}

/// Validated settings for one run
#[derive(Clone)]
pub struct RetentionConfig {
    credentials: Credentials,
    repository: String,
    registry: Url,
    is_hub: bool,
    filter: TagFilter,
    policy: RetentionPolicy,
    concurrency: usize,
    insecure: bool,
    dry_run: bool,
    dump: bool,
}

impl RetentionConfig {
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn registry(&self) -> &Url {
        &self.registry
    }

    /// Whether the registry URL is the public hub default
    pub fn is_hub(&self) -> bool {
        self.is_hub
    }

    pub fn filter(&self) -> &TagFilter {
        &self.filter
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn insecure(&self) -> bool {
        self.insecure
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn dump(&self) -> bool {
        self.dump
    }
}

impl fmt::Debug for RetentionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionConfig")
            .field("credentials", &self.credentials)
            .field("repository", &self.repository)
            .field("registry", &self.registry.as_str())
            .field("regex", &self.filter.pattern().as_str())
            .field("policy", &self.policy)
            .field("concurrency", &self.concurrency)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TagCandidate;

    fn valid() -> CleanupOptions {
        CleanupOptions {
            username: "user".into(),
            password: "secret".into(),
            repository: "acme/app".into(),
            ..Default::default()
        }
    }

    fn config_error(options: CleanupOptions) -> String {
        match options.validate() {
            Err(CleanupError::Configuration(msg)) => msg,
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_defaults_validate() {
        let config = valid().validate().unwrap();
        assert!(config.is_hub());
        assert_eq!(config.policy().min_keep, 3);
        assert_eq!(config.policy().max_age, TimeDelta::days(15));
        assert!(config.filter().matches("deadbeef"));
        assert!(!config.filter().matches("latest"));
    }

    #[test]
    fn test_each_rule_has_its_own_message() {
        let mut messages = Vec::new();

        let mut o = valid();
        o.regex = ".*".into();
        messages.push(config_error(o));

        let mut o = valid();
        o.regex = "^.*$".into();
        messages.push(config_error(o));

        let mut o = valid();
        o.min_keep = 0;
        messages.push(config_error(o));

        let mut o = valid();
        o.max_age = Duration::ZERO;
        messages.push(config_error(o));

        let mut o = valid();
        o.registry = "not a url".into();
        messages.push(config_error(o));

        assert!(messages[0].contains("matches every tag"));
        assert!(messages[1].contains("matches every tag"));
        assert!(messages[1].contains("^.*$"));
        assert!(messages[2].contains("minimum number of tags"));
        assert!(messages[3].contains("maximum age"));
        assert!(messages[4].contains("invalid registry url"));
    }

    #[test]
    fn test_invalid_regex() {
        let mut o = valid();
        o.regex = "([a-z".into();
        assert!(config_error(o).contains("invalid tag regex"));
    }

    #[test]
    fn test_registry_needs_http_scheme() {
        let mut o = valid();
        o.registry = "localhost:5000".into();
        assert!(config_error(o).contains("http://"));
    }

    #[test]
    fn test_empty_repository() {
        let mut o = valid();
        o.repository = "  ".into();
        assert!(config_error(o).contains("repository"));
    }

    #[test]
    fn test_hub_requires_credentials() {
        let mut o = valid();
        o.password.clear();
        assert!(config_error(o).contains("username and password"));

        let mut o = valid();
        o.password.clear();
        o.username.clear();
        o.registry = "http://localhost:5000".into();
        let config = o.validate().unwrap();
        assert!(!config.is_hub());
        assert!(config.credentials().is_empty());
    }

    #[test]
    fn test_hub_detection_ignores_trailing_slash() {
        let mut o = valid();
        o.registry = format!("{}/", DEFAULT_REGISTRY);
        assert!(o.validate().unwrap().is_hub());
    }

    #[test]
    fn test_huge_max_age_keeps_everything() {
        let mut o = valid();
        o.max_age = Duration::from_secs(100_000_000 * 604_800);
        let policy = o.validate().unwrap().policy();

        let now = chrono::Utc::now();
        let tags = vec![
            TagCandidate::new("abc1", now),
            TagCandidate::new("abc2", now - TimeDelta::days(3650)),
        ];
        assert!(policy.select(&tags, now).is_empty());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = valid().validate().unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
