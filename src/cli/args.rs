//! Command-line argument parsing

use crate::cli::config::{
    CleanupOptions, DEFAULT_CONCURRENCY, DEFAULT_MIN_KEEP, DEFAULT_REGISTRY, DEFAULT_TAG_REGEX,
};
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-cleanup")]
#[command(about = "Clean a registry repository from lingering tags/images")]
#[command(version)]
pub struct Args {
    /// Registry username
    #[arg(long = "username", short = 'u', env = "PLUGIN_USERNAME")]
    pub username: Option<String>,

    /// Registry password
    #[arg(long = "password", short = 'p', env = "PLUGIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Repository to clean, e.g. acme/app
    #[arg(long = "repo", short = 'r', env = "PLUGIN_REPO")]
    pub repo: Option<String>,

    /// Registry to target; the hub API unless another registry URL is given
    #[arg(long = "registry", env = "PLUGIN_REGISTRY", default_value = DEFAULT_REGISTRY)]
    pub registry: String,

    /// Skip TLS certificate verification
    #[arg(long = "insecure", short = 'i', env = "PLUGIN_INSECURE")]
    pub insecure: bool,

    /// Only tags matching this regex are considered
    #[arg(long = "regex", env = "PLUGIN_REGEX", default_value = DEFAULT_TAG_REGEX)]
    pub regex: String,

    /// Minimum number of tags/images to keep
    #[arg(long = "min", short = 'm', env = "PLUGIN_MIN", default_value_t = DEFAULT_MIN_KEEP)]
    pub min: usize,

    /// Maximum age of tags/images, e.g. 360h, 15d, 1h30m
    #[arg(long = "max", short = 'M', env = "PLUGIN_MAX", default_value = "360h", value_parser = parse_duration)]
    pub max: Duration,

    /// Number of concurrent registry requests
    #[arg(long = "concurrency", short = 'j', env = "PLUGIN_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Show verbose information
    #[arg(long = "verbose", env = "PLUGIN_VERBOSE")]
    pub verbose: bool,

    /// Report what would be deleted without deleting anything
    #[arg(long = "dryrun", env = "PLUGIN_DRYRUN")]
    pub dry_run: bool,

    /// Dump network requests
    #[arg(long = "dump", env = "PLUGIN_DUMP")]
    pub dump: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Fill unset values from the secondary CI environment variables
    pub fn with_env_fallbacks(self) -> Self {
        self.with_fallbacks_from(|name| std::env::var(name).ok())
    }

    fn with_fallbacks_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.is_empty())
        };

        if self.username.is_none() {
            self.username = first(&["DOCKER_USERNAME", "DRONE_REPO_OWNER"]);
        }
        if self.password.is_none() {
            self.password = first(&["DOCKER_PASSWORD"]);
        }
        if self.repo.is_none() {
            self.repo = first(&["DRONE_REPO"]);
        }
        self
    }

    pub fn to_options(&self) -> CleanupOptions {
        CleanupOptions {
            username: self.username.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            repository: self.repo.clone().unwrap_or_default(),
            registry: self.registry.clone(),
            regex: self.regex.clone(),
            min_keep: self.min,
            max_age: self.max,
            concurrency: self.concurrency,
            insecure: self.insecure,
            verbose: self.verbose,
            dry_run: self.dry_run,
            dump: self.dump,
        }
    }
}

/// Parse compound durations such as `360h`, `15d`, `1h30m` or `500ms`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {:?}", input))?;
        if number_len == 0 {
            return Err(format!("invalid duration {:?}", input));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration {:?}", input))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "d" => 86400.0,
            "w" => 604800.0,
            unit => return Err(format!("unknown unit {:?} in duration {:?}", unit, input)),
        };
        rest = &rest[unit_len..];

        let part = Duration::try_from_secs_f64(value * seconds_per_unit)
            .map_err(|e| format!("duration {:?} out of range: {}", input, e))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| format!("duration {:?} out of range", input))?;
    }

    Ok(total)
}
