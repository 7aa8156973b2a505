//! Helpers shared by the integration tests

#![allow(dead_code)]

use axum::Router;
use chrono::{DateTime, TimeDelta, Utc};
use registry_cleanup::cli::CleanupOptions;
use registry_cleanup::rest::RestClient;
use registry_cleanup::{CleanupPlan, Logger, RetentionConfig};
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpListener;

/// Bind a local listener; the router is built once the base URL is known
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

pub fn serve(listener: TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - TimeDelta::days(days)
}

pub fn client() -> RestClient {
    RestClient::builder().build().unwrap()
}

pub fn options(registry: &str, min_keep: usize, dry_run: bool) -> CleanupOptions {
    CleanupOptions {
        username: "user".into(),
        password: "pass".into(),
        repository: "acme/app".into(),
        registry: registry.into(),
        min_keep,
        max_age: Duration::from_secs(15 * 86400),
        dry_run,
        ..Default::default()
    }
}

pub fn config(registry: &str, min_keep: usize, dry_run: bool) -> RetentionConfig {
    options(registry, min_keep, dry_run).validate().unwrap()
}

pub fn plan(registry: &str, min_keep: usize, dry_run: bool) -> CleanupPlan {
    CleanupPlan::from(&config(registry, min_keep, dry_run))
}

pub fn quiet() -> Logger {
    Logger::new_quiet()
}

/// Calls recorded by a fake server
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn sorted(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}
