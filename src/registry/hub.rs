//! Public hub API backend
//!
//! Logs in with username/password for a bearer token, pages through the tag listing
//! (which already carries `last_updated`) and deletes tags by name.

use crate::error::handlers::HttpErrorHandler;
use crate::error::{CleanupError, Result};
use crate::logging::Logger;
use crate::model::{DiscoveredTag, TagCandidate};
use crate::registry::auth::bearer_authorization;
use crate::registry::{Credentials, TagBackend};
use crate::rest::RestClient;
use crate::retention::TagFilter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: String,
}

/// One page of the tag listing
#[derive(Debug, Deserialize)]
pub struct TagPage {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<HubTag>,
}

#[derive(Debug, Deserialize)]
pub struct HubTag {
    pub name: String,
    #[serde(default)]
    pub full_size: Option<u64>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct HubAdapter {
    client: RestClient,
    base: String,
    repository: String,
    credentials: Credentials,
    output: Logger,
}

impl HubAdapter {
    pub fn new(
        client: RestClient,
        base: &Url,
        repository: impl Into<String>,
        credentials: Credentials,
        output: Logger,
    ) -> Self {
        Self {
            client,
            base: base.as_str().trim_end_matches('/').to_string(),
            repository: repository.into(),
            credentials,
            output,
        }
    }

    fn login_url(&self) -> String {
        format!("{}/users/login/", self.base)
    }

    fn tags_url(&self, page: usize) -> String {
        format!(
            "{}/repositories/{}/tags/?page_size={}&page={}",
            self.base, self.repository, PAGE_SIZE, page
        )
    }

    fn tag_url(&self, name: &str) -> String {
        format!("{}/repositories/{}/tags/{}/", self.base, self.repository, name)
    }
}

#[async_trait]
impl TagBackend for HubAdapter {
    fn kind(&self) -> &'static str {
        "hub"
    }

    fn repository(&self) -> &str {
        &self.repository
    }

    async fn authenticate(&mut self) -> Result<()> {
        self.output
            .verbose(&format!("Logging in to {} as {}", self.base, self.credentials.username));

        let request = LoginRequest {
            username: &self.credentials.username,
            password: &self.credentials.password,
        };
        let response: LoginResponse = self
            .client
            .post(&self.login_url(), &request)
            .await
            .map_err(|e| HttpErrorHandler::auth_error(&e, "hub login"))?;

        if response.token.is_empty() {
            return Err(CleanupError::Authentication(
                "hub login returned no token".to_string(),
            ));
        }

        self.client
            .set_header("Authorization", bearer_authorization(&response.token));
        tracing::debug!(user = %self.credentials.username, "hub login succeeded");
        Ok(())
    }

    async fn discover_tags(&self, filter: &TagFilter) -> Result<Vec<DiscoveredTag>> {
        let mut tags = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(self.tags_url(1));

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(CleanupError::Discovery(format!(
                    "tag listing loops back to {}",
                    url
                )));
            }

            self.output.detail(&format!("Fetching tag page {}", url));
            let page: TagPage = self
                .client
                .get(&url)
                .await
                .map_err(|e| HttpErrorHandler::discovery_error(&e, "tag listing"))?;
            tracing::debug!(count = page.count, returned = page.results.len(), "hub tag page");

            tags.extend(
                page.results
                    .into_iter()
                    .filter(|tag| filter.matches(&tag.name))
                    .map(|tag| DiscoveredTag {
                        name: tag.name,
                        last_updated: tag.last_updated,
                    }),
            );
            next = page.next.filter(|n| !n.is_empty());
        }

        Ok(tags)
    }

    async fn resolve_timestamps(&self, tags: Vec<DiscoveredTag>) -> Vec<TagCandidate> {
        tags.into_iter()
            .filter_map(|tag| match tag.last_updated {
                Some(updated) => Some(TagCandidate::new(tag.name, updated)),
                None => {
                    self.output.warning(&format!(
                        "{}:{} has no last_updated timestamp, skipping",
                        self.repository, tag.name
                    ));
                    None
                }
            })
            .collect()
    }

    async fn delete_tag(&self, tag: &TagCandidate) -> Result<()> {
        self.client
            .delete(&self.tag_url(&tag.name))
            .await
            .map_err(|e| HttpErrorHandler::deletion_error(&e, "tag deletion"))
    }
}
