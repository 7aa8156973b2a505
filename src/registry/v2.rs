//! Registry HTTP API v2 backend
//!
//! Flow: probe `/v2/`, answer its bearer challenge (or fall back to Basic credentials),
//! list tags, resolve each tag's manifest to a digest and creation time, delete by digest.

use crate::error::handlers::HttpErrorHandler;
use crate::error::{CleanupError, Result};
use crate::logging::Logger;
use crate::model::{DiscoveredTag, TagCandidate};
use crate::registry::auth::{
    AuthChallenge, TokenResponse, basic_authorization, bearer_authorization,
};
use crate::registry::manifest::{
    DIGEST_HEADER, ImageConfig, MANIFEST_V1, MANIFEST_V2, ManifestDescriptor, ManifestKind,
    ManifestV1, ManifestV2, manifest_accept,
};
use crate::registry::{Credentials, TagBackend};
use crate::rest::{HeaderSet, RestClient};
use crate::retention::TagFilter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

static NEXT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).expect("link header regex is valid")
});

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    name: String,
    /// `null` for a repository without tags
    #[serde(default)]
    tags: Option<Vec<String>>,
}

pub struct RegistryV2Adapter {
    client: RestClient,
    base: Url,
    repository: String,
    credentials: Credentials,
    concurrency: usize,
    output: Logger,
}

impl RegistryV2Adapter {
    pub fn new(
        client: RestClient,
        base: &Url,
        repository: impl Into<String>,
        credentials: Credentials,
        concurrency: usize,
        output: Logger,
    ) -> Self {
        Self {
            client,
            base: base.clone(),
            repository: repository.into(),
            credentials,
            concurrency: concurrency.max(1),
            output,
        }
    }

    fn address(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    fn probe_url(&self) -> String {
        format!("{}/v2/", self.address())
    }

    fn tags_url(&self) -> String {
        format!("{}/v2/{}/tags/list", self.address(), self.repository)
    }

    fn manifest_url(&self, reference: &str) -> String {
        format!("{}/v2/{}/manifests/{}", self.address(), self.repository, reference)
    }

    fn blob_url(&self, digest: &str) -> String {
        format!("{}/v2/{}/blobs/{}", self.address(), self.repository, digest)
    }

    /// Capability probe; hands back the challenge headers of the answer
    async fn probe(&self) -> Result<Vec<String>> {
        let url = self.probe_url();
        let response = self
            .client
            .execute(Method::HEAD, &url, None, &[])
            .await
            .map_err(|e| CleanupError::ProtocolUnsupported(format!("HEAD {}: {}", url, e)))?;

        let status = response.status;
        let accepted = status.is_success()
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN;
        if !accepted {
            return Err(CleanupError::ProtocolUnsupported(format!(
                "HEAD {} returned {}",
                url, status
            )));
        }

        self.output
            .detail(&format!("Registry v2 probe answered {}", status));
        Ok(response.headers.get_all("www-authenticate").to_vec())
    }

    async fn fetch_token(&self, challenge: &AuthChallenge) -> Result<String> {
        let url = challenge.token_url(&self.repository)?;
        self.output
            .detail(&format!("Requesting token from {} for {}", challenge.realm, challenge.service));

        let basic = basic_authorization(&self.credentials.username, &self.credentials.password);
        let mut extra: Vec<(&str, &str)> = Vec::new();
        if !self.credentials.is_empty() {
            extra.push(("Authorization", basic.as_str()));
        }

        let response: TokenResponse = self
            .client
            .get_with(url.as_str(), &extra)
            .await
            .map_err(|e| HttpErrorHandler::auth_error(&e, "token request"))?;

        response.into_token().ok_or_else(|| {
            CleanupError::Authentication(format!("token endpoint {} returned no token", challenge.realm))
        })
    }

    /// Next page from a `Link: <...>; rel="next"` header, resolved against the registry
    fn next_page(&self, headers: &HeaderSet) -> Option<String> {
        let link = headers.get("link")?;
        let target = NEXT_LINK.captures(link)?.get(1)?.as_str();
        self.base.join(target).ok().map(String::from)
    }

    /// Digest and schema of a tag's manifest
    async fn describe_manifest(&self, tag: &str) -> Result<ManifestDescriptor> {
        let url = self.manifest_url(tag);
        let accept = manifest_accept();
        let headers: HeaderSet = self
            .client
            .head(&url, &[("Accept", accept.as_str())])
            .await
            .map_err(|e| HttpErrorHandler::resolution_error(&e, "manifest lookup"))?;

        let digest = headers
            .get(DIGEST_HEADER)
            .map(str::to_string)
            .ok_or_else(|| {
                CleanupError::Resolution(format!("no {} header for tag {}", DIGEST_HEADER, tag))
            })?;
        let media_type = headers.get("content-type").unwrap_or_default();

        match ManifestKind::from_media_type(media_type) {
            ManifestKind::V2 => {
                let manifest: ManifestV2 = self
                    .client
                    .get_with(&url, &[("Accept", MANIFEST_V2)])
                    .await
                    .map_err(|e| HttpErrorHandler::resolution_error(&e, "manifest download"))?;
                Ok(ManifestDescriptor::V2 {
                    digest,
                    config_digest: manifest.config.digest,
                })
            }
            ManifestKind::V1 => {
                let manifest: ManifestV1 = self
                    .client
                    .get_with(&url, &[("Accept", MANIFEST_V1)])
                    .await
                    .map_err(|e| HttpErrorHandler::resolution_error(&e, "manifest download"))?;
                Ok(ManifestDescriptor::V1 {
                    digest,
                    created: manifest.latest_created()?,
                })
            }
            ManifestKind::Unsupported(other) => Err(CleanupError::Resolution(format!(
                "unsupported manifest media type {:?} for tag {}",
                other, tag
            ))),
        }
    }

    async fn created_at(&self, descriptor: &ManifestDescriptor) -> Result<DateTime<Utc>> {
        match descriptor {
            ManifestDescriptor::V1 { created, .. } => Ok(*created),
            ManifestDescriptor::V2 { config_digest, .. } => {
                let config: ImageConfig = self
                    .client
                    .get(&self.blob_url(config_digest))
                    .await
                    .map_err(|e| HttpErrorHandler::resolution_error(&e, "config blob download"))?;
                Ok(config.created)
            }
        }
    }

    async fn resolve_tag(&self, name: String) -> Result<TagCandidate> {
        let descriptor = self.describe_manifest(&name).await?;
        let created = self.created_at(&descriptor).await?;
        Ok(TagCandidate::new(name, created).with_digest(descriptor.digest()))
    }
}

#[async_trait]
impl TagBackend for RegistryV2Adapter {
    fn kind(&self) -> &'static str {
        "registry-v2"
    }

    fn repository(&self) -> &str {
        &self.repository
    }

    async fn authenticate(&mut self) -> Result<()> {
        let challenges = self.probe().await?;

        match AuthChallenge::from_headers(&challenges)? {
            Some(challenge) => {
                let token = self.fetch_token(&challenge).await?;
                self.client
                    .set_header("Authorization", bearer_authorization(&token));
                tracing::debug!(realm = %challenge.realm, service = %challenge.service, "bearer token acquired");
            }
            None if !self.credentials.is_empty() => {
                // Kept for compatibility: without a challenge every call carries Basic credentials.
                self.output
                    .warning("Registry sent no auth challenge, using basic credentials for all requests");
                self.client.set_header(
                    "Authorization",
                    basic_authorization(&self.credentials.username, &self.credentials.password),
                );
            }
            None => {
                self.output
                    .verbose("Registry sent no auth challenge, continuing anonymously");
            }
        }
        Ok(())
    }

    async fn discover_tags(&self, filter: &TagFilter) -> Result<Vec<DiscoveredTag>> {
        let mut tags = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(self.tags_url());

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(CleanupError::Discovery(format!(
                    "tag listing loops back to {}",
                    url
                )));
            }

            self.output.detail(&format!("Fetching tag list {}", url));
            let response = self
                .client
                .execute(Method::GET, &url, None, &[])
                .await
                .map_err(|e| HttpErrorHandler::discovery_error(&e, "tag listing"))?;
            let list: TagList = serde_json::from_slice(&response.body).map_err(|e| {
                CleanupError::Discovery(format!("cannot decode tag list from {}: {}", url, e))
            })?;
            tracing::debug!(repository = %list.name, "registry tag page");

            tags.extend(
                list.tags
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|name| filter.matches(name))
                    .map(DiscoveredTag::named),
            );
            next = self.next_page(&response.headers);
        }

        Ok(tags)
    }

    async fn resolve_timestamps(&self, tags: Vec<DiscoveredTag>) -> Vec<TagCandidate> {
        let results: Vec<(String, Result<TagCandidate>)> = stream::iter(tags)
            .map(|tag| async move {
                let name = tag.name.clone();
                (name, self.resolve_tag(tag.name).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    self.output.warning(&format!(
                        "skipping {}:{}: {}",
                        self.repository, name, e
                    ));
                    tracing::debug!(tag = %name, error = %e, "tag dropped from consideration");
                    None
                }
            })
            .collect()
    }

    async fn delete_tag(&self, tag: &TagCandidate) -> Result<()> {
        let digest = tag.digest.as_deref().ok_or_else(|| {
            CleanupError::Deletion(format!("tag {} has no manifest digest", tag.name))
        })?;
        self.client
            .delete(&self.manifest_url(digest))
            .await
            .map_err(|e| HttpErrorHandler::deletion_error(&e, "manifest deletion"))
    }
}
