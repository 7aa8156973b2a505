//! Registry backends
//!
//! Both the public hub API and generic Registry v2 servers are driven through
//! [`TagBackend`], so the cleanup pipeline never needs to know which protocol it talks.

pub mod auth;
pub mod hub;
pub mod manifest;
pub mod v2;

use crate::error::Result;
use crate::model::{DiscoveredTag, TagCandidate};
use crate::retention::TagFilter;
use async_trait::async_trait;
use std::fmt;

pub use auth::AuthChallenge;
pub use hub::HubAdapter;
pub use manifest::{ManifestDescriptor, ManifestKind};
pub use v2::RegistryV2Adapter;

/// Operations a cleanup run needs from a registry
#[async_trait]
pub trait TagBackend: Send + Sync {
    /// Short protocol name for log output
    fn kind(&self) -> &'static str;

    fn repository(&self) -> &str;

    /// Establish the session; every later call reuses its credentials
    async fn authenticate(&mut self) -> Result<()>;

    /// Complete, name-filtered tag listing. A failed page fails the whole listing.
    async fn discover_tags(&self, filter: &TagFilter) -> Result<Vec<DiscoveredTag>>;

    /// Creation time for every tag that can be resolved, in discovery order.
    /// Tags that cannot be resolved are logged and left out.
    async fn resolve_timestamps(&self, tags: Vec<DiscoveredTag>) -> Vec<TagCandidate>;

    async fn delete_tag(&self, tag: &TagCandidate) -> Result<()>;
}

/// Registry login
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"---HIDDEN---")
            .finish()
    }
}
