//! Manifest formats understood when resolving a tag's creation time
//!
//! - Docker v2 schema 2: `config.digest` points at an image config blob whose `created`
//!   field is the creation time.
//! - Docker v2 schema 1: a `history` chain of embedded JSON documents; the newest `created`
//!   among them is when the tag was last pushed.

use crate::error::{CleanupError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MANIFEST_V1: &str = "application/vnd.docker.distribution.manifest.v1+prettyjws";
pub const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Accept header for manifest requests, v2 preferred
pub fn manifest_accept() -> String {
    format!("{}, {}", MANIFEST_V2, MANIFEST_V1)
}

/// Manifest format announced by the registry's Content-Type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestKind {
    V2,
    V1,
    Unsupported(String),
}

impl ManifestKind {
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type.split(';').next().unwrap_or_default().trim();
        match essence {
            MANIFEST_V2 => ManifestKind::V2,
            MANIFEST_V1 => ManifestKind::V1,
            other => ManifestKind::Unsupported(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub digest: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestV2 {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: Option<String>,
    pub config: BlobInfo,
    #[serde(default)]
    pub layers: Vec<BlobInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct History {
    #[serde(rename = "v1Compatibility")]
    pub v1_compatibility: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestV1 {
    pub schema_version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub history: Vec<History>,
}

/// The part of an image config (or v1 compatibility entry) needed here
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
}

impl ManifestV1 {
    /// Newest `created` across the history chain.
    ///
    /// Entries are decoded one by one; an undecodable entry is skipped, but at least one
    /// must carry a timestamp.
    pub fn latest_created(&self) -> Result<DateTime<Utc>> {
        let mut latest: Option<DateTime<Utc>> = None;
        for (index, entry) in self.history.iter().enumerate() {
            match serde_json::from_str::<ImageConfig>(&entry.v1_compatibility) {
                Ok(image) => {
                    latest = Some(latest.map_or(image.created, |l| l.max(image.created)));
                }
                Err(e) => {
                    tracing::warn!(tag = %self.tag, index, error = %e, "skipping undecodable v1 history entry");
                }
            }
        }

        latest.ok_or_else(|| {
            CleanupError::Resolution(format!(
                "v1 manifest for {} has no usable history entry",
                self.tag
            ))
        })
    }
}

/// What manifest resolution learned about a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestDescriptor {
    /// Creation time lives in the config blob
    V2 { digest: String, config_digest: String },
    /// Creation time already taken from the history chain
    V1 { digest: String, created: DateTime<Utc> },
}

impl ManifestDescriptor {
    pub fn digest(&self) -> &str {
        match self {
            ManifestDescriptor::V2 { digest, .. } | ManifestDescriptor::V1 { digest, .. } => digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn history(created: &str) -> History {
        History {
            v1_compatibility: format!(
                r#"{{"id":"x","created":"{}","container_config":{{"Cmd":["/bin/sh"]}}}}"#,
                created
            ),
        }
    }

    #[test]
    fn test_media_type_classification() {
        assert_eq!(ManifestKind::from_media_type(MANIFEST_V2), ManifestKind::V2);
        assert_eq!(ManifestKind::from_media_type(MANIFEST_V1), ManifestKind::V1);
        assert_eq!(
            ManifestKind::from_media_type(&format!("{}; charset=utf-8", MANIFEST_V2)),
            ManifestKind::V2
        );
        assert_eq!(
            ManifestKind::from_media_type("application/vnd.oci.image.index.v1+json"),
            ManifestKind::Unsupported("application/vnd.oci.image.index.v1+json".into())
        );
    }

    #[test]
    fn test_v1_uses_most_recent_history_entry() {
        // T1 < T3 < T2
        let manifest = ManifestV1 {
            schema_version: 1,
            name: "acme/app".into(),
            tag: "abc123".into(),
            architecture: "amd64".into(),
            history: vec![
                history("2019-01-01T00:00:00Z"),
                history("2019-03-01T00:00:00.123456789Z"),
                history("2019-02-01T00:00:00Z"),
            ],
        };

        let created = manifest.latest_created().unwrap();
        let expected = Utc
            .with_ymd_and_hms(2019, 3, 1, 0, 0, 0)
            .unwrap()
            .checked_add_signed(chrono::TimeDelta::nanoseconds(123456789))
            .unwrap();
        assert_eq!(created, expected);
    }

    #[test]
    fn test_v1_skips_bad_entries() {
        let manifest = ManifestV1 {
            schema_version: 1,
            name: String::new(),
            tag: "t".into(),
            architecture: String::new(),
            history: vec![
                History {
                    v1_compatibility: "not json".into(),
                },
                history("2020-05-05T05:05:05Z"),
            ],
        };
        assert_eq!(
            manifest.latest_created().unwrap(),
            Utc.with_ymd_and_hms(2020, 5, 5, 5, 5, 5).unwrap()
        );
    }

    #[test]
    fn test_v1_without_history_fails() {
        let manifest: ManifestV1 =
            serde_json::from_str(r#"{"schemaVersion":1,"tag":"t","history":[]}"#).unwrap();
        assert!(matches!(
            manifest.latest_created(),
            Err(CleanupError::Resolution(_))
        ));
    }

    #[test]
    fn test_v2_manifest_decodes_config_digest() {
        let manifest: ManifestV2 = serde_json::from_str(
            r#"{
                "schemaVersion": 2,
                "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                "config": {"mediaType": "application/vnd.docker.container.image.v1+json", "size": 1470, "digest": "sha256:cfg"},
                "layers": [{"mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip", "size": 977, "digest": "sha256:l1"}]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.config.digest, "sha256:cfg");
        assert_eq!(manifest.layers.len(), 1);
    }
}
