//! cs registry: read-only view of the AO environment registry (`~/.ao.json`).
//!
//! The registry maps cluster shortnames to connection metadata. Only `url` is
//! consumed by the switch; the other fields are carried for listing and hints.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;

use cs_core::{nullable, ClusterId, LoadError, SwitchError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One cluster as known to the registry. Credentials (`token`) are not read.
/// `null` reads as the field's default, as it does for the `ao` tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterEntry {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub url: String,
    #[serde(deserialize_with = "nullable")]
    pub login_url: String,
    #[serde(deserialize_with = "nullable")]
    pub reachable: bool,
    #[serde(deserialize_with = "nullable")]
    pub boober_url: String,
    #[serde(deserialize_with = "nullable")]
    pub gobo_url: String,
}

impl ClusterEntry {
    pub fn cluster_id(&self) -> Result<ClusterId, SwitchError> {
        ClusterId::from_url(&self.url)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registry {
    #[serde(deserialize_with = "nullable")]
    pub ref_name: String,
    #[serde(deserialize_with = "nullable")]
    pub api_cluster: String,
    #[serde(deserialize_with = "nullable")]
    pub affiliation: String,
    #[serde(deserialize_with = "nullable")]
    pub localhost: bool,
    #[serde(deserialize_with = "nullable")]
    pub clusters: BTreeMap<String, ClusterEntry>,
    #[serde(deserialize_with = "nullable")]
    pub available_clusters: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub preferred_api_clusters: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub available_update_clusters: Vec<String>,
    #[serde(rename = "aoVersion", deserialize_with = "nullable")]
    pub ao_version: String,
}

impl Registry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let reg = Self::from_json(&bytes)?;
        debug!(path = %path.display(), clusters = reg.clusters.len(), "registry loaded");
        Ok(reg)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, LoadError> {
        serde_json::from_slice(bytes).map_err(|e| LoadError::Parse(Box::new(e)))
    }

    /// Exact-match lookup by shortname.
    pub fn lookup(&self, shortname: &str) -> Result<&ClusterEntry, SwitchError> {
        self.clusters
            .get(shortname)
            .ok_or_else(|| SwitchError::UnknownCluster(shortname.to_string()))
    }

    /// Known shortnames, sorted.
    pub fn shortnames(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(|k| k.as_str())
    }
}
