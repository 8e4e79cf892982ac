//! cs kubeconfig: the access-config document the switch mutates.
//!
//! Only the fields the switch reads or writes are typed. Everything else
//! (credentials, extensions, certificate data, unknown keys) rides along in
//! `extra` maps so a load/save cycle does not lose it.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;

use cs_core::{context_name, nullable, user_name, BoxError, ClusterId, LoadError, Operator};
use serde::{Deserialize, Serialize};
use serde_yaml::Value as Yaml;
use tracing::debug;

type Extra = BTreeMap<String, Yaml>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    // kubectl writes `users: null`; absent and empty sequences are not written back
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<NamedContext>,
    #[serde(rename = "current-context", default, deserialize_with = "nullable")]
    pub current_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Yaml>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<NamedUser>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    #[serde(default)]
    pub cluster: ClusterRecord,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    #[serde(default)]
    pub context: ContextRecord,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    #[serde(default)]
    pub cluster: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub user: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A user entry. Credential material under `user` is opaque and never touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Yaml>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Kubeconfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let kc = Self::from_yaml(&bytes)?;
        debug!(
            path = %path.display(),
            clusters = kc.clusters.len(),
            contexts = kc.contexts.len(),
            users = kc.users.len(),
            "kubeconfig loaded"
        );
        Ok(kc)
    }

    /// Empty input yields an empty document, like a freshly touched file.
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }
        serde_yaml::from_slice(bytes).map_err(|e| LoadError::Parse(Box::new(e)))
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Serialize the whole document and replace the file at `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BoxError> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;
        cs_persist::write_atomic(path, yaml.as_bytes())?;
        debug!(path = %path.display(), "kubeconfig saved");
        Ok(())
    }

    /// True iff a user `<operator>/<cluster>` exists.
    pub fn user_exists(&self, cluster: &ClusterId, operator: &Operator) -> bool {
        let wanted = user_name(operator, cluster);
        self.users.iter().any(|u| u.name == wanted)
    }

    pub fn has_context(&self, cluster: &ClusterId, namespace: &str, operator: &Operator) -> bool {
        self.context_name(cluster, namespace, operator).is_some()
    }

    /// Composite name of the matching context, if one exists.
    pub fn context_name(&self, cluster: &ClusterId, namespace: &str, operator: &Operator) -> Option<String> {
        let wanted = context_name(namespace, cluster, operator);
        self.contexts.iter().find(|c| c.name == wanted).map(|c| c.name.clone())
    }

    /// Append a context for `(namespace, cluster, operator)` and return its name.
    /// Callers check `has_context` first; duplicates are not rejected here.
    pub fn create_context(&mut self, namespace: &str, cluster: &ClusterId, operator: &Operator) -> String {
        let name = context_name(namespace, cluster, operator);
        self.contexts.push(NamedContext {
            name: name.clone(),
            context: ContextRecord {
                cluster: cluster.to_string(),
                namespace: Some(namespace.to_string()),
                user: user_name(operator, cluster),
                extra: Extra::new(),
            },
            extra: Extra::new(),
        });
        name
    }

    /// Unconditionally point `current-context` at `name`.
    pub fn set_current_context(&mut self, name: impl Into<String>) -> &mut Self {
        self.current_context = name.into();
        self
    }
}
