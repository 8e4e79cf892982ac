//! cs core types: canonical cluster ids, operator identity, naming and errors.

#![forbid(unsafe_code)]

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Serde `deserialize_with` helper: an explicit `null` reads as the type's default.
pub fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Canonical cluster identifier: the URL host with every `.` replaced by `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    /// Derive the identifier from a cluster URL. The port is not part of the host.
    pub fn from_url(raw: &str) -> Result<Self, SwitchError> {
        let parsed = url::Url::parse(raw).map_err(|e| SwitchError::InvalidClusterUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        match parsed.host_str() {
            Some(host) if !host.is_empty() => Ok(Self(host.replace('.', "-"))),
            _ => Err(SwitchError::InvalidClusterUrl { url: raw.to_string(), reason: "missing host".into() }),
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Local account name of whoever runs the switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operator(String);

const OPERATOR_ENV_VARS: [&str; 3] = ["USER", "LOGNAME", "USERNAME"];

impl Operator {
    pub fn new(name: impl Into<String>) -> Result<Self, SwitchError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(SwitchError::OperatorIdentityUnavailable);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// First non-empty of `USER`, `LOGNAME`, `USERNAME`.
    pub fn from_env() -> Result<Self, SwitchError> {
        OPERATOR_ENV_VARS
            .iter()
            .filter_map(|k| std::env::var(k).ok())
            .find_map(|v| Self::new(v).ok())
            .ok_or(SwitchError::OperatorIdentityUnavailable)
    }

    /// Explicit override wins; otherwise fall back to the environment.
    pub fn resolve(explicit: Option<&str>) -> Result<Self, SwitchError> {
        match explicit {
            Some(name) => Self::new(name),
            None => Self::from_env(),
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// `<operator>/<cluster-id>`
pub fn user_name(operator: &Operator, cluster: &ClusterId) -> String {
    format!("{}/{}", operator, cluster)
}

/// `<namespace>/<cluster-id>/<operator>`
pub fn context_name(namespace: &str, cluster: &ClusterId, operator: &Operator) -> String {
    format!("{}/{}/{}", namespace, cluster, operator)
}

/// Failure reading one of the two backing files.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found")]
    NotFound,
    #[error("read failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("parse failed: {0}")]
    Parse(#[source] BoxError),
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound { LoadError::NotFound } else { LoadError::Io(e) }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    #[error("environment registry {}: {source}", path.display())]
    RegistryLoad { path: PathBuf, source: LoadError },
    #[error("kubeconfig {}: {source}", path.display())]
    AccessConfigLoad { path: PathBuf, source: LoadError },
    #[error("could not find cluster: {0}")]
    UnknownCluster(String),
    #[error("invalid cluster url {url:?}: {reason}")]
    InvalidClusterUrl { url: String, reason: String },
    #[error("operator identity unavailable (set USER or pass --user)")]
    OperatorIdentityUnavailable,
    #[error("locking {}: {source}", path.display())]
    Lock { path: PathBuf, source: std::io::Error },
    #[error("writing {}: {source}", path.display())]
    Write { path: PathBuf, source: BoxError },
}

impl SwitchError {
    /// Process exit status for this error kind. 1 is left to usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            SwitchError::RegistryLoad { .. } => 10,
            SwitchError::AccessConfigLoad { .. } => 11,
            SwitchError::UnknownCluster(_) => 12,
            SwitchError::InvalidClusterUrl { .. } => 13,
            SwitchError::OperatorIdentityUnavailable => 14,
            SwitchError::Lock { .. } => 15,
            SwitchError::Write { .. } => 16,
        }
    }

    /// Stable short name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SwitchError::RegistryLoad { .. } => "registry_load",
            SwitchError::AccessConfigLoad { .. } => "access_config_load",
            SwitchError::UnknownCluster(_) => "unknown_cluster",
            SwitchError::InvalidClusterUrl { .. } => "invalid_cluster_url",
            SwitchError::OperatorIdentityUnavailable => "operator_identity_unavailable",
            SwitchError::Lock { .. } => "lock",
            SwitchError::Write { .. } => "write",
        }
    }
}

pub type SwitchResult<T> = Result<T, SwitchError>;
