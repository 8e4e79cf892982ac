//! cs switch: resolve a registry shortname to a kubeconfig context and make it current.
//!
//! Frontends (the CLI today) build a [`SwitchConfig`] and call [`Switcher::switch`].
//! One pass, no retries: registry, kubeconfig, cluster, identifier, user,
//! context, activate, save. Read-only outcomes never take the lock or touch
//! the directory; the kubeconfig is reloaded under the lock before it is
//! rewritten.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Instant;

use cs_core::user_name;
use cs_persist::FileLock;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use cs_core::{ClusterId, Operator, SwitchError, SwitchResult};
pub use cs_kubeconfig::Kubeconfig;
pub use cs_registry::{ClusterEntry, Registry};

/// Paths and identity the switch operates on. No process-global defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub kubeconfig: PathBuf,
    pub registry: PathBuf,
    /// Operator identity override; `None` reads it from the environment.
    pub operator: Option<String>,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            kubeconfig: cs_persist::default_kubeconfig_path(),
            registry: cs_persist::default_registry_path(),
            operator: None,
        }
    }
}

impl SwitchConfig {
    pub fn new(kubeconfig: impl Into<PathBuf>, registry: impl Into<PathBuf>) -> Self {
        Self { kubeconfig: kubeconfig.into(), registry: registry.into(), operator: None }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }
}

/// Terminal success states of a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SwitchOutcome {
    /// No user entry for this cluster yet; the operator has to log in first.
    LoginRequired { cluster: ClusterId, user: String, login_url: Option<String> },
    /// `context` is now the current context.
    Activated { context: String, cluster: ClusterId, namespace: String, created: bool },
}

impl SwitchOutcome {
    fn label(&self) -> &'static str {
        match self {
            SwitchOutcome::LoginRequired { .. } => "login_required",
            SwitchOutcome::Activated { created: true, .. } => "created",
            SwitchOutcome::Activated { created: false, .. } => "selected",
        }
    }
}

/// Registry entry as shown by `--list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterListing {
    pub shortname: String,
    pub url: String,
    /// `None` when the url does not yield an identifier.
    pub cluster_id: Option<ClusterId>,
    pub login_url: Option<String>,
    pub reachable: bool,
}

pub struct Switcher {
    cfg: SwitchConfig,
}

impl Switcher {
    pub fn new(cfg: SwitchConfig) -> Self { Self { cfg } }

    pub fn load_registry(&self) -> SwitchResult<Registry> {
        Registry::load(&self.cfg.registry)
            .map_err(|source| SwitchError::RegistryLoad { path: self.cfg.registry.clone(), source })
    }

    /// Registry clusters sorted by shortname.
    pub fn clusters(&self) -> SwitchResult<Vec<ClusterListing>> {
        let reg = self.load_registry()?;
        Ok(reg
            .clusters
            .iter()
            .map(|(short, entry)| ClusterListing {
                shortname: short.clone(),
                url: entry.url.clone(),
                cluster_id: entry.cluster_id().ok(),
                login_url: non_empty(&entry.login_url),
                reachable: entry.reachable,
            })
            .collect())
    }

    /// Make `<namespace>/<cluster-id>/<operator>` the current context for `shortname`.
    pub fn switch(&self, shortname: &str, namespace: &str) -> SwitchResult<SwitchOutcome> {
        let started = Instant::now();
        let res = self.reconcile(shortname, namespace);
        let label = match &res {
            Ok(o) => o.label(),
            Err(e) => e.kind(),
        };
        counter!("cs_switch_total", 1u64, "outcome" => label);
        histogram!("cs_switch_ms", started.elapsed().as_secs_f64() * 1000.0);
        res
    }

    fn reconcile(&self, shortname: &str, namespace: &str) -> SwitchResult<SwitchOutcome> {
        let registry = self.load_registry()?;
        let kc = self.load_kubeconfig()?;

        let entry = registry.lookup(shortname)?;
        let cluster = entry.cluster_id()?;
        debug!(shortname, url = %entry.url, cluster = %cluster, "cluster resolved");

        let operator = Operator::resolve(self.cfg.operator.as_deref())?;
        if !kc.user_exists(&cluster, &operator) {
            return Ok(login_required(entry, cluster, &operator));
        }

        // a write is certain from here; reload so edits made since the first read are kept
        let kc_path = &self.cfg.kubeconfig;
        let _lock = FileLock::acquire(kc_path)
            .map_err(|source| SwitchError::Lock { path: kc_path.clone(), source })?;
        let mut kc = self.load_kubeconfig()?;
        if !kc.user_exists(&cluster, &operator) {
            return Ok(login_required(entry, cluster, &operator));
        }

        let (context, created) = match kc.context_name(&cluster, namespace, &operator) {
            Some(existing) => (existing, false),
            None => {
                let name = kc.create_context(namespace, &cluster, &operator);
                info!(context = %name, "Created context");
                (name, true)
            }
        };
        kc.set_current_context(context.clone());
        info!(context = %context, "Current context is set");

        kc.save(kc_path).map_err(|source| SwitchError::Write { path: kc_path.clone(), source })?;
        info!(path = %kc_path.display(), "Kubeconfig saved");

        Ok(SwitchOutcome::Activated { context, cluster, namespace: namespace.to_string(), created })
    }

    fn load_kubeconfig(&self) -> SwitchResult<Kubeconfig> {
        Kubeconfig::load(&self.cfg.kubeconfig)
            .map_err(|source| SwitchError::AccessConfigLoad { path: self.cfg.kubeconfig.clone(), source })
    }
}

fn login_required(entry: &ClusterEntry, cluster: ClusterId, operator: &Operator) -> SwitchOutcome {
    let login_url = non_empty(&entry.login_url);
    info!(
        cluster = %cluster,
        login_url = login_url.as_deref().unwrap_or(entry.url.as_str()),
        "Never seen this cluster before. Please login"
    );
    SwitchOutcome::LoginRequired { user: user_name(operator, &cluster), cluster, login_url }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        let id = ClusterId::from_url("https://a.b").unwrap();
        let created = SwitchOutcome::Activated { context: "x".into(), cluster: id.clone(), namespace: "n".into(), created: true };
        assert_eq!(created.label(), "created");
        let login = SwitchOutcome::LoginRequired { cluster: id, user: "u/a-b".into(), login_url: None };
        assert_eq!(login.label(), "login_required");
    }

    #[test]
    fn config_builder_sets_operator() {
        let cfg = SwitchConfig::new("/k", "/r").with_operator("alice");
        assert_eq!(cfg.operator.as_deref(), Some("alice"));
        assert_eq!(cfg.kubeconfig, PathBuf::from("/k"));
        assert!(SwitchConfig::default().operator.is_none());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let id = ClusterId::from_url("https://api.x.io:6443").unwrap();
        let o = SwitchOutcome::Activated { context: "ns/api-x-io/a".into(), cluster: id, namespace: "ns".into(), created: false };
        let v = serde_yaml::to_string(&o).unwrap();
        assert!(v.contains("status: activated"));
        assert!(v.contains("cluster: api-x-io"));
    }
}
