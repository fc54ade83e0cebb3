//! Controller configuration, read once from the environment at startup.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TEMPLATES: &str = "./templates";
const DEFAULT_FIELD_MANAGER: &str = "exposure-controller";
const DEFAULT_REQUEUE_SECONDS: u64 = 5;
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Runtime configuration of the exposure controller.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace to watch; all namespaces when unset
    pub namespace: Option<String>,
    /// Base directory of the config templates
    pub templates: PathBuf,
    /// Field manager for server-side apply
    pub field_manager: String,
    /// Delay before re-running a pass that is still converging
    pub requeue_after: Duration,
    /// Listen address of the health and metrics server
    pub metrics_addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());
        let templates = lookup("OPERATOR_TEMPLATES")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_TEMPLATES.to_string());
        let field_manager = lookup("FIELD_MANAGER")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_FIELD_MANAGER.to_string());

        let requeue_seconds = match lookup("REQUEUE_SECONDS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                ControllerError::InvalidConfig(format!("REQUEUE_SECONDS '{}' is not a number: {}", raw, e))
            })?,
            None => DEFAULT_REQUEUE_SECONDS,
        };
        if requeue_seconds == 0 {
            return Err(ControllerError::InvalidConfig(
                "REQUEUE_SECONDS must be greater than zero".to_string(),
            ));
        }

        let metrics_raw = lookup("METRICS_ADDR").unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        let metrics_addr = metrics_raw.parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!("METRICS_ADDR '{}' is not a socket address: {}", metrics_raw, e))
        })?;

        Ok(Self {
            namespace,
            templates: PathBuf::from(templates),
            field_manager,
            requeue_after: Duration::from_secs(requeue_seconds),
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ControllerError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.namespace, None);
        assert_eq!(config.templates, PathBuf::from("./templates"));
        assert_eq!(config.field_manager, "exposure-controller");
        assert_eq!(config.requeue_after, Duration::from_secs(5));
        assert_eq!(config.metrics_addr.port(), 8080);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("WATCH_NAMESPACE", "openstack"),
            ("OPERATOR_TEMPLATES", "/usr/share/templates"),
            ("FIELD_MANAGER", "keystone-operator"),
            ("REQUEUE_SECONDS", "10"),
            ("METRICS_ADDR", "127.0.0.1:9090"),
        ])
        .unwrap();
        assert_eq!(config.namespace.as_deref(), Some("openstack"));
        assert_eq!(config.templates, PathBuf::from("/usr/share/templates"));
        assert_eq!(config.field_manager, "keystone-operator");
        assert_eq!(config.requeue_after, Duration::from_secs(10));
        assert_eq!(config.metrics_addr.to_string(), "127.0.0.1:9090");
    }

    #[test]
    fn test_empty_namespace_watches_all() {
        let config = config_from(&[("WATCH_NAMESPACE", "")]).unwrap();
        assert_eq!(config.namespace, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("REQUEUE_SECONDS", "soon")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("REQUEUE_SECONDS", "0")]),
            Err(ControllerError::InvalidConfig(_))
        ));
        assert!(matches!(
            config_from(&[("METRICS_ADDR", "localhost")]),
            Err(ControllerError::InvalidConfig(_))
        ));
    }
}
