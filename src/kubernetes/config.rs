//! Kubeconfig discovery
//!
//! Locates the kubeconfig file and reads the context names it defines.
//! Credentials and cluster endpoints are resolved by the kube crate when a
//! context is selected.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubeConfigError {
    #[error("Failed to read kubeconfig: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse kubeconfig: {0}")]
    ParseError(String),
    #[error("No kubeconfig found")]
    NotFound,
}

/// Parsed kubeconfig
#[derive(Debug, Clone)]
pub struct KubeConfig {
    pub path: PathBuf,
    /// Context names in file order
    pub contexts: Vec<String>,
}

impl KubeConfig {
    /// Load kubeconfig from an explicit path, or the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self, KubeConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load_from(&Self::default_path()?),
        }
    }

    /// Get the default kubeconfig path
    pub fn default_path() -> Result<PathBuf, KubeConfigError> {
        // KUBECONFIG may hold a list; the first existing entry wins
        if let Ok(kubeconfig) = std::env::var("KUBECONFIG") {
            let path = PathBuf::from(kubeconfig.split(':').next().unwrap_or(&kubeconfig));
            if path.exists() {
                return Ok(path);
            }
        }

        let home = dirs::home_dir().ok_or(KubeConfigError::NotFound)?;
        let path = home.join(".kube").join("config");
        if path.exists() {
            Ok(path)
        } else {
            Err(KubeConfigError::NotFound)
        }
    }

    /// Load kubeconfig from a specific path
    pub fn load_from(path: &Path) -> Result<Self, KubeConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path.to_path_buf())
    }

    /// Parse kubeconfig YAML content
    pub fn parse(content: &str, path: PathBuf) -> Result<Self, KubeConfigError> {
        let yaml: serde_json::Value = serde_yaml_ng::from_str(content)
            .map_err(|e| KubeConfigError::ParseError(e.to_string()))?;

        let contexts = yaml
            .get("contexts")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|context| context.get("name").and_then(|v| v.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self { path, contexts })
    }

    /// Whether a context called `name` is defined
    pub fn has_context(&self, name: &str) -> bool {
        self.contexts.iter().any(|c| c == name)
    }

    /// Names of every context, sorted
    pub fn context_names(&self) -> Vec<String> {
        let mut names = self.contexts.clone();
        names.sort();
        names
    }

    /// Context names that begin with `prefix`
    pub fn context_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.context_names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect()
    }
}
