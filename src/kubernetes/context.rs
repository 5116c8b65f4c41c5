//! Context selection
//!
//! Selecting a context yields a [`ContextHandle`] that carries its own
//! client, so concurrent work against several clusters never shares an
//! "active context".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use parking_lot::Mutex;

use super::client::{ClusterClient, KubeClient, KubeClientError};
use super::config::KubeConfig;

/// A selected context and the client bound to it
#[derive(Clone)]
pub struct ContextHandle {
    name: String,
    client: Arc<dyn ClusterClient>,
}

impl ContextHandle {
    pub fn new(name: impl Into<String>, client: Arc<dyn ClusterClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    /// Name of the selected context
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Client scoped to this context
    pub fn client(&self) -> &Arc<dyn ClusterClient> {
        &self.client
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle").field("name", &self.name).finish()
    }
}

/// Source of context handles
#[async_trait]
pub trait ContextConnector: Send + Sync {
    /// Every context name known to this connector, sorted
    fn context_names(&self) -> Vec<String>;

    /// Connect to a context by name
    async fn select(&self, name: &str) -> Result<ContextHandle, KubeClientError>;
}

/// Contexts defined in a kubeconfig file
pub struct ContextRegistry {
    config: KubeConfig,
    /// Clients already built for a context; avoids repeating the TLS setup
    clients: Mutex<HashMap<String, Client>>,
}

impl ContextRegistry {
    pub fn new(config: KubeConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Context names that begin with `prefix`
    pub fn context_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.config.context_names_with_prefix(prefix)
    }

    fn ensure_known(&self, name: &str) -> Result<(), KubeClientError> {
        if self.config.has_context(name) {
            return Ok(());
        }
        Err(KubeClientError::ContextNotFound {
            name: name.to_string(),
            available: self.config.context_names().join(", "),
        })
    }

    async fn build_client(&self, name: &str) -> Result<Client, KubeClientError> {
        if let Some(client) = self.clients.lock().get(name) {
            tracing::debug!("K8s client cache HIT for {}", name);
            return Ok(client.clone());
        }

        tracing::debug!("K8s client cache MISS for {} - creating new client", name);
        let start = std::time::Instant::now();

        let kubeconfig = Kubeconfig::read_from(&self.config.path)?;
        let options = KubeConfigOptions {
            context: Some(name.to_string()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        let client = Client::try_from(config)?;

        self.clients.lock().insert(name.to_string(), client.clone());
        tracing::debug!("K8s client for {} created in {:?}", name, start.elapsed());
        Ok(client)
    }
}

#[async_trait]
impl ContextConnector for ContextRegistry {
    fn context_names(&self) -> Vec<String> {
        self.config.context_names()
    }

    async fn select(&self, name: &str) -> Result<ContextHandle, KubeClientError> {
        self.ensure_known(name)?;
        let client = self.build_client(name).await?;
        Ok(ContextHandle::new(
            name,
            Arc::new(KubeClient::from_client(client, name)),
        ))
    }
}
