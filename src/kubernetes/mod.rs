//! Kubernetes integration module
//!
//! Provides kubeconfig discovery, context selection, the cluster client
//! abstraction and interactive pod attach.

pub mod attach;
pub mod client;
pub mod config;
pub mod context;

pub use client::{
    AttachOptions, ClusterClient, ClusterEvent, ClusterEventStream, KubeClient, KubeClientError,
    PodEvent, PodEventStream, Workload,
};
pub use config::{KubeConfig, KubeConfigError};
pub use context::{ContextConnector, ContextHandle, ContextRegistry};
