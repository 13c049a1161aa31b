//! Container image executor abstraction
//!
//! The image pipeline only needs four operations from a container CLI.
//! Keeping them behind a trait lets the pipeline run against a recording
//! fake in tests and against docker, podman or nerdctl in production.

use crate::error::DtlResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// Everything needed to build one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Tag given to the built image
    pub tag: String,
    /// Build context directory
    pub context: PathBuf,
    /// Dockerfile, when not `<context>/Dockerfile`
    pub dockerfile: Option<PathBuf>,
}

/// Runs image operations against a container engine
#[async_trait]
pub trait ImageExecutor: Send + Sync {
    /// Pull an image from its registry, passing each output line to `on_output`
    async fn pull(&self, image: &str, on_output: &(dyn Fn(String) + Send + Sync)) -> DtlResult<()>;

    /// Give an existing local image another name
    async fn tag(&self, source: &str, target: &str) -> DtlResult<()>;

    /// Push a local image to its registry
    async fn push(&self, image: &str, on_output: &(dyn Fn(String) + Send + Sync)) -> DtlResult<()>;

    /// Build an image from source
    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DtlResult<()>;

    /// Human-readable name for display
    fn executor_name(&self) -> &str;
}
