//! Decision source for the resolvers
//!
//! The resolvers never talk to a terminal. Whenever the cache holds no
//! prior answer they ask a [`Prompter`], which returns typed decisions.
//! The interactive and non-interactive implementations live in
//! [`crate::ui::prompter`].

use crate::compose::VolumeSpec;
use crate::error::DtlResult;
use crate::resolve::route::PortMapping;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do with a volume that is not a named volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeAction {
    /// Ship the host files inside the package
    UseContent,
    /// Start from an empty directory on the target
    EmptyDir,
    /// Drop the mount
    Ignore,
}

impl VolumeAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::UseContent => "Package the existing files",
            Self::EmptyDir => "Start with an empty directory",
            Self::Ignore => "Ignore this mount",
        }
    }
}

/// Where an empty directory lives on the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyDirLocation {
    /// Private to the application, `/lzcapp/var/<name>`
    AppData,
    /// Shared with the user's documents, `/lzcapp/run/mnt/home/<subdir>`
    UserData { subdir: String },
}

/// A complete volume decision as stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum VolumeDecision {
    UseContent,
    AppData,
    UserData { subdir: String },
    Ignore,
}

impl VolumeDecision {
    /// The first-level action this decision answers
    pub fn action(&self) -> VolumeAction {
        match self {
            Self::UseContent => VolumeAction::UseContent,
            Self::AppData | Self::UserData { .. } => VolumeAction::EmptyDir,
            Self::Ignore => VolumeAction::Ignore,
        }
    }

    pub fn empty_dir(location: EmptyDirLocation) -> Self {
        match location {
            EmptyDirLocation::AppData => Self::AppData,
            EmptyDirLocation::UserData { subdir } => Self::UserData { subdir },
        }
    }
}

/// Transport of a raw port exposure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngressProtocol {
    Tcp,
    Udp,
}

impl fmt::Display for IngressProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// How an accepted port is exposed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PortRoute {
    Http { path: String },
    Https { path: String },
    Ingress { protocol: IngressProtocol },
}

/// Cached answer for one published port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum PortDecision {
    Rejected,
    Routed { route: PortRoute },
}

/// Registry given at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAnswer {
    pub url: String,
    /// Save to the global configuration for later projects
    pub persist: bool,
}

/// Supplies decisions the cache cannot answer.
///
/// Every method is called at most once per decision per run; the caller
/// records the answer before moving on.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Whether answers come from a person. Non-interactive runs fail fast
    /// on anything that has no flag or cached answer.
    fn is_interactive(&self) -> bool;

    /// Choose what to do with a volume, among `options`
    async fn volume_action(
        &self,
        service: &str,
        volume: &VolumeSpec,
        options: &[VolumeAction],
    ) -> DtlResult<VolumeAction>;

    /// Second step of an empty-dir decision
    async fn empty_dir_location(&self, service: &str, target: &str)
        -> DtlResult<EmptyDirLocation>;

    /// Whether a published port should be exposed at all
    async fn accept_port(&self, service: &str, port: &PortMapping) -> DtlResult<bool>;

    /// How an accepted port is exposed
    async fn port_route(&self, service: &str, port: &PortMapping) -> DtlResult<PortRoute>;

    /// Whether an existing image should be copied to the registry
    async fn push_image(&self, service: &str, image: &str) -> DtlResult<bool>;

    /// Registry to push to, when neither the cache nor the configuration has one
    async fn registry(&self) -> DtlResult<RegistryAnswer>;

    /// Free-text application answer. `default` is offered to the user and
    /// is the answer a non-interactive run falls back to.
    async fn text(&self, field: &str, prompt: &str, default: Option<&str>) -> DtlResult<String>;

    /// Yes/no application answer
    async fn confirm(&self, field: &str, prompt: &str, default: bool) -> DtlResult<bool>;

    /// Pick one of `choices` (compose file, icon)
    async fn select_file(&self, field: &str, prompt: &str, choices: &[String])
        -> DtlResult<String>;
}
