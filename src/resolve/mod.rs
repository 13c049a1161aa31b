//! Resolution of compose services into platform terms
//!
//! Each resolver takes the [`SelectionCache`](crate::cache::SelectionCache)
//! by value and hands back the updated cache with its result, so every
//! decision taken during a run is visible to the next call and already on
//! disk when the call returns.

pub mod env;
pub mod image;
pub mod prompt;
pub mod route;
pub mod volume;

pub use env::{resolve, EnvSources};
pub use image::{ImageMode, ImagePipeline, ImageReference, PipelineOptions};
pub use prompt::{
    EmptyDirLocation, IngressProtocol, PortDecision, PortRoute, Prompter, RegistryAnswer,
    VolumeAction, VolumeDecision,
};
pub use route::{HttpRoute, HttpScheme, IngressRule, PortMapping, RouteModel, RouteSpec, RouteTable};
pub use volume::{
    ContentEntry, ContentPlan, FsProbe, PathProbe, ResolvedVolume, VolumeClassifier, VolumeKind,
};
