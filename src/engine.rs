//! Resolution driver
//!
//! Walks the services of a project in declaration order and resolves each
//! one completely (volumes, then published ports, then image) before the
//! next begins. The selection cache is threaded through every step, so
//! decisions are asked in a stable order and persisted as they are made.
//!
//! A non-interactive run is checked up front: every decision it cannot
//! make from flags, cache or defaults fails before any image is touched.

use crate::answers::AppAnswers;
use crate::cache::SelectionCache;
use crate::compose::{CommandLine, ComposeProject};
use crate::config::{ConfigManager, GlobalConfig};
use crate::error::{DtlError, DtlResult};
use crate::orchestration::{Cancellation, ImageExecutor};
use crate::resolve::image::{
    missing_registry, ImagePipeline, ImageProgress, ImageReference, PipelineOptions,
};
use crate::resolve::prompt::Prompter;
use crate::resolve::route::{undecided_port, RouteModel, RouteSpec, RouteTable};
use crate::resolve::volume::{ContentPlan, PathProbe, ResolvedVolume, VolumeClassifier};
use tracing::{debug, info};

/// A service with every decision applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub name: String,
    pub image: ImageReference,
    pub volumes: Vec<ResolvedVolume>,
    pub environment: Vec<String>,
    pub command: Option<CommandLine>,
    pub entrypoint: Option<CommandLine>,
    pub depends_on: Vec<String>,
}

/// Where routes come from
#[derive(Debug, Clone)]
pub enum RouteSource {
    /// Typed list given up front
    Manual(Vec<RouteSpec>),
    /// One decision per published port
    Derived,
}

/// Output of a full resolution run
#[derive(Debug, Clone)]
pub struct Resolution {
    pub services: Vec<ResolvedService>,
    pub routes: RouteTable,
    pub content: ContentPlan,
}

/// Injected capabilities of the engine
pub struct Capabilities<'a> {
    pub prompter: &'a dyn Prompter,
    pub probe: &'a dyn PathProbe,
    pub executor: &'a dyn ImageExecutor,
    pub progress: &'a dyn ImageProgress,
    pub config: &'a ConfigManager,
}

/// Image options that come from the command line
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub registry_override: Option<String>,
    pub push_override: Option<bool>,
    pub refresh_images: bool,
    /// Checked before each service and each stage
    pub cancellation: Cancellation,
}

/// Resolve every service of `project`
pub async fn resolve_project(
    project: &ComposeProject,
    app: &AppAnswers,
    route_source: RouteSource,
    caps: &Capabilities<'_>,
    global: GlobalConfig,
    options: EngineOptions,
    mut cache: SelectionCache,
) -> DtlResult<(Resolution, SelectionCache)> {
    let classifier = VolumeClassifier::new(&project.dir, caps.probe, caps.prompter);
    let route_model = RouteModel::new(caps.prompter);
    let mut images = ImagePipeline::new(
        caps.executor,
        caps.prompter,
        caps.progress,
        caps.config,
        global,
        PipelineOptions {
            package: app.package.clone(),
            compose_dir: project.dir.clone(),
            registry_override: options.registry_override,
            push_override: options.push_override,
            refresh: options.refresh_images,
        },
    );
    let cancellation = options.cancellation;

    let mut routes = RouteTable::new();
    let derive_routes = match route_source {
        RouteSource::Manual(manual) => {
            routes.extend(&manual, &app.package);
            false
        }
        RouteSource::Derived => true,
    };

    if !caps.prompter.is_interactive() {
        preflight(project, derive_routes, &images, &cache)?;
    }

    let mut services = Vec::with_capacity(project.services.len());
    let mut content = ContentPlan::new();

    for service in project.services.values() {
        cancellation.check(&format!("resolving {}", service.name))?;
        debug!("Resolving service {}", service.name);

        let mut volumes = Vec::with_capacity(service.volumes.len());
        for spec in &service.volumes {
            let (volume, next) = classifier.classify(&service.name, spec, cache).await?;
            cache = next;
            if let Some(entry) = volume.content() {
                content.add(entry)?;
            }
            volumes.push(volume);
        }

        if derive_routes {
            cancellation.check(&format!("routing {}", service.name))?;
            let (derived, next) = route_model.derive(service, cache).await?;
            cache = next;
            routes.extend(&derived, &app.package);
        }

        cancellation.check(&format!("resolving the image of {}", service.name))?;
        let (image, next) = images.resolve(service, cache).await?;
        cache = next;
        info!("{}: {} ({})", service.name, image.resolved, image.mode);

        services.push(ResolvedService {
            name: service.name.clone(),
            image,
            volumes,
            environment: service.environment.clone(),
            command: service.command.clone(),
            entrypoint: service.entrypoint.clone(),
            depends_on: service.depends_on.clone(),
        });
    }

    Ok((
        Resolution {
            services,
            routes,
            content,
        },
        cache,
    ))
}

/// Fail before resolution when a non-interactive run is missing a
/// route or a registry it will need
fn preflight(
    project: &ComposeProject,
    derive_routes: bool,
    images: &ImagePipeline<'_>,
    cache: &SelectionCache,
) -> DtlResult<()> {
    if derive_routes {
        for service in project.services.values() {
            if let Some(port) = undecided_port(service, cache)? {
                return Err(DtlError::Configuration(format!(
                    "--routes (port {} of service {} needs a route)",
                    port, service.name
                )));
            }
        }
    }

    let needs_registry = project
        .services
        .values()
        .any(|service| images.needs_registry(service, cache));
    if needs_registry && images.known_registry(cache).is_none() {
        return Err(missing_registry());
    }
    Ok(())
}
