//! Convert command - turn a compose project into an .lpk package

use crate::answers;
use crate::cache::{SelectionCache, CACHE_FILE_NAME};
use crate::cli::args::ConvertArgs;
use crate::compose::ComposeProject;
use crate::config::ConfigManager;
use crate::engine::{resolve_project, Capabilities, EngineOptions, Resolution, RouteSource};
use crate::error::{DtlError, DtlResult};
use crate::manifest::Manifest;
use crate::orchestration::{Cancellation, DockerExecutor, ImageExecutor};
use crate::package::{write_package, PackageRequest};
use crate::resolve::image::ImageMode;
use crate::resolve::prompt::Prompter;
use crate::resolve::route::parse_manual;
use crate::resolve::volume::FsProbe;
use crate::ui::{self, InteractivePrompter, NonInteractivePrompter, PipelineProgress, TaskSpinner, UiContext};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const COMPOSE_EXTENSIONS: &[&str] = &["yml", "yaml"];
const ICON_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Execute the convert command
pub async fn execute(args: ConvertArgs, manager: &ConfigManager) -> DtlResult<()> {
    let ctx = UiContext::detect().with_non_interactive(args.non_interactive);
    if ctx.is_interactive() {
        ui::init_theme();
    }
    ui::intro(&ctx, "lzc-dtl");

    let prompter: Box<dyn Prompter> = if ctx.is_interactive() {
        Box::new(InteractivePrompter::new())
    } else {
        Box::new(NonInteractivePrompter::new(args.push))
    };

    let cwd = std::env::current_dir().map_err(|e| DtlError::io("getting current directory", e))?;
    let compose_path = match args.compose {
        Some(ref path) => path.clone(),
        None => choose_compose_file(&cwd, prompter.as_ref()).await?,
    };
    if !compose_path.is_file() {
        return Err(DtlError::PathNotFound(compose_path));
    }

    let process_env: HashMap<String, String> = std::env::vars().collect();
    let project = ComposeProject::load(&compose_path, &process_env).await?;
    ui::step_ok_detail(
        &ctx,
        &format!("Loaded {} service(s)", project.services.len()),
        &compose_path.display().to_string(),
    );

    let cache = SelectionCache::open(project.dir.join(CACHE_FILE_NAME));
    let (app, cache) = answers::gather(&args.answer_flags(), cache, prompter.as_ref()).await?;

    let icon = match args.icon {
        Some(ref icon) => icon.clone(),
        None => choose_icon(&project.dir, prompter.as_ref()).await?,
    };
    if !icon.is_file() {
        return Err(DtlError::PathNotFound(icon));
    }

    let route_source = match args.routes {
        Some(ref json) => RouteSource::Manual(parse_manual(json, &project.service_names())?),
        None => RouteSource::Derived,
    };

    let global = manager.load_or_default().await;
    let cancellation = Cancellation::new();
    cancellation.cancel_on_ctrl_c();
    let executor = DockerExecutor::new(
        global.container_cli.clone(),
        global.platform.clone(),
        global.timeouts,
        cancellation.subscribe(),
    );
    debug!("Using {} for image operations", executor.executor_name());

    let progress = PipelineProgress::new(&ctx);
    let caps = Capabilities {
        prompter: prompter.as_ref(),
        probe: &FsProbe,
        executor: &executor,
        progress: &progress,
        config: manager,
    };
    let options = EngineOptions {
        registry_override: args.registry.clone(),
        push_override: args.push.then_some(true),
        refresh_images: args.refresh_images,
        cancellation: cancellation.clone(),
    };

    let result = resolve_project(&project, &app, route_source, &caps, global, options, cache).await;
    progress.finish();
    let (resolution, _) = result?;

    cancellation.check("packaging")?;
    let manifest = Manifest::assemble(&app, &resolution.services, &resolution.routes);
    let output_dir = args.output.clone().unwrap_or_else(|| project.dir.clone());

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Writing package...");
    let package = match write_package(PackageRequest {
        manifest,
        icon,
        content: resolution.content.clone(),
        output_dir,
    })
    .await
    {
        Ok(package) => {
            spinner.stop("Package written");
            package
        }
        Err(e) => {
            spinner.stop_error("Packaging failed");
            return Err(e);
        }
    };
    info!("Package sha256 {}", package.sha256);

    ui::note(&ctx, "Services", &service_summary(&resolution));
    ui::key_value(&ctx, "Package", &package.path.display().to_string());
    ui::key_value(&ctx, "SHA-256", &package.sha256);
    ui::outro_success(&ctx, &format!("{} {} is ready", app.name, app.version));

    Ok(())
}

/// One line per service: name, image, and how it was obtained
fn service_summary(resolution: &Resolution) -> String {
    resolution
        .services
        .iter()
        .map(|service| {
            let how = match service.image.mode {
                ImageMode::Reused => "reused".to_string(),
                mode if service.image.pushed => format!("{}, pushed", mode),
                mode => format!("{}, cached", mode),
            };
            format!("{}: {} ({})", service.name, service.image.resolved, how)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Files in `dir` with one of `extensions`, sorted by name
fn files_with_extensions(dir: &Path, extensions: &[&str]) -> DtlResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| DtlError::io(format!("listing {}", dir.display()), e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Pick among `candidates`, without asking when there is only one
async fn choose(
    field: &str,
    prompt: &str,
    candidates: Vec<PathBuf>,
    prompter: &dyn Prompter,
) -> DtlResult<PathBuf> {
    match candidates.len() {
        0 => Err(DtlError::Configuration(format!("--{}", field))),
        1 => Ok(candidates.into_iter().next().unwrap_or_default()),
        _ => {
            let choices: Vec<String> = candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            let picked = prompter.select_file(field, prompt, &choices).await?;
            Ok(PathBuf::from(picked))
        }
    }
}

async fn choose_compose_file(dir: &Path, prompter: &dyn Prompter) -> DtlResult<PathBuf> {
    let candidates = files_with_extensions(dir, COMPOSE_EXTENSIONS)?;
    debug!("Compose candidates: {:?}", candidates);
    choose("compose", "Compose file", candidates, prompter).await
}

async fn choose_icon(dir: &Path, prompter: &dyn Prompter) -> DtlResult<PathBuf> {
    let candidates = files_with_extensions(dir, ICON_EXTENSIONS)?;
    debug!("Icon candidates: {:?}", candidates);
    choose("icon", "Application icon", candidates, prompter).await
}
