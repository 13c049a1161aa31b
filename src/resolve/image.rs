//! Image resolution
//!
//! Each service ends up with exactly one image reference:
//!
//! - **reused**: the compose image name, untouched, when it is not pushed
//! - **retagged**: pulled, tagged `registry/<app>:<md5(image)>` and pushed
//! - **built**: built from source, tagged
//!   `registry/<app>:<md5(service + context + dockerfile)>` and pushed
//!
//! Destination tags are remembered in the selection cache. A cached tag
//! is reused on later runs, without touching the container engine, as
//! long as it still names the current registry and application. A
//! different registry or package, or `--refresh-images`, means a fresh
//! pull or build.

use crate::cache::{CacheKey, SelectionCache};
use crate::compose::{BuildSpec, ComposeService};
use crate::config::{ConfigManager, GlobalConfig};
use crate::error::{DtlError, DtlResult};
use crate::orchestration::{BuildRequest, ImageExecutor};
use crate::resolve::prompt::Prompter;
use md5::{Digest, Md5};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a service's image was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    Reused,
    Retagged,
    Built,
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reused => write!(f, "reused"),
            Self::Retagged => write!(f, "retagged"),
            Self::Built => write!(f, "built"),
        }
    }
}

/// Final image of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Image named in the compose file, if any
    pub original: Option<String>,
    /// Image the manifest refers to
    pub resolved: String,
    pub mode: ImageMode,
    /// Whether this run pushed the image (false on a cache hit)
    pub pushed: bool,
}

/// Receives progress of long-running image operations
pub trait ImageProgress: Send + Sync {
    /// An operation (`"Pulling"`, `"Building"`, ...) starts for a service
    fn begin(&self, service: &str, action: &str);
    /// One line of command output
    fn line(&self, line: String);
    /// The current operation is over
    fn end(&self);
}

/// Progress sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ImageProgress for LogProgress {
    fn begin(&self, service: &str, action: &str) {
        info!("{} image for {}", action, service);
    }

    fn line(&self, line: String) {
        debug!("{}", line);
    }

    fn end(&self) {}
}

/// Per-run settings of the image pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Application package, e.g. `com.acme.app`
    pub package: String,
    /// Directory build contexts are relative to
    pub compose_dir: PathBuf,
    /// Registry given on the command line
    pub registry_override: Option<String>,
    /// Push decision given on the command line, ahead of the cache
    pub push_override: Option<bool>,
    /// Ignore cached destination tags
    pub refresh: bool,
}

/// Last dot-separated segment of a package name
pub fn package_base_name(package: &str) -> &str {
    package.rsplit('.').next().unwrap_or(package)
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Resolves service images, one service at a time
pub struct ImagePipeline<'a> {
    executor: &'a dyn ImageExecutor,
    prompter: &'a dyn Prompter,
    progress: &'a dyn ImageProgress,
    config: &'a ConfigManager,
    global: GlobalConfig,
    options: PipelineOptions,
    registry: Option<String>,
}

impl<'a> ImagePipeline<'a> {
    pub fn new(
        executor: &'a dyn ImageExecutor,
        prompter: &'a dyn Prompter,
        progress: &'a dyn ImageProgress,
        config: &'a ConfigManager,
        global: GlobalConfig,
        options: PipelineOptions,
    ) -> Self {
        Self {
            executor,
            prompter,
            progress,
            config,
            global,
            options,
            registry: None,
        }
    }

    /// Resolve the image of one service
    pub async fn resolve(
        &mut self,
        service: &ComposeService,
        cache: SelectionCache,
    ) -> DtlResult<(ImageReference, SelectionCache)> {
        if let Some(ref build) = service.build {
            return self.build(service, build, cache).await;
        }

        let image = service.image.as_deref().ok_or_else(|| {
            DtlError::Internal(format!("service {} has neither image nor build", service.name))
        })?;

        let push_key = CacheKey::push(&service.name);
        let (push, cache) = match self.options.push_override {
            Some(push) => (push, cache.record(&push_key, &push)),
            None => match cache.get_as::<bool>(&push_key) {
                Some(push) => (push, cache),
                None => {
                    let push = self.prompter.push_image(&service.name, image).await?;
                    (push, cache.record(&push_key, &push))
                }
            },
        };

        if !push {
            debug!("Reusing image {} for {}", image, service.name);
            return Ok((
                ImageReference {
                    original: Some(image.to_string()),
                    resolved: image.to_string(),
                    mode: ImageMode::Reused,
                    pushed: false,
                },
                cache,
            ));
        }

        let (registry, cache) = self.registry(cache).await?;
        let tag = destination(&registry, &self.options.package, image);

        let image_key = CacheKey::image(image);
        if self.is_cached(&cache, &image_key, &tag) {
            return Ok((
                ImageReference {
                    original: Some(image.to_string()),
                    resolved: tag,
                    mode: ImageMode::Retagged,
                    pushed: false,
                },
                cache,
            ));
        }

        let sink = |line: String| self.progress.line(line);

        self.progress.begin(&service.name, "Pulling");
        let pulled = self.executor.pull(image, &sink).await;
        self.progress.end();
        pulled?;

        self.executor.tag(image, &tag).await?;

        self.progress.begin(&service.name, "Pushing");
        let pushed = self.executor.push(&tag, &sink).await;
        self.progress.end();
        pushed?;

        info!("Pushed {} as {}", image, tag);
        let cache = cache.record(&image_key, &tag);
        Ok((
            ImageReference {
                original: Some(image.to_string()),
                resolved: tag,
                mode: ImageMode::Retagged,
                pushed: true,
            },
            cache,
        ))
    }

    async fn build(
        &mut self,
        service: &ComposeService,
        build: &BuildSpec,
        cache: SelectionCache,
    ) -> DtlResult<(ImageReference, SelectionCache)> {
        let (registry, cache) = self.registry(cache).await?;
        let dockerfile = build.dockerfile.as_deref().unwrap_or("Dockerfile");
        let tag = destination(
            &registry,
            &self.options.package,
            &format!("{}{}{}", service.name, build.context, dockerfile),
        );

        let build_key = CacheKey::build(&service.name);
        if self.is_cached(&cache, &build_key, &tag) {
            return Ok((
                ImageReference {
                    original: service.image.clone(),
                    resolved: tag,
                    mode: ImageMode::Built,
                    pushed: false,
                },
                cache,
            ));
        }

        let request = build_request(&self.options.compose_dir, build, &tag);
        let sink = |line: String| self.progress.line(line);

        self.progress.begin(&service.name, "Building");
        let built = self.executor.build(&request, &sink).await;
        self.progress.end();
        built?;

        self.progress.begin(&service.name, "Pushing");
        let pushed = self.executor.push(&tag, &sink).await;
        self.progress.end();
        pushed?;

        info!("Built and pushed {} for {}", tag, service.name);
        let cache = cache.record(&build_key, &tag);
        Ok((
            ImageReference {
                original: service.image.clone(),
                resolved: tag,
                mode: ImageMode::Built,
                pushed: true,
            },
            cache,
        ))
    }

    /// Whether `tag` was already pushed by an earlier run
    fn is_cached(&self, cache: &SelectionCache, key: &CacheKey, tag: &str) -> bool {
        if self.options.refresh {
            return false;
        }
        match cache.get_as::<String>(key) {
            Some(cached) if cached == tag => {
                debug!("Reusing cached tag {} from {}", tag, key);
                true
            }
            Some(cached) => {
                info!("Cached tag {} no longer matches {}, pushing again", cached, tag);
                false
            }
            None => false,
        }
    }

    /// Whether resolving `service` goes through a registry.
    ///
    /// Without a command-line or cached push decision this assumes the
    /// image is reused, which is what a non-interactive run does.
    pub fn needs_registry(&self, service: &ComposeService, cache: &SelectionCache) -> bool {
        if service.build.is_some() {
            return true;
        }
        service.image.is_some()
            && self
                .options
                .push_override
                .or_else(|| cache.get_as::<bool>(&CacheKey::push(&service.name)))
                .unwrap_or(false)
    }

    /// Registry available without asking: flag, cache or global config
    pub fn known_registry(&self, cache: &SelectionCache) -> Option<String> {
        self.registry
            .clone()
            .or_else(|| self.options.registry_override.clone())
            .or_else(|| cache.get_as::<String>(&CacheKey::registry()))
            .or_else(|| self.global.registry.clone())
    }

    /// Registry for this run: flag, then cache, then global config, then prompt
    async fn registry(&mut self, cache: SelectionCache) -> DtlResult<(String, SelectionCache)> {
        if let Some(ref registry) = self.registry {
            return Ok((registry.clone(), cache));
        }

        let key = CacheKey::registry();
        let (registry, remember) = if let Some(ref registry) = self.options.registry_override {
            (registry.clone(), true)
        } else if let Some(registry) = cache.get_as::<String>(&key) {
            (registry, false)
        } else if let Some(ref registry) = self.global.registry {
            (registry.clone(), false)
        } else if self.prompter.is_interactive() {
            let answer = self.prompter.registry().await?;
            if answer.persist {
                self.persist_registry(&answer.url).await;
            }
            (answer.url, true)
        } else {
            return Err(missing_registry());
        };

        let registry = registry.trim().trim_end_matches('/').to_string();
        if registry.is_empty() {
            return Err(DtlError::validation("registry", "must not be empty"));
        }

        let cache = if remember {
            cache.record(&key, &registry)
        } else {
            cache
        };

        self.registry = Some(registry.clone());
        Ok((registry, cache))
    }

    async fn persist_registry(&mut self, url: &str) {
        self.global.registry = Some(url.to_string());
        if let Err(e) = self.config.save(&self.global).await {
            warn!("Could not save registry to {}: {}", self.config.path().display(), e);
        }
    }
}

/// Error for a run that needs a registry and has none
pub fn missing_registry() -> DtlError {
    DtlError::Configuration(
        "registry (pass --registry or run: lzc-dtl config set registry <url>)".to_string(),
    )
}

/// `registry/<app>:<md5(identity)>`
fn destination(registry: &str, package: &str, identity: &str) -> String {
    format!("{}/{}:{}", registry, package_base_name(package), md5_hex(identity))
}

/// Context is relative to the compose directory, the dockerfile to the context
fn build_request(compose_dir: &Path, build: &BuildSpec, tag: &str) -> BuildRequest {
    let context = compose_dir.join(&build.context);
    let dockerfile = build.dockerfile.as_ref().map(|df| context.join(df));
    BuildRequest {
        tag: tag.to_string(),
        context,
        dockerfile,
    }
}
