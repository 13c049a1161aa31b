//! Volume classification
//!
//! Every compose volume becomes one of four mounts on the target:
//!
//! | Source                  | Result                                          |
//! |-------------------------|-------------------------------------------------|
//! | bare identifier         | named volume, `/lzcapp/var/data/<name>`         |
//! | existing host path      | packaged content, empty dir, or ignored         |
//! | missing host path       | empty dir or ignored                            |
//! | none (anonymous)        | empty dir or ignored                            |
//!
//! The classification itself is the pure [`decide`] function; the
//! [`VolumeClassifier`] adds filesystem probing, prompting and caching
//! around it.

use crate::cache::{CacheKey, SelectionCache};
use crate::compose::VolumeSpec;
use crate::error::{DtlError, DtlResult};
use crate::resolve::prompt::{EmptyDirLocation, Prompter, VolumeAction, VolumeDecision};
use indexmap::IndexMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Root for named volumes on the target
pub const NAMED_VOLUME_ROOT: &str = "/lzcapp/var/data";
/// Root for application-private empty directories
pub const APP_DATA_ROOT: &str = "/lzcapp/var";
/// Root for directories shared with the user's documents
pub const USER_DATA_ROOT: &str = "/lzcapp/run/mnt/home";
/// Where packaged content is unpacked on the target
pub const CONTENT_ROOT: &str = "/lzcapp/pkg/content";

const WITH_CONTENT: &[VolumeAction] = &[
    VolumeAction::UseContent,
    VolumeAction::EmptyDir,
    VolumeAction::Ignore,
];
const WITHOUT_CONTENT: &[VolumeAction] = &[VolumeAction::EmptyDir, VolumeAction::Ignore];

/// Filesystem existence check, injectable for tests
pub trait PathProbe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// [`PathProbe`] backed by the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// What the source side of a volume refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Anonymous,
    Named(String),
    HostPath { path: PathBuf, exists: bool },
}

/// A host file or directory to ship in the content archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    /// Path inside the archive, `/`-separated
    pub relative_path: String,
    /// Host path the files are read from
    pub source: PathBuf,
}

/// Final form of one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeKind {
    Named(String),
    Content(ContentEntry),
    EmptyDir(EmptyDirLocation),
    Ignored,
}

/// A volume after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVolume {
    pub target: String,
    pub kind: VolumeKind,
}

impl ResolvedVolume {
    /// The `source:target` bind for the manifest, `None` when ignored
    pub fn bind(&self) -> Option<String> {
        let source = match self.kind {
            VolumeKind::Named(ref name) => format!("{NAMED_VOLUME_ROOT}/{name}"),
            VolumeKind::Content(ref entry) => format!("{CONTENT_ROOT}/{}", entry.relative_path),
            VolumeKind::EmptyDir(EmptyDirLocation::AppData) => {
                format!("{APP_DATA_ROOT}/{}", target_basename(&self.target))
            }
            VolumeKind::EmptyDir(EmptyDirLocation::UserData { ref subdir }) => {
                format!("{USER_DATA_ROOT}/{subdir}")
            }
            VolumeKind::Ignored => return None,
        };
        Some(format!("{}:{}", source, self.target))
    }

    pub fn content(&self) -> Option<&ContentEntry> {
        match self.kind {
            VolumeKind::Content(ref entry) => Some(entry),
            _ => None,
        }
    }
}

/// Result of the pure classification step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Resolved(VolumeKind),
    /// No usable cached decision; ask among these actions
    NeedsDecision(&'static [VolumeAction]),
}

/// Classify a volume from its source, and a cached decision if any.
///
/// A cached decision that is not valid for the source any more (for
/// example `use-content` after the host directory was removed) is
/// ignored so the question is asked again.
pub fn decide(
    source: &SourceKind,
    compose_dir: &Path,
    cached: Option<&VolumeDecision>,
) -> Classification {
    let options = match source {
        SourceKind::Named(name) => return Classification::Resolved(VolumeKind::Named(name.clone())),
        SourceKind::Anonymous => WITHOUT_CONTENT,
        SourceKind::HostPath { exists: true, .. } => WITH_CONTENT,
        SourceKind::HostPath { exists: false, .. } => WITHOUT_CONTENT,
    };

    match cached {
        Some(decision) if options.contains(&decision.action()) && decision_is_valid(decision) => {
            Classification::Resolved(apply(decision, source, compose_dir))
        }
        _ => Classification::NeedsDecision(options),
    }
}

fn decision_is_valid(decision: &VolumeDecision) -> bool {
    match decision {
        VolumeDecision::UserData { subdir } => validate_subdir(subdir).is_ok(),
        _ => true,
    }
}

fn apply(decision: &VolumeDecision, source: &SourceKind, compose_dir: &Path) -> VolumeKind {
    match decision {
        VolumeDecision::UseContent => match source {
            SourceKind::HostPath { path, .. } => VolumeKind::Content(ContentEntry {
                relative_path: content_path(path, compose_dir),
                source: path.clone(),
            }),
            // Only host paths are offered use-content
            _ => VolumeKind::Ignored,
        },
        VolumeDecision::AppData => VolumeKind::EmptyDir(EmptyDirLocation::AppData),
        VolumeDecision::UserData { subdir } => VolumeKind::EmptyDir(EmptyDirLocation::UserData {
            subdir: subdir.clone(),
        }),
        VolumeDecision::Ignore => VolumeKind::Ignored,
    }
}

/// Work out what a volume's source refers to
pub fn source_kind(spec: &VolumeSpec, compose_dir: &Path, probe: &dyn PathProbe) -> SourceKind {
    let Some(ref source) = spec.source else {
        return SourceKind::Anonymous;
    };

    if !is_path_source(source) {
        return SourceKind::Named(source.clone());
    }

    match host_path(source, compose_dir) {
        Some(path) => {
            let exists = probe.exists(&path);
            SourceKind::HostPath { path, exists }
        }
        None => {
            debug!("Cannot resolve {} on this host", source);
            SourceKind::HostPath {
                path: PathBuf::from(source),
                exists: false,
            }
        }
    }
}

fn is_path_source(source: &str) -> bool {
    source.starts_with('/')
        || source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with('~')
        || source == "."
        || source == ".."
}

/// Absolute, lexically normalised host path for a source.
///
/// `None` for `~user` paths and for `~` without a home directory.
fn host_path(source: &str, compose_dir: &Path) -> Option<PathBuf> {
    let raw = if let Some(rest) = source.strip_prefix('~') {
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        dirs::home_dir()?.join(rest.trim_start_matches('/'))
    } else if source.starts_with('/') {
        PathBuf::from(source)
    } else {
        compose_dir.join(source)
    };
    Some(normalize(&raw))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Archive path for packaged content: relative to the project when the
/// source lives inside it, the source's own name otherwise
fn content_path(host: &Path, compose_dir: &Path) -> String {
    let relative = host
        .strip_prefix(normalize(compose_dir))
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        });

    relative.unwrap_or_else(|| {
        host.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "content".to_string())
    })
}

/// Last path segment of a mount target, used to name its directory
pub fn target_basename(target: &str) -> &str {
    target
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("data")
}

/// Check a user-data subdirectory name
pub fn validate_subdir(subdir: &str) -> DtlResult<()> {
    if subdir.trim().is_empty() {
        return Err(DtlError::validation("subdir", "must not be empty"));
    }
    if subdir.contains('/') || subdir.contains('\\') {
        return Err(DtlError::validation(
            "subdir",
            format!("'{subdir}' must not contain a path separator"),
        ));
    }
    if subdir == "." || subdir == ".." {
        return Err(DtlError::validation("subdir", "must name a directory"));
    }
    Ok(())
}

/// Classifies the volumes of one project
pub struct VolumeClassifier<'a> {
    compose_dir: &'a Path,
    probe: &'a dyn PathProbe,
    prompter: &'a dyn Prompter,
}

impl<'a> VolumeClassifier<'a> {
    pub fn new(compose_dir: &'a Path, probe: &'a dyn PathProbe, prompter: &'a dyn Prompter) -> Self {
        Self {
            compose_dir,
            probe,
            prompter,
        }
    }

    /// Classify one volume of `service`, asking when the cache has no answer.
    pub async fn classify(
        &self,
        service: &str,
        spec: &VolumeSpec,
        cache: SelectionCache,
    ) -> DtlResult<(ResolvedVolume, SelectionCache)> {
        let source = source_kind(spec, self.compose_dir, self.probe);
        let key = CacheKey::volume(service, spec.source.as_deref(), &spec.target);
        let cached: Option<VolumeDecision> = match source {
            SourceKind::Named(_) => None,
            _ => cache.get_as(&key),
        };

        let (kind, cache) = match decide(&source, self.compose_dir, cached.as_ref()) {
            Classification::Resolved(kind) => {
                debug!("Volume {} of {} resolved without prompting", spec.display(), service);
                (kind, cache)
            }
            Classification::NeedsDecision(options) => {
                let decision = self.ask(service, spec, options).await?;
                let cache = cache.record(&key, &decision);
                (apply(&decision, &source, self.compose_dir), cache)
            }
        };

        Ok((
            ResolvedVolume {
                target: spec.target.clone(),
                kind,
            },
            cache,
        ))
    }

    async fn ask(
        &self,
        service: &str,
        spec: &VolumeSpec,
        options: &[VolumeAction],
    ) -> DtlResult<VolumeDecision> {
        let action = self.prompter.volume_action(service, spec, options).await?;
        if !options.contains(&action) {
            return Err(DtlError::validation(
                format!("services.{service}.volumes"),
                format!("'{}' cannot be used for {}", action.label(), spec.display()),
            ));
        }

        Ok(match action {
            VolumeAction::UseContent => VolumeDecision::UseContent,
            VolumeAction::Ignore => VolumeDecision::Ignore,
            VolumeAction::EmptyDir => {
                let location = self
                    .prompter
                    .empty_dir_location(service, &spec.target)
                    .await?;
                if let EmptyDirLocation::UserData { ref subdir } = location {
                    validate_subdir(subdir)?;
                }
                VolumeDecision::empty_dir(location)
            }
        })
    }
}

/// Host content collected from `use-content` volumes, keyed by archive path
#[derive(Debug, Clone, Default)]
pub struct ContentPlan {
    entries: IndexMap<String, PathBuf>,
}

impl ContentPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. The same source may be mounted more than once; two
    /// different sources claiming one archive path is an error.
    pub fn add(&mut self, entry: &ContentEntry) -> DtlResult<()> {
        match self.entries.get(&entry.relative_path) {
            Some(existing) if existing != &entry.source => Err(DtlError::validation(
                "volumes",
                format!(
                    "{} and {} would both be packaged as '{}'",
                    existing.display(),
                    entry.source.display(),
                    entry.relative_path
                ),
            )),
            Some(_) => Ok(()),
            None => {
                self.entries
                    .insert(entry.relative_path.clone(), entry.source.clone());
                Ok(())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order they were first mounted
    pub fn entries(&self) -> impl Iterator<Item = ContentEntry> + '_ {
        self.entries.iter().map(|(relative_path, source)| ContentEntry {
            relative_path: relative_path.clone(),
            source: source.clone(),
        })
    }
}
