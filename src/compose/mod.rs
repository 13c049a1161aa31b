//! Compose file loading
//!
//! Reads a compose file, interpolates `${VAR}` expressions per service
//! (each service sees its own `env_file` on top of the project `.env` and
//! the process environment) and normalises the result into typed
//! services. Structural problems are reported before any resolution work
//! starts.

pub mod env_file;
pub mod service;

pub use env_file::{parse_env, read_env_file, EnvMap};
pub use service::{BuildSpec, CommandLine, ComposeService, PortEntry, VolumeSpec};

use crate::error::{DtlError, DtlResult};
use crate::resolve::env::{resolve, EnvSources};
use indexmap::IndexMap;
use service::RawService;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Service name the platform reserves for its own application container
pub const RESERVED_SERVICE_NAME: &str = "app";

/// A parsed and interpolated compose project
#[derive(Debug, Clone)]
pub struct ComposeProject {
    /// The compose file itself
    pub path: PathBuf,

    /// Directory relative paths are resolved against
    pub dir: PathBuf,

    /// Services in declaration order
    pub services: IndexMap<String, ComposeService>,
}

impl ComposeProject {
    /// Load and interpolate a compose file.
    ///
    /// `process_env` is the process environment snapshot used as the
    /// third interpolation layer.
    pub async fn load(path: &Path, process_env: &HashMap<String, String>) -> DtlResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DtlError::io(format!("reading compose file {}", path.display()), e))?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let project_env_path = dir.join(".env");
        let project_env = if project_env_path.is_file() {
            debug!("Loading project env from {}", project_env_path.display());
            read_env_file(&project_env_path).await?
        } else {
            EnvMap::new()
        };

        let services = parse_services(path, &dir, &content, &project_env, process_env).await?;

        Ok(Self {
            path: path.to_path_buf(),
            dir,
            services,
        })
    }

    /// Service names in declaration order
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

async fn parse_services(
    path: &Path,
    dir: &Path,
    content: &str,
    project_env: &EnvMap,
    process_env: &HashMap<String, String>,
) -> DtlResult<IndexMap<String, ComposeService>> {
    let document: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| DtlError::schema(path, format!("not valid YAML: {e}")))?;

    let services = document
        .get("services")
        .ok_or_else(|| DtlError::schema(path, "no `services` section"))?
        .as_mapping()
        .ok_or_else(|| DtlError::schema(path, "`services` is not a mapping"))?;

    if services.is_empty() {
        return Err(DtlError::schema(path, "`services` is empty"));
    }

    let mut parsed = IndexMap::with_capacity(services.len());

    for (key, value) in services {
        let name = key
            .as_str()
            .ok_or_else(|| DtlError::schema(path, "service names must be strings"))?
            .to_string();

        if name == RESERVED_SERVICE_NAME {
            return Err(DtlError::validation(
                format!("services.{name}"),
                "this name is reserved by the platform, rename the service",
            ));
        }

        if !value.is_mapping() {
            return Err(DtlError::schema(
                path,
                format!("service `{name}` is not a mapping"),
            ));
        }

        let file_env = load_service_env_files(&name, value, dir).await?;

        let sources = EnvSources::new(project_env, process_env).with_service_file(&file_env);
        let mut value = value.clone();
        interpolate(&mut value, &sources);

        let raw: RawService = serde_yaml::from_value(value)
            .map_err(|e| DtlError::schema(path, format!("service `{name}`: {e}")))?;
        let service = raw.into_service(&name, &file_env, &sources)?;

        if service.image.is_none() && service.build.is_none() {
            return Err(DtlError::schema(
                path,
                format!("service `{name}` has neither `image` nor `build`"),
            ));
        }

        parsed.insert(name, service);
    }

    Ok(parsed)
}

/// Read the service's `env_file` entries, later files overriding earlier ones
async fn load_service_env_files(
    name: &str,
    service: &serde_yaml::Value,
    dir: &Path,
) -> DtlResult<EnvMap> {
    let files: Vec<String> = match service.get("env_file") {
        None | Some(serde_yaml::Value::Null) => return Ok(EnvMap::new()),
        Some(serde_yaml::Value::String(file)) => vec![file.clone()],
        Some(serde_yaml::Value::Sequence(items)) => items
            .iter()
            .map(|item| match item {
                serde_yaml::Value::String(file) => Ok(file.clone()),
                other => other
                    .get("path")
                    .and_then(serde_yaml::Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        DtlError::validation(
                            format!("services.{name}.env_file"),
                            "entries must be paths",
                        )
                    }),
            })
            .collect::<DtlResult<_>>()?,
        Some(_) => {
            return Err(DtlError::validation(
                format!("services.{name}.env_file"),
                "must be a path or a list of paths",
            ))
        }
    };

    let mut merged = EnvMap::new();
    for file in files {
        let file_path = dir.join(&file);
        if !file_path.is_file() {
            return Err(DtlError::validation(
                format!("services.{name}.env_file"),
                format!("{} does not exist", file_path.display()),
            ));
        }
        merged.extend(read_env_file(&file_path).await?);
    }

    Ok(merged)
}

/// Interpolate every string scalar in a YAML tree. Mapping keys are left alone.
fn interpolate(value: &mut serde_yaml::Value, sources: &EnvSources<'_>) {
    match value {
        serde_yaml::Value::String(s) => *s = resolve(s, sources),
        serde_yaml::Value::Sequence(items) => {
            for item in items {
                interpolate(item, sources);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                interpolate(item, sources);
            }
        }
        serde_yaml::Value::Tagged(tagged) => interpolate(&mut tagged.value, sources),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn load(dir: &TempDir, compose: &str) -> DtlResult<ComposeProject> {
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, compose).unwrap();
        ComposeProject::load(&path, &HashMap::new()).await
    }

    #[tokio::test]
    async fn loads_services_in_order() {
        let temp = TempDir::new().unwrap();
        let project = load(
            &temp,
            "services:\n  web:\n    image: nginx\n  db:\n    image: postgres\n",
        )
        .await
        .unwrap();

        assert_eq!(project.service_names(), vec!["web", "db"]);
        assert_eq!(project.dir, temp.path());
    }

    #[tokio::test]
    async fn missing_services_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let err = load(&temp, "version: '3'\n").await.unwrap_err();
        assert!(matches!(err, DtlError::Schema { .. }));
    }

    #[tokio::test]
    async fn service_without_image_or_build_is_schema_error() {
        let temp = TempDir::new().unwrap();
        let err = load(&temp, "services:\n  web:\n    ports: ['80']\n")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("neither `image` nor `build`"));
    }

    #[tokio::test]
    async fn reserved_name_is_rejected() {
        let temp = TempDir::new().unwrap();
        let err = load(&temp, "services:\n  app:\n    image: nginx\n")
            .await
            .unwrap_err();
        assert!(matches!(err, DtlError::Validation { .. }));
    }

    #[tokio::test]
    async fn interpolates_with_env_file_precedence() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".env"), "TAG=project\nROOT=/srv\n").unwrap();
        std::fs::write(temp.path().join("web.env"), "TAG=service\n").unwrap();

        let project = load(
            &temp,
            "services:\n  web:\n    image: nginx:${TAG}\n    env_file: web.env\n    volumes:\n      - ${ROOT}/html:/usr/share/nginx/html\n  db:\n    image: postgres:${TAG}\n",
        )
        .await
        .unwrap();

        let web = &project.services["web"];
        assert_eq!(web.image.as_deref(), Some("nginx:service"));
        assert_eq!(web.volumes[0].source.as_deref(), Some("/srv/html"));
        assert_eq!(web.environment, vec!["TAG=service"]);
        assert_eq!(
            project.services["db"].image.as_deref(),
            Some("postgres:project")
        );
    }

    #[tokio::test]
    async fn missing_env_file_is_validation_error() {
        let temp = TempDir::new().unwrap();
        let err = load(
            &temp,
            "services:\n  web:\n    image: nginx\n    env_file: [missing.env]\n",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DtlError::Validation { .. }));
    }
}
