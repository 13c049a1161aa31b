//! Typed compose service definitions
//!
//! Raw YAML shapes are deserialized into the `Raw*` types and normalised
//! into [`ComposeService`], so the resolvers never deal with the several
//! spellings compose allows for the same thing.

use crate::error::{DtlError, DtlResult};
use crate::resolve::env::EnvSources;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One service, after interpolation and normalisation
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeService {
    pub name: String,
    pub image: Option<String>,
    pub build: Option<BuildSpec>,
    pub volumes: Vec<VolumeSpec>,
    /// `KEY=VALUE` entries in declaration order
    pub environment: Vec<String>,
    pub command: Option<CommandLine>,
    pub entrypoint: Option<CommandLine>,
    pub depends_on: Vec<String>,
    pub ports: Vec<PortEntry>,
}

/// Where and how to build an image from source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub context: String,
    pub dockerfile: Option<String>,
}

/// A volume entry as written in the compose file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Absent for anonymous volumes
    pub source: Option<String>,
    pub target: String,
    pub mode: Option<String>,
}

impl VolumeSpec {
    /// Parse the short `[source:]target[:mode]` syntax
    pub fn parse(raw: &str, field: &str) -> DtlResult<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        let (source, target, mode) = match parts.as_slice() {
            [target] => (None, *target, None),
            [source, target] => (Some(*source), *target, None),
            [source, target, mode] => (Some(*source), *target, Some(*mode)),
            _ => {
                return Err(DtlError::validation(
                    field,
                    format!("'{raw}' is not of the form [source:]target[:mode]"),
                ))
            }
        };

        if target.is_empty() {
            return Err(DtlError::validation(field, "volume target is empty"));
        }

        Ok(Self {
            source: source.filter(|s| !s.is_empty()).map(str::to_string),
            target: target.to_string(),
            mode: mode.map(str::to_string),
        })
    }

    /// The entry in short syntax, used in prompts and logs
    pub fn display(&self) -> String {
        match self.source {
            Some(ref source) => format!("{}:{}", source, self.target),
            None => self.target.clone(),
        }
    }
}

/// `command` / `entrypoint` in either shell or exec form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Exec(Vec<String>),
}

/// A `ports` entry, kept raw until the route model parses it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PortEntry {
    Number(u64),
    Short(String),
    Long {
        target: u64,
        #[serde(default)]
        published: Option<serde_yaml::Value>,
        #[serde(default)]
        protocol: Option<String>,
    },
}

impl PortEntry {
    /// The entry in short syntax
    pub fn display(&self) -> String {
        match self {
            Self::Number(port) => port.to_string(),
            Self::Short(raw) => raw.clone(),
            Self::Long {
                target,
                published,
                protocol,
            } => {
                let mut out = match published.as_ref().and_then(scalar_to_string) {
                    Some(published) => format!("{published}:{target}"),
                    None => target.to_string(),
                };
                if let Some(protocol) = protocol {
                    out.push('/');
                    out.push_str(protocol);
                }
                out
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawService {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    build: Option<RawBuild>,
    #[serde(default)]
    volumes: Vec<RawVolume>,
    #[serde(default)]
    environment: Option<RawEnvironment>,
    #[serde(default)]
    command: Option<CommandLine>,
    #[serde(default)]
    entrypoint: Option<CommandLine>,
    #[serde(default)]
    depends_on: Option<RawDependsOn>,
    #[serde(default)]
    ports: Vec<PortEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBuild {
    Context(String),
    Full {
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        dockerfile: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVolume {
    Short(String),
    Long {
        #[serde(default)]
        source: Option<String>,
        target: String,
        #[serde(default)]
        read_only: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEnvironment {
    List(Vec<String>),
    Map(IndexMap<String, serde_yaml::Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependsOn {
    List(Vec<String>),
    Map(IndexMap<String, serde_yaml::Value>),
}

impl RawService {
    /// Normalise into a [`ComposeService`].
    ///
    /// `file_env` holds the variables of the service's `env_file`s; they
    /// become environment entries unless `environment` sets the same key.
    /// A bare `KEY` in `environment` takes its value from `sources`.
    pub(crate) fn into_service(
        self,
        name: &str,
        file_env: &IndexMap<String, String>,
        sources: &EnvSources<'_>,
    ) -> DtlResult<ComposeService> {
        let build = self.build.map(|raw| match raw {
            RawBuild::Context(context) => BuildSpec {
                context,
                dockerfile: None,
            },
            RawBuild::Full {
                context,
                dockerfile,
            } => BuildSpec {
                context: context.unwrap_or_else(|| ".".to_string()),
                dockerfile,
            },
        });

        let volumes = self
            .volumes
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                let field = format!("services.{name}.volumes[{i}]");
                match raw {
                    RawVolume::Short(raw) => VolumeSpec::parse(&raw, &field),
                    RawVolume::Long {
                        source,
                        target,
                        read_only,
                    } => {
                        if target.is_empty() {
                            return Err(DtlError::validation(field, "volume target is empty"));
                        }
                        Ok(VolumeSpec {
                            source: source.filter(|s| !s.is_empty()),
                            target,
                            mode: read_only.then(|| "ro".to_string()),
                        })
                    }
                }
            })
            .collect::<DtlResult<Vec<_>>>()?;

        let declared: IndexMap<String, Option<String>> = match self.environment {
            None => IndexMap::new(),
            Some(RawEnvironment::List(entries)) => entries
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (entry, None),
                })
                .collect(),
            Some(RawEnvironment::Map(map)) => map
                .into_iter()
                .map(|(k, v)| (k, scalar_to_string(&v)))
                .collect(),
        };

        let mut environment = Vec::with_capacity(file_env.len() + declared.len());
        for (key, value) in file_env {
            if !declared.contains_key(key) {
                environment.push(format!("{key}={value}"));
            }
        }
        for (key, value) in declared {
            match value.or_else(|| sources.lookup(&key).map(str::to_string)) {
                Some(value) => environment.push(format!("{key}={value}")),
                None => tracing::warn!(
                    "services.{}.environment: {} has no value, dropping it",
                    name,
                    key
                ),
            }
        }

        let depends_on = match self.depends_on {
            None => Vec::new(),
            Some(RawDependsOn::List(names)) => names,
            Some(RawDependsOn::Map(map)) => map.into_keys().collect(),
        };

        Ok(ComposeService {
            name: name.to_string(),
            image: self.image.filter(|i| !i.trim().is_empty()),
            build,
            volumes,
            environment,
            command: self.command,
            entrypoint: self.entrypoint,
            depends_on,
            ports: self.ports,
        })
    }
}

/// Render a YAML scalar the way compose does for environment values
pub(crate) fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        other => serde_yaml::to_string(other)
            .ok()
            .map(|s| s.trim_end().to_string()),
    }
}
