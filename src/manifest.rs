//! Manifest assembly
//!
//! Folds the application answers, the resolved services and the route
//! table into the platform manifest. Field order is fixed by the struct
//! layout, and services keep compose declaration order, so the same
//! inputs always serialize to the same bytes.

use crate::answers::{AppAnswers, FileHandler};
use crate::compose::CommandLine;
use crate::engine::ResolvedService;
use crate::error::DtlResult;
use crate::resolve::route::{IngressRule, RouteTable};
use indexmap::IndexMap;
use serde::Serialize;

/// Manifest format version understood by the platform
pub const SDK_VERSION: &str = "0.1";

/// File name of the manifest inside the package
pub const MANIFEST_FILE_NAME: &str = "manifest.yml";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    #[serde(rename = "lzc-sdk-version")]
    pub schema_version: String,
    pub name: String,
    pub package: String,
    pub version: String,
    pub description: String,
    pub homepage: String,
    pub author: String,
    pub application: Application,
    pub services: IndexMap<String, ServiceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub subdomain: String,
    pub background_task: bool,
    pub multi_instance: bool,
    pub gpu_accel: bool,
    pub kvm_accel: bool,
    pub usb_accel: bool,
    pub public_path: Vec<String>,
    pub routes: Vec<String>,
    pub ingress: Vec<IngressRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_handler: Option<FileHandlerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileHandlerEntry {
    pub mime: Vec<String>,
    pub extensions: Vec<String>,
    pub actions: FileActions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileActions {
    pub open: String,
}

impl From<&FileHandler> for FileHandlerEntry {
    fn from(handler: &FileHandler) -> Self {
        Self {
            mime: handler.mime.clone(),
            extensions: handler.extensions.clone(),
            actions: FileActions {
                open: handler.open.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<CommandLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,
}

impl Manifest {
    /// Build the manifest. Pure: no I/O, no decisions.
    pub fn assemble(app: &AppAnswers, services: &[ResolvedService], routes: &RouteTable) -> Self {
        let services = services
            .iter()
            .map(|service| {
                let entry = ServiceEntry {
                    image: service.image.resolved.clone(),
                    environment: service.environment.clone(),
                    command: service.command.clone(),
                    entrypoint: service.entrypoint.clone(),
                    depends_on: service.depends_on.clone(),
                    binds: service.volumes.iter().filter_map(|v| v.bind()).collect(),
                };
                (service.name.clone(), entry)
            })
            .collect();

        Self {
            schema_version: SDK_VERSION.to_string(),
            name: app.name.clone(),
            package: app.package.clone(),
            version: app.version.clone(),
            description: app.description.clone(),
            homepage: app.homepage.clone(),
            author: app.author.clone(),
            application: Application {
                subdomain: app.subdomain.clone(),
                background_task: app.background_task,
                multi_instance: app.multi_instance,
                gpu_accel: app.gpu_accel,
                kvm_accel: app.kvm_accel,
                usb_accel: app.usb_accel,
                public_path: app.public_path.clone(),
                routes: routes.routes.clone(),
                ingress: routes.ingress.clone(),
                file_handler: app.file_handler.as_ref().map(FileHandlerEntry::from),
            },
            services,
        }
    }

    pub fn to_yaml(&self) -> DtlResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
