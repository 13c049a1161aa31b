//! Terminal and flag-driven [`Prompter`] implementations

use super::prompts::{self, Validator};
use crate::compose::VolumeSpec;
use crate::error::{DtlError, DtlResult};
use crate::resolve::prompt::{
    EmptyDirLocation, IngressProtocol, PortRoute, Prompter, RegistryAnswer, VolumeAction,
};
use crate::resolve::route::PortMapping;
use crate::resolve::volume::{target_basename, validate_subdir};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationChoice {
    AppData,
    UserData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKind {
    Http,
    Https,
    Ingress,
}

fn check_subdir(value: &str) -> Result<(), String> {
    validate_subdir(value).map_err(|e| e.to_string())
}

fn check_not_empty(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err("A value is required".to_string())
    } else {
        Ok(())
    }
}

fn check_route_path(value: &str) -> Result<(), String> {
    if value.chars().any(char::is_whitespace) {
        Err("Paths cannot contain whitespace".to_string())
    } else {
        Ok(())
    }
}

/// Asks a person through cliclack prompts
#[derive(Debug, Default, Clone)]
pub struct InteractivePrompter;

impl InteractivePrompter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prompter for InteractivePrompter {
    fn is_interactive(&self) -> bool {
        true
    }

    async fn volume_action(
        &self,
        service: &str,
        volume: &VolumeSpec,
        options: &[VolumeAction],
    ) -> DtlResult<VolumeAction> {
        let items = options
            .iter()
            .map(|action| (*action, action.label().to_string(), String::new()))
            .collect();
        prompts::select(
            &format!("{}: volume {}", service, volume.display()),
            items,
            None,
        )
        .await
    }

    async fn empty_dir_location(
        &self,
        service: &str,
        target: &str,
    ) -> DtlResult<EmptyDirLocation> {
        let items = vec![
            (
                LocationChoice::AppData,
                "Application data".to_string(),
                "private to the app".to_string(),
            ),
            (
                LocationChoice::UserData,
                "User documents".to_string(),
                "a folder in the user's home".to_string(),
            ),
        ];
        let choice = prompts::select(
            &format!("{}: where should {} live?", service, target),
            items,
            None,
        )
        .await?;

        match choice {
            LocationChoice::AppData => Ok(EmptyDirLocation::AppData),
            LocationChoice::UserData => {
                let subdir = prompts::input(
                    "Folder name",
                    Some(target_basename(target)),
                    Some(check_subdir as Validator),
                )
                .await?;
                Ok(EmptyDirLocation::UserData { subdir })
            }
        }
    }

    async fn accept_port(&self, service: &str, port: &PortMapping) -> DtlResult<bool> {
        prompts::confirm(&format!("{}: expose port {}?", service, port), true).await
    }

    async fn port_route(&self, service: &str, port: &PortMapping) -> DtlResult<PortRoute> {
        let items = vec![
            (RouteKind::Http, "HTTP".to_string(), "routed by path".to_string()),
            (RouteKind::Https, "HTTPS".to_string(), "routed by path".to_string()),
            (
                RouteKind::Ingress,
                "TCP/UDP".to_string(),
                "raw port".to_string(),
            ),
        ];
        let kind = prompts::select(
            &format!("{}: how is port {} reached?", service, port),
            items,
            None,
        )
        .await?;

        match kind {
            RouteKind::Http | RouteKind::Https => {
                let path = prompts::input("Route path", Some("/"), Some(check_route_path as Validator)).await?;
                Ok(if kind == RouteKind::Http {
                    PortRoute::Http { path }
                } else {
                    PortRoute::Https { path }
                })
            }
            RouteKind::Ingress => {
                let initial = match port.protocol.as_deref() {
                    Some("udp") => IngressProtocol::Udp,
                    _ => IngressProtocol::Tcp,
                };
                let protocol = prompts::select(
                    "Protocol",
                    vec![
                        (IngressProtocol::Tcp, "tcp".to_string(), String::new()),
                        (IngressProtocol::Udp, "udp".to_string(), String::new()),
                    ],
                    Some(initial),
                )
                .await?;
                Ok(PortRoute::Ingress { protocol })
            }
        }
    }

    async fn push_image(&self, service: &str, image: &str) -> DtlResult<bool> {
        prompts::confirm(
            &format!("{}: copy {} to your registry?", service, image),
            false,
        )
        .await
    }

    async fn registry(&self) -> DtlResult<RegistryAnswer> {
        let url = prompts::input(
            "Registry to push images to",
            None,
            Some(check_not_empty as Validator),
        )
        .await?;
        let persist = prompts::confirm("Use this registry for future projects?", true).await?;
        Ok(RegistryAnswer { url, persist })
    }

    async fn text(&self, _field: &str, prompt: &str, default: Option<&str>) -> DtlResult<String> {
        let validator = match default {
            Some(_) => None,
            None => Some(check_not_empty as Validator),
        };
        prompts::input(prompt, default, validator).await
    }

    async fn confirm(&self, _field: &str, prompt: &str, default: bool) -> DtlResult<bool> {
        prompts::confirm(prompt, default).await
    }

    async fn select_file(
        &self,
        _field: &str,
        prompt: &str,
        choices: &[String],
    ) -> DtlResult<String> {
        let items = choices
            .iter()
            .map(|choice| (choice.clone(), choice.clone(), String::new()))
            .collect();
        prompts::select(prompt, items, None).await
    }
}

/// Answers from flags and defaults only.
///
/// Volumes fall back to packaging existing files and to application data
/// otherwise. Anything else without a default is a configuration error
/// naming the flag that supplies it.
#[derive(Debug, Default, Clone)]
pub struct NonInteractivePrompter {
    push: bool,
}

impl NonInteractivePrompter {
    /// `push` answers every "copy to registry" question
    pub fn new(push: bool) -> Self {
        Self { push }
    }
}

#[async_trait]
impl Prompter for NonInteractivePrompter {
    fn is_interactive(&self) -> bool {
        false
    }

    async fn volume_action(
        &self,
        _service: &str,
        _volume: &VolumeSpec,
        options: &[VolumeAction],
    ) -> DtlResult<VolumeAction> {
        if options.contains(&VolumeAction::UseContent) {
            Ok(VolumeAction::UseContent)
        } else {
            Ok(VolumeAction::EmptyDir)
        }
    }

    async fn empty_dir_location(
        &self,
        _service: &str,
        _target: &str,
    ) -> DtlResult<EmptyDirLocation> {
        Ok(EmptyDirLocation::AppData)
    }

    async fn accept_port(&self, service: &str, port: &PortMapping) -> DtlResult<bool> {
        Err(DtlError::Configuration(format!(
            "--routes (port {} of service {} needs a route)",
            port, service
        )))
    }

    async fn port_route(&self, service: &str, port: &PortMapping) -> DtlResult<PortRoute> {
        Err(DtlError::Configuration(format!(
            "--routes (port {} of service {} needs a route)",
            port, service
        )))
    }

    async fn push_image(&self, _service: &str, _image: &str) -> DtlResult<bool> {
        Ok(self.push)
    }

    async fn registry(&self) -> DtlResult<RegistryAnswer> {
        Err(DtlError::Configuration("--registry".to_string()))
    }

    async fn text(&self, field: &str, _prompt: &str, default: Option<&str>) -> DtlResult<String> {
        default
            .map(str::to_string)
            .ok_or_else(|| DtlError::Configuration(format!("--{}", field.replace('_', "-"))))
    }

    async fn confirm(&self, _field: &str, _prompt: &str, default: bool) -> DtlResult<bool> {
        Ok(default)
    }

    async fn select_file(
        &self,
        field: &str,
        _prompt: &str,
        _choices: &[String],
    ) -> DtlResult<String> {
        Err(DtlError::Configuration(format!("--{}", field)))
    }
}
