//! HTTP routes and raw port exposures
//!
//! Routes come either from a typed list given on the command line
//! ([`parse_manual`]) or are derived from the `ports` of each service
//! ([`RouteModel::derive`]), one decision per published port. Both
//! collapse into a [`RouteTable`]: `path=target` strings for HTTP(S)
//! and `{protocol, port, service}` records for ingress, kept in the order
//! they were added.

use crate::cache::{CacheKey, SelectionCache};
use crate::compose::service::scalar_to_string;
use crate::compose::{ComposeService, PortEntry};
use crate::error::{DtlError, DtlResult};
use crate::resolve::prompt::{IngressProtocol, PortDecision, PortRoute, Prompter};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Check that a port number is usable
pub fn validate_port(field: &str, port: u64) -> DtlResult<u16> {
    match u16::try_from(port) {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(DtlError::validation(
            field,
            format!("port {port} is outside 1-65535"),
        )),
    }
}

fn parse_port(field: &str, raw: &str) -> DtlResult<u16> {
    let port: u64 = raw
        .trim()
        .parse()
        .map_err(|_| DtlError::validation(field, format!("'{raw}' is not a port number")))?;
    validate_port(field, port)
}

/// One published port of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    pub published: Option<u16>,
    pub container: u16,
    pub protocol: Option<String>,
    raw: String,
}

impl PortMapping {
    /// Parse a compose `ports` entry. Port ranges cannot be routed and
    /// are skipped with a warning.
    pub fn parse(entry: &PortEntry, field: &str) -> DtlResult<Option<Self>> {
        let raw = entry.display();
        match entry {
            PortEntry::Number(port) => Ok(Some(Self {
                host_ip: None,
                published: None,
                container: validate_port(field, *port)?,
                protocol: None,
                raw,
            })),
            PortEntry::Long {
                target,
                published,
                protocol,
            } => {
                let published = match published.as_ref().and_then(scalar_to_string) {
                    Some(p) if p.contains('-') => {
                        warn!("Skipping port range {} in {}", raw, field);
                        return Ok(None);
                    }
                    Some(p) => Some(parse_port(field, &p)?),
                    None => None,
                };
                Ok(Some(Self {
                    host_ip: None,
                    published,
                    container: validate_port(field, *target)?,
                    protocol: protocol.clone(),
                    raw,
                }))
            }
            PortEntry::Short(short) => Self::parse_short(short, field),
        }
    }

    fn parse_short(short: &str, field: &str) -> DtlResult<Option<Self>> {
        let (ports, protocol) = match short.split_once('/') {
            Some((ports, protocol)) => (ports, Some(protocol.to_string())),
            None => (short, None),
        };

        if ports.contains('-') {
            warn!("Skipping port range {} in {}", short, field);
            return Ok(None);
        }

        // From the right: container, published, then the host ip (which may itself contain ':')
        let mut parts = ports.rsplitn(3, ':');
        let container = parts
            .next()
            .ok_or_else(|| DtlError::validation(field, "empty port entry"))?;
        let published = parts.next().filter(|p| !p.is_empty());
        let host_ip = parts
            .next()
            .map(|ip| ip.trim_start_matches('[').trim_end_matches(']').to_string());

        Ok(Some(Self {
            host_ip,
            published: published.map(|p| parse_port(field, p)).transpose()?,
            container: parse_port(field, container)?,
            protocol,
            raw: short.to_string(),
        }))
    }

    /// The entry as written in the compose file
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpScheme {
    Http,
    Https,
}

impl fmt::Display for HttpScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

/// A path on the application's domain forwarded to a service port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRoute {
    pub scheme: HttpScheme,
    pub path: String,
    pub service: String,
    pub port: u16,
    pub target_path: String,
}

impl HttpRoute {
    /// `scheme://service.package.lzcapp:port/targetPath`
    pub fn target(&self, package: &str) -> String {
        format!(
            "{}://{}.{}.lzcapp:{}{}",
            self.scheme, self.service, package, self.port, self.target_path
        )
    }

    /// The `path=target` form used in the manifest
    pub fn entry(&self, package: &str) -> String {
        format!("{}={}", self.path, self.target(package))
    }
}

/// A raw TCP/UDP exposure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: IngressProtocol,
    pub port: u16,
    pub service: String,
}

/// A typed route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSpec {
    Http(HttpRoute),
    Ingress(IngressRule),
}

/// Normalised routes, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    pub routes: Vec<String>,
    pub ingress: Vec<IngressRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, route: &RouteSpec, package: &str) {
        match route {
            RouteSpec::Http(http) => self.routes.push(http.entry(package)),
            RouteSpec::Ingress(rule) => self.ingress.push(rule.clone()),
        }
    }

    pub fn extend<'r>(&mut self, routes: impl IntoIterator<Item = &'r RouteSpec>, package: &str) {
        for route in routes {
            self.push(route, package);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.ingress.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawRoute {
    Http(RawHttpRoute),
    Https(RawHttpRoute),
    Ingress(RawIngressRule),
}

#[derive(Debug, Deserialize)]
struct RawHttpRoute {
    #[serde(default)]
    path: Option<String>,
    service: String,
    port: u64,
    #[serde(default)]
    target_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIngressRule {
    protocol: IngressProtocol,
    port: u64,
    service: String,
}

/// Parse a JSON route list given on the command line.
///
/// Ports are checked against 1-65535 and every route must name a service
/// of the project.
pub fn parse_manual(json: &str, services: &[String]) -> DtlResult<Vec<RouteSpec>> {
    let raw: Vec<RawRoute> = serde_json::from_str(json)
        .map_err(|e| DtlError::validation("--routes", e.to_string()))?;

    raw.into_iter()
        .enumerate()
        .map(|(i, route)| {
            let field = format!("--routes[{i}]");
            let (scheme, http) = match route {
                RawRoute::Http(http) => (HttpScheme::Http, http),
                RawRoute::Https(http) => (HttpScheme::Https, http),
                RawRoute::Ingress(rule) => {
                    check_service(&field, &rule.service, services)?;
                    return Ok(RouteSpec::Ingress(IngressRule {
                        protocol: rule.protocol,
                        port: validate_port(&format!("{field}.port"), rule.port)?,
                        service: rule.service,
                    }));
                }
            };

            check_service(&field, &http.service, services)?;
            Ok(RouteSpec::Http(HttpRoute {
                scheme,
                path: route_path(http.path.as_deref()),
                port: validate_port(&format!("{field}.port"), http.port)?,
                service: http.service,
                target_path: route_path(http.target_path.as_deref()),
            }))
        })
        .collect()
}

fn check_service(field: &str, service: &str, services: &[String]) -> DtlResult<()> {
    if services.iter().any(|s| s == service) {
        Ok(())
    } else {
        Err(DtlError::validation(
            format!("{field}.service"),
            format!("no service named '{service}'"),
        ))
    }
}

/// Route paths always start with `/`; empty means the root
fn route_path(path: Option<&str>) -> String {
    match path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) if p.starts_with('/') => p.to_string(),
        Some(p) => format!("/{p}"),
        None => "/".to_string(),
    }
}

/// First published port of `service` without a cached decision
pub fn undecided_port(
    service: &ComposeService,
    cache: &SelectionCache,
) -> DtlResult<Option<PortMapping>> {
    for (i, entry) in service.ports.iter().enumerate() {
        let field = format!("services.{}.ports[{}]", service.name, i);
        let Some(mapping) = PortMapping::parse(entry, &field)? else {
            continue;
        };
        let key = CacheKey::port(&service.name, mapping.raw());
        if cache.get_as::<PortDecision>(&key).is_none() {
            return Ok(Some(mapping));
        }
    }
    Ok(None)
}

/// Derives routes from published ports
pub struct RouteModel<'a> {
    prompter: &'a dyn Prompter,
}

impl<'a> RouteModel<'a> {
    pub fn new(prompter: &'a dyn Prompter) -> Self {
        Self { prompter }
    }

    /// Decide every published port of `service`, in declaration order
    pub async fn derive(
        &self,
        service: &ComposeService,
        mut cache: SelectionCache,
    ) -> DtlResult<(Vec<RouteSpec>, SelectionCache)> {
        let mut routes = Vec::new();

        for (i, entry) in service.ports.iter().enumerate() {
            let field = format!("services.{}.ports[{}]", service.name, i);
            let Some(mapping) = PortMapping::parse(entry, &field)? else {
                continue;
            };

            let key = CacheKey::port(&service.name, mapping.raw());
            let decision = match cache.get_as::<PortDecision>(&key) {
                Some(decision) => {
                    debug!("Port {} of {} answered from cache", mapping, service.name);
                    decision
                }
                None => {
                    let decision = self.ask(&service.name, &mapping).await?;
                    cache = cache.record(&key, &decision);
                    decision
                }
            };

            if let PortDecision::Routed { route } = decision {
                routes.push(to_route_spec(&service.name, &mapping, route));
            }
        }

        Ok((routes, cache))
    }

    async fn ask(&self, service: &str, mapping: &PortMapping) -> DtlResult<PortDecision> {
        if !self.prompter.accept_port(service, mapping).await? {
            return Ok(PortDecision::Rejected);
        }
        let route = match self.prompter.port_route(service, mapping).await? {
            PortRoute::Http { path } => PortRoute::Http {
                path: route_path(Some(&path)),
            },
            PortRoute::Https { path } => PortRoute::Https {
                path: route_path(Some(&path)),
            },
            ingress => ingress,
        };
        Ok(PortDecision::Routed { route })
    }
}

/// Routes target the container side of the mapping
fn to_route_spec(service: &str, mapping: &PortMapping, route: PortRoute) -> RouteSpec {
    let http = |scheme, path| {
        RouteSpec::Http(HttpRoute {
            scheme,
            path,
            service: service.to_string(),
            port: mapping.container,
            target_path: "/".to_string(),
        })
    };
    match route {
        PortRoute::Http { path } => http(HttpScheme::Http, path),
        PortRoute::Https { path } => http(HttpScheme::Https, path),
        PortRoute::Ingress { protocol } => RouteSpec::Ingress(IngressRule {
            protocol,
            port: mapping.container,
            service: service.to_string(),
        }),
    }
}
