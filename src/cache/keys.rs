//! Stable composite keys for cached decisions

use std::fmt;

/// Location of one decision inside the cache document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    section: &'static str,
    id: String,
}

impl CacheKey {
    fn new(section: &'static str, id: impl Into<String>) -> Self {
        Self {
            section,
            id: id.into(),
        }
    }

    /// Volume decision for a service mount. The source only takes part
    /// in the key when the mount has one, so anonymous volumes stay keyed
    /// by target alone.
    pub fn volume(service: &str, source: Option<&str>, target: &str) -> Self {
        match source {
            Some(source) => Self::new("volumes", format!("{service}:{source}:{target}")),
            None => Self::new("volumes", format!("{service}:{target}")),
        }
    }

    /// Accept/route decision for one published port of a service
    pub fn port(service: &str, mapping: &str) -> Self {
        Self::new("ports", format!("{service}:{mapping}"))
    }

    /// Whether a service's existing image should be pushed to the registry
    pub fn push(service: &str) -> Self {
        Self::new("push", service)
    }

    /// Destination tag for a retagged image, keyed by the original name
    pub fn image(image: &str) -> Self {
        Self::new("images", image)
    }

    /// Destination tag for a service built from source
    pub fn build(service: &str) -> Self {
        Self::new("builds", service)
    }

    /// Registry chosen for this project
    pub fn registry() -> Self {
        Self::new("settings", "registry")
    }

    /// Application-level answer (name, package, ...)
    pub fn answer(field: &str) -> Self {
        Self::new("application", field)
    }

    pub fn section(&self) -> &'static str {
        self.section
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.id)
    }
}
