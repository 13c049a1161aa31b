//! Application-level answers
//!
//! Name, package, version and the platform feature flags of the
//! generated application. Each answer comes from its command-line flag,
//! else from the cache of a previous run, else from the prompter; the
//! final answers are written back to the cache.

use crate::cache::{CacheKey, SelectionCache};
use crate::error::{DtlError, DtlResult};
use crate::resolve::image::package_base_name;
use crate::resolve::prompt::Prompter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Version used when none is given
pub const DEFAULT_VERSION: &str = "0.0.1";

/// Files the application registers to open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandler {
    pub mime: Vec<String>,
    pub extensions: Vec<String>,
    /// URL path opened with the file
    pub open: String,
}

/// Everything about the application that is not derived from services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppAnswers {
    pub name: String,
    pub package: String,
    pub version: String,
    pub description: String,
    pub homepage: String,
    pub author: String,
    pub subdomain: String,
    pub background_task: bool,
    pub multi_instance: bool,
    pub gpu_accel: bool,
    pub kvm_accel: bool,
    pub usb_accel: bool,
    pub public_path: Vec<String>,
    pub file_handler: Option<FileHandler>,
}

/// Answers given on the command line
#[derive(Debug, Clone, Default)]
pub struct AnswerFlags {
    pub name: Option<String>,
    pub package: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub author: Option<String>,
    pub subdomain: Option<String>,
    pub background_task: Option<bool>,
    pub multi_instance: Option<bool>,
    pub gpu_accel: Option<bool>,
    pub kvm_accel: Option<bool>,
    pub usb_accel: Option<bool>,
    /// Comma separated
    pub public_paths: Option<String>,
    pub mime: Vec<String>,
    pub extensions: Vec<String>,
    pub open_action: Option<String>,
}

/// Answers a non-interactive run cannot do without
const REQUIRED: &[(&str, &str)] = &[
    ("name", "--name"),
    ("package", "--package"),
    ("background_task", "--background-task"),
    ("multi_instance", "--multi-instance"),
];

/// Check that a non-interactive run has every required answer, before
/// any resolution work starts
pub fn check_required(flags: &AnswerFlags, cache: &SelectionCache) -> DtlResult<()> {
    let given = |field: &str| match field {
        "name" => flags.name.is_some(),
        "package" => flags.package.is_some(),
        "background_task" => flags.background_task.is_some(),
        "multi_instance" => flags.multi_instance.is_some(),
        _ => false,
    };

    let missing: Vec<&str> = REQUIRED
        .iter()
        .filter(|(field, _)| !given(field) && cache.get(&CacheKey::answer(field)).is_none())
        .map(|(_, flag)| *flag)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DtlError::Configuration(missing.join(", ")))
    }
}

/// Collect the application answers
pub async fn gather(
    flags: &AnswerFlags,
    cache: SelectionCache,
    prompter: &dyn Prompter,
) -> DtlResult<(AppAnswers, SelectionCache)> {
    if !prompter.is_interactive() {
        check_required(flags, &cache)?;
    }

    let mut asker = Asker { cache, prompter };

    let name = asker
        .text("name", &flags.name, "Application name", None)
        .await?;
    require_non_empty("name", &name)?;

    let package = asker
        .text("package", &flags.package, "Package name (e.g. cloud.lazycat.app.demo)", None)
        .await?;
    validate_package(&package)?;

    let version = asker
        .text("version", &flags.version, "Version", Some(DEFAULT_VERSION))
        .await?;
    semver::Version::parse(&version)
        .map_err(|e| DtlError::validation("version", format!("'{version}' is not semver: {e}")))?;

    let description = asker
        .text("description", &flags.description, "Description", Some(""))
        .await?;
    let homepage = asker
        .text("homepage", &flags.homepage, "Homepage", Some(""))
        .await?;
    let author = asker
        .text("author", &flags.author, "Author", Some(""))
        .await?;
    let subdomain = asker
        .text(
            "subdomain",
            &flags.subdomain,
            "Subdomain",
            Some(package_base_name(&package)),
        )
        .await?;
    require_non_empty("subdomain", &subdomain)?;

    let background_task = asker
        .confirm("background_task", flags.background_task, "Start on boot?")
        .await?;
    let multi_instance = asker
        .confirm("multi_instance", flags.multi_instance, "One instance per user?")
        .await?;

    let gpu_accel = asker.flag("gpu_accel", flags.gpu_accel);
    let kvm_accel = asker.flag("kvm_accel", flags.kvm_accel);
    let usb_accel = asker.flag("usb_accel", flags.usb_accel);

    let public_paths = asker
        .text(
            "public_path",
            &flags.public_paths,
            "Paths reachable without login (comma separated)",
            Some("/"),
        )
        .await?;
    let public_path = parse_public_paths(&public_paths)?;

    let file_handler = asker.file_handler(flags)?;

    let answers = AppAnswers {
        name,
        package,
        version,
        description,
        homepage,
        author,
        subdomain,
        background_task,
        multi_instance,
        gpu_accel,
        kvm_accel,
        usb_accel,
        public_path,
        file_handler,
    };
    Ok((answers, asker.cache))
}

struct Asker<'a> {
    cache: SelectionCache,
    prompter: &'a dyn Prompter,
}

impl Asker<'_> {
    fn cached<T: DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.cache.get_as(&CacheKey::answer(field))
    }

    fn remember<T: Serialize>(&mut self, field: &str, value: &T) {
        let cache = std::mem::take(&mut self.cache);
        self.cache = cache.record(&CacheKey::answer(field), value);
    }

    async fn text(
        &mut self,
        field: &str,
        flag: &Option<String>,
        prompt: &str,
        default: Option<&str>,
    ) -> DtlResult<String> {
        let value = match (flag, self.cached::<String>(field)) {
            (Some(value), _) => value.clone(),
            (None, Some(cached)) => return Ok(cached),
            (None, None) => self.prompter.text(field, prompt, default).await?,
        };
        let value = value.trim().to_string();
        self.remember(field, &value);
        Ok(value)
    }

    async fn confirm(&mut self, field: &str, flag: Option<bool>, prompt: &str) -> DtlResult<bool> {
        let value = match (flag, self.cached::<bool>(field)) {
            (Some(value), _) => value,
            (None, Some(cached)) => return Ok(cached),
            (None, None) => self.prompter.confirm(field, prompt, false).await?,
        };
        self.remember(field, &value);
        Ok(value)
    }

    /// Feature flags are never prompted for
    fn flag(&mut self, field: &str, flag: Option<bool>) -> bool {
        match flag {
            Some(value) => {
                self.remember(field, &value);
                value
            }
            None => self.cached(field).unwrap_or(false),
        }
    }

    fn file_handler(&mut self, flags: &AnswerFlags) -> DtlResult<Option<FileHandler>> {
        if flags.mime.is_empty() && flags.extensions.is_empty() && flags.open_action.is_none() {
            return Ok(self.cached("file_handler"));
        }

        let open = flags.open_action.clone().ok_or_else(|| {
            DtlError::validation("--open-action", "required with --mime or --extension")
        })?;
        if flags.mime.is_empty() && flags.extensions.is_empty() {
            return Err(DtlError::validation(
                "--open-action",
                "needs at least one --mime or --extension",
            ));
        }

        let handler = FileHandler {
            mime: flags.mime.clone(),
            extensions: flags.extensions.clone(),
            open,
        };
        self.remember("file_handler", &handler);
        Ok(Some(handler))
    }
}

fn require_non_empty(field: &str, value: &str) -> DtlResult<()> {
    if value.is_empty() {
        Err(DtlError::validation(field, "must not be empty"))
    } else {
        Ok(())
    }
}

fn validate_package(package: &str) -> DtlResult<()> {
    require_non_empty("package", package)?;
    let valid = package
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !valid || package.starts_with('.') || package.ends_with('.') {
        return Err(DtlError::validation(
            "package",
            format!("'{package}' may only contain letters, digits, '.', '-' and '_'"),
        ));
    }
    Ok(())
}

fn parse_public_paths(raw: &str) -> DtlResult<Vec<String>> {
    let paths: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    if paths.is_empty() {
        return Ok(vec!["/".to_string()]);
    }
    if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
        return Err(DtlError::validation(
            "public_path",
            format!("'{bad}' must start with '/'"),
        ));
    }
    Ok(paths)
}
