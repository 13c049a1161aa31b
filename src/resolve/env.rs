//! `${VAR}` / `${VAR:-default}` interpolation
//!
//! Lookup order for each token, first hit wins:
//! 1. the owning service's `env_file`
//! 2. the project `.env` beside the compose file
//! 3. the process environment (snapshotted once per run)
//! 4. the inline default
//! 5. empty string
//!
//! For `${VAR:-default}` a variable that is defined but empty falls
//! through to the default, as compose does. `$$` produces a literal `$`.

use crate::compose::env_file::EnvMap;
use std::collections::HashMap;

/// Snapshot of every variable source visible to one service
#[derive(Debug, Clone, Copy)]
pub struct EnvSources<'a> {
    pub service_file: Option<&'a EnvMap>,
    pub project_file: &'a EnvMap,
    pub process: &'a HashMap<String, String>,
}

impl<'a> EnvSources<'a> {
    pub fn new(project_file: &'a EnvMap, process: &'a HashMap<String, String>) -> Self {
        Self {
            service_file: None,
            project_file,
            process,
        }
    }

    /// Same sources with a service-level env file on top
    pub fn with_service_file(self, service_file: &'a EnvMap) -> Self {
        Self {
            service_file: Some(service_file),
            ..self
        }
    }

    /// Look a variable up through the layers
    pub fn lookup(&self, name: &str) -> Option<&'a str> {
        self.service_file
            .and_then(|vars| vars.get(name))
            .or_else(|| self.project_file.get(name))
            .or_else(|| self.process.get(name))
            .map(String::as_str)
    }
}

/// Expand every `${...}` token in `value`.
///
/// Pure: the same input against the same sources always gives the same
/// output. Text that is not a well-formed token is copied unchanged.
pub fn resolve(value: &str, sources: &EnvSources<'_>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("$$") {
            out.push('$');
            rest = after;
            continue;
        }

        let Some(body_start) = tail.strip_prefix("${") else {
            out.push('$');
            rest = &tail[1..];
            continue;
        };

        let Some(end) = body_start.find('}') else {
            // Unterminated token, keep the remainder as written
            out.push_str(tail);
            rest = "";
            break;
        };

        out.push_str(&expand_token(&body_start[..end], sources));
        rest = &body_start[end + 1..];
    }

    out.push_str(rest);
    out
}

fn expand_token(body: &str, sources: &EnvSources<'_>) -> String {
    match body.split_once(":-") {
        Some((name, default)) => match sources.lookup(name.trim()) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => default.to_string(),
        },
        None => sources
            .lookup(body.trim())
            .map(str::to_string)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn process(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        let project = EnvMap::new();
        let proc_env = HashMap::new();
        let sources = EnvSources::new(&project, &proc_env);
        assert_eq!(resolve("plain/text:80", &sources), "plain/text:80");
    }

    #[test]
    fn default_used_when_unset_everywhere() {
        let project = EnvMap::new();
        let proc_env = HashMap::new();
        let sources = EnvSources::new(&project, &proc_env);
        assert_eq!(resolve("${TAG:-1.2}", &sources), "1.2");
        assert_eq!(resolve("${TAG}", &sources), "");
    }

    #[test]
    fn service_file_beats_process_env() {
        let service = env(&[("TAG", "from-service")]);
        let project = env(&[("TAG", "from-project")]);
        let proc_env = process(&[("TAG", "from-process")]);

        let sources = EnvSources::new(&project, &proc_env).with_service_file(&service);
        assert_eq!(resolve("redis:${TAG:-x}", &sources), "redis:from-service");
    }

    #[test]
    fn project_file_beats_process_env() {
        let project = env(&[("TAG", "from-project")]);
        let proc_env = process(&[("TAG", "from-process")]);
        let sources = EnvSources::new(&project, &proc_env);
        assert_eq!(resolve("${TAG}", &sources), "from-project");
    }

    #[test]
    fn process_env_beats_default() {
        let project = EnvMap::new();
        let proc_env = process(&[("TAG", "from-process")]);
        let sources = EnvSources::new(&project, &proc_env);
        assert_eq!(resolve("${TAG:-fallback}", &sources), "from-process");
    }

    #[test]
    fn empty_value_falls_back_to_default() {
        let project = env(&[("TAG", "")]);
        let proc_env = process(&[("TAG", "from-process")]);
        let sources = EnvSources::new(&project, &proc_env);
        assert_eq!(resolve("${TAG:-fallback}", &sources), "fallback");
        assert_eq!(resolve("${TAG}", &sources), "");
    }

    #[test]
    fn multiple_tokens_and_escapes() {
        let project = env(&[("HOST", "db"), ("PORT", "5432")]);
        let proc_env = HashMap::new();
        let sources = EnvSources::new(&project, &proc_env);
        assert_eq!(
            resolve("postgres://${HOST}:${PORT}/app?cost=$$5&x=$y", &sources),
            "postgres://db:5432/app?cost=$5&x=$y"
        );
    }

    #[test]
    fn unterminated_token_is_literal() {
        let project = EnvMap::new();
        let proc_env = HashMap::new();
        let sources = EnvSources::new(&project, &proc_env);
        assert_eq!(resolve("a${B", &sources), "a${B");
    }

    #[test]
    fn default_may_contain_colons() {
        let project = EnvMap::new();
        let proc_env = HashMap::new();
        let sources = EnvSources::new(&project, &proc_env);
        assert_eq!(
            resolve("${DATA:-./data}:/var/lib/data", &sources),
            "./data:/var/lib/data"
        );
    }
}
