//! `.env` file parsing
//!
//! Supports the subset of dotenv syntax compose files use in practice:
//! `KEY=value`, optional `export ` prefix, `#` comments, single-quoted
//! (literal) and double-quoted (escape-aware) values.

use crate::error::{DtlError, DtlResult};
use indexmap::IndexMap;
use std::path::Path;

/// Ordered variables read from an env file
pub type EnvMap = IndexMap<String, String>;

/// Read and parse an env file. A missing file is an error; callers that
/// treat the file as optional check for existence first.
pub async fn read_env_file(path: &Path) -> DtlResult<EnvMap> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DtlError::io(format!("reading env file {}", path.display()), e))?;
    Ok(parse_env(&content))
}

/// Parse env file content. Malformed lines are skipped.
pub fn parse_env(content: &str) -> EnvMap {
    let mut vars = EnvMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            continue;
        }

        vars.insert(key.to_string(), parse_value(value.trim()));
    }

    vars
}

fn parse_value(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        return inner.to_string();
    }
    if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        return unescape_double_quoted(inner);
    }

    // Unquoted: a " #" starts a trailing comment
    match raw.find(" #") {
        Some(pos) => raw[..pos].trim_end().to_string(),
        None => raw.to_string(),
    }
}

fn unescape_double_quoted(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pairs_and_comments() {
        let vars = parse_env("# comment\nFOO=bar\n\nBAZ = qux\n");
        assert_eq!(vars.get("FOO").unwrap(), "bar");
        assert_eq!(vars.get("BAZ").unwrap(), "qux");
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn strips_export_prefix() {
        let vars = parse_env("export TOKEN=abc");
        assert_eq!(vars.get("TOKEN").unwrap(), "abc");
    }

    #[test]
    fn handles_quotes() {
        let vars = parse_env("A='lit ${X} \\n'\nB=\"line\\nnext\"\nC=\"say \\\"hi\\\"\"");
        assert_eq!(vars.get("A").unwrap(), "lit ${X} \\n");
        assert_eq!(vars.get("B").unwrap(), "line\nnext");
        assert_eq!(vars.get("C").unwrap(), "say \"hi\"");
    }

    #[test]
    fn trailing_comment_on_unquoted_value() {
        let vars = parse_env("PORT=8080 # web port\nHASH=a#b");
        assert_eq!(vars.get("PORT").unwrap(), "8080");
        assert_eq!(vars.get("HASH").unwrap(), "a#b");
    }

    #[test]
    fn empty_value_is_kept() {
        let vars = parse_env("EMPTY=");
        assert_eq!(vars.get("EMPTY").unwrap(), "");
    }

    #[test]
    fn skips_malformed_lines() {
        let vars = parse_env("NOEQUALS\n=value\nBAD KEY=x\nOK=1");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("OK").unwrap(), "1");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(read_env_file(&temp.path().join("nope.env")).await.is_err());
    }
}
