//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{ConfigManager, GlobalConfig};
use crate::error::{DtlError, DtlResult};
use crate::ui::{self, UiContext};

const VALID_KEYS: &[&str] = &[
    "registry",
    "container_cli",
    "platform",
    "timeouts.build_secs",
    "timeouts.pull_secs",
    "timeouts.push_secs",
];

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager) -> DtlResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(manager).await?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Set { key, value }) => {
            let mut config = manager.load().await?;
            set_value(&mut config, &key, &value)?;
            manager.save(&config).await?;
            ui::step_ok(&UiContext::detect(), &format!("Set {} = {}", key, value));
        }
        Some(ConfigAction::Unset { key }) => {
            let mut config = manager.load().await?;
            unset_value(&mut config, &key)?;
            manager.save(&config).await?;
            ui::step_ok(&UiContext::detect(), &format!("Unset {}", key));
        }
    }

    Ok(())
}

async fn show_config(manager: &ConfigManager) -> DtlResult<()> {
    let config = manager.load().await?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn unknown_key(key: &str) -> DtlError {
    DtlError::User(format!(
        "Unknown config key: {} (valid keys: {})",
        key,
        VALID_KEYS.join(", ")
    ))
}

fn set_value(config: &mut GlobalConfig, key: &str, value: &str) -> DtlResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["registry"] => config.registry = Some(non_empty(key, value)?.trim_end_matches('/').to_string()),
        ["container_cli"] => config.container_cli = non_empty(key, value)?.to_string(),
        ["platform"] => config.platform = Some(non_empty(key, value)?.to_string()),
        ["timeouts", "build_secs"] => config.timeouts.build_secs = parse_secs(key, value)?,
        ["timeouts", "pull_secs"] => config.timeouts.pull_secs = parse_secs(key, value)?,
        ["timeouts", "push_secs"] => config.timeouts.push_secs = parse_secs(key, value)?,
        _ => return Err(unknown_key(key)),
    }

    Ok(())
}

fn unset_value(config: &mut GlobalConfig, key: &str) -> DtlResult<()> {
    match key {
        "registry" => config.registry = None,
        "platform" => config.platform = None,
        _ if VALID_KEYS.contains(&key) => {
            return Err(DtlError::User(format!(
                "{} always has a value; use `config set` instead",
                key
            )))
        }
        _ => return Err(unknown_key(key)),
    }
    Ok(())
}

fn non_empty<'v>(key: &str, value: &'v str) -> DtlResult<&'v str> {
    let value = value.trim();
    if value.is_empty() {
        Err(DtlError::validation(key, "must not be empty"))
    } else {
        Ok(value)
    }
}

fn parse_secs(key: &str, value: &str) -> DtlResult<u64> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(DtlError::validation(
            key,
            format!("'{}' is not a positive number of seconds", value),
        )),
    }
}
