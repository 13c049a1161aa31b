//! Blocking cliclack prompts run off the async runtime

use crate::error::{DtlError, DtlResult};

/// Input check: `Err` carries the message shown under the field
pub type Validator = fn(&str) -> Result<(), String>;

fn prompt_error(e: std::io::Error) -> DtlError {
    if e.kind() == std::io::ErrorKind::Interrupted {
        DtlError::Prompt("cancelled by user".to_string())
    } else {
        DtlError::Prompt(e.to_string())
    }
}

async fn blocking<T, F>(f: F) -> DtlResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DtlError::Prompt(format!("prompt task failed: {}", e)))?
        .map_err(prompt_error)
}

/// Ask a yes/no question
pub async fn confirm(message: &str, default: bool) -> DtlResult<bool> {
    let message = message.to_string();
    blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
}

/// Ask for one of `options`, given as `(value, label, hint)`
pub async fn select<T>(message: &str, options: Vec<(T, String, String)>, initial: Option<T>) -> DtlResult<T>
where
    T: Clone + Eq + Send + 'static,
{
    if options.is_empty() {
        return Err(DtlError::Internal(format!("nothing to select for '{}'", message)));
    }

    let message = message.to_string();
    blocking(move || {
        let mut select = cliclack::select(&message);
        for (value, label, hint) in options {
            select = select.item(value, label, hint);
        }
        if let Some(initial) = initial {
            select = select.initial_value(initial);
        }
        select.interact()
    })
    .await
}

/// Ask for a line of text. With a default, an empty answer is allowed
/// and the default is pre-filled.
pub async fn input(message: &str, default: Option<&str>, validator: Option<Validator>) -> DtlResult<String> {
    let message = message.to_string();
    let default = default.map(str::to_string);
    blocking(move || {
        let mut input = cliclack::input(&message);
        if let Some(ref default) = default {
            input = input.default_input(default).required(false);
        }
        if let Some(check) = validator {
            input = input.validate(move |value: &String| check(value));
        }
        input.interact::<String>()
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_prompt_is_a_cancellation() {
        let err = prompt_error(std::io::Error::new(std::io::ErrorKind::Interrupted, "ctrl-c"));
        assert_eq!(err.to_string(), "Prompt failed: cancelled by user");
    }

    #[tokio::test]
    async fn select_without_options_fails() {
        let err = select::<u8>("Pick", vec![], None).await.unwrap_err();
        assert!(matches!(err, DtlError::Internal(_)));
    }
}
