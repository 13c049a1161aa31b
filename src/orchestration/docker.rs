//! Docker-compatible CLI executor
//!
//! Shells out to `docker` (or any CLI with the same `pull`/`tag`/`push`/
//! `build` surface, such as podman). Every command runs under the timeout
//! configured for its kind and is killed when the run is cancelled.

use crate::config::TimeoutConfig;
use crate::error::{DtlError, DtlResult};
use crate::orchestration::cancel::cancelled;
use crate::orchestration::executor::{BuildRequest, ImageExecutor};
use crate::orchestration::{build_error_output, stream_child_output};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info};

/// Executor backed by a docker-compatible command line
pub struct DockerExecutor {
    cli: String,
    platform: Option<String>,
    timeouts: TimeoutConfig,
    cancel: watch::Receiver<bool>,
}

impl DockerExecutor {
    pub fn new(
        cli: impl Into<String>,
        platform: Option<String>,
        timeouts: TimeoutConfig,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cli: cli.into(),
            platform,
            timeouts,
            cancel,
        }
    }

    fn platform_args(&self) -> Vec<String> {
        match self.platform {
            Some(ref platform) => vec!["--platform".to_string(), platform.clone()],
            None => Vec::new(),
        }
    }

    /// Run one command to completion, streaming its output
    async fn exec(
        &self,
        args: Vec<String>,
        secs: u64,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DtlResult<()> {
        let command = format!("{} {}", self.cli, args.join(" "));
        let mut cancel = self.cancel.clone();
        if *cancel.borrow_and_update() {
            return Err(DtlError::Cancelled { command });
        }

        debug!("Executing: {}", command);
        let mut child = Command::new(&self.cli)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DtlError::command_failed(&command, e))?;

        let run = async {
            let output = stream_child_output(&mut child, on_output).await?;
            let status = child
                .wait()
                .await
                .map_err(|e| DtlError::command_failed(&command, e))?;
            Ok::<_, DtlError>((status, output))
        };

        let outcome = tokio::select! {
            outcome = tokio::time::timeout(Duration::from_secs(secs), run) => outcome,
            _ = cancelled(&mut cancel) => {
                return Err(DtlError::Cancelled { command: command.clone() });
            }
        };

        // Dropping `child` here kills it if it is still running
        let (status, output) = match outcome {
            Ok(result) => result?,
            Err(_) => return Err(DtlError::ProcessTimeout { command, secs }),
        };

        if status.success() {
            Ok(())
        } else {
            Err(DtlError::ExternalProcess {
                command,
                code: status.code(),
                output: build_error_output(&output),
            })
        }
    }
}

#[async_trait]
impl ImageExecutor for DockerExecutor {
    async fn pull(&self, image: &str, on_output: &(dyn Fn(String) + Send + Sync)) -> DtlResult<()> {
        info!("Pulling image: {}", image);
        let mut args = vec!["pull".to_string()];
        args.extend(self.platform_args());
        args.push(image.to_string());
        self.exec(args, self.timeouts.pull_secs, on_output).await
    }

    async fn tag(&self, source: &str, target: &str) -> DtlResult<()> {
        debug!("Tagging {} as {}", source, target);
        let args = vec!["tag".to_string(), source.to_string(), target.to_string()];
        self.exec(args, self.timeouts.pull_secs, &|_: String| {}).await
    }

    async fn push(&self, image: &str, on_output: &(dyn Fn(String) + Send + Sync)) -> DtlResult<()> {
        info!("Pushing image: {}", image);
        let args = vec!["push".to_string(), image.to_string()];
        self.exec(args, self.timeouts.push_secs, on_output).await
    }

    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DtlResult<()> {
        info!("Building image: {}", request.tag);
        let mut args = vec![
            "build".to_string(),
            "--progress=plain".to_string(),
            "-t".to_string(),
            request.tag.clone(),
        ];
        if let Some(ref dockerfile) = request.dockerfile {
            args.push("-f".to_string());
            args.push(dockerfile.display().to_string());
        }
        args.extend(self.platform_args());
        args.push(request.context.display().to_string());
        self.exec(args, self.timeouts.build_secs, on_output).await
    }

    fn executor_name(&self) -> &str {
        &self.cli
    }
}
