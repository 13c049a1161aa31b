//! Test doubles for the resolver seams

use crate::compose::VolumeSpec;
use crate::error::{DtlError, DtlResult};
use crate::orchestration::{BuildRequest, ImageExecutor};
use crate::resolve::prompt::{EmptyDirLocation, PortRoute, Prompter, RegistryAnswer, VolumeAction};
use crate::resolve::route::PortMapping;
use crate::resolve::volume::PathProbe;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One queued answer for [`ScriptedPrompter`]
#[derive(Debug, Clone)]
pub enum Answer {
    Volume(VolumeAction),
    Location(EmptyDirLocation),
    Accept(bool),
    Route(PortRoute),
    Push(bool),
    Registry(RegistryAnswer),
    Text(String),
    Confirm(bool),
    Select(String),
}

/// Replays queued answers in order and counts how many were asked for.
///
/// Asking for a decision of the wrong kind, or with the queue empty,
/// fails the resolver with an internal error.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Answer>>,
    asked: AtomicUsize,
    interactive: bool,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            asked: AtomicUsize::new(0),
            interactive: true,
        }
    }

    pub fn non_interactive(answers: Vec<Answer>) -> Self {
        Self {
            interactive: false,
            ..Self::new(answers)
        }
    }

    /// Number of decisions requested so far
    pub fn prompt_count(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }

    fn next(&self, what: &str) -> DtlResult<Answer> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DtlError::Internal(format!("no scripted answer for {what}")))
    }
}

fn unexpected(what: &str, got: Answer) -> DtlError {
    DtlError::Internal(format!("asked for {what}, next scripted answer is {got:?}"))
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    async fn volume_action(
        &self,
        _service: &str,
        _volume: &VolumeSpec,
        _options: &[VolumeAction],
    ) -> DtlResult<VolumeAction> {
        match self.next("volume action")? {
            Answer::Volume(action) => Ok(action),
            other => Err(unexpected("volume action", other)),
        }
    }

    async fn empty_dir_location(
        &self,
        _service: &str,
        _target: &str,
    ) -> DtlResult<EmptyDirLocation> {
        match self.next("empty dir location")? {
            Answer::Location(location) => Ok(location),
            other => Err(unexpected("empty dir location", other)),
        }
    }

    async fn accept_port(&self, _service: &str, _port: &PortMapping) -> DtlResult<bool> {
        match self.next("port acceptance")? {
            Answer::Accept(accept) => Ok(accept),
            other => Err(unexpected("port acceptance", other)),
        }
    }

    async fn port_route(&self, _service: &str, _port: &PortMapping) -> DtlResult<PortRoute> {
        match self.next("port route")? {
            Answer::Route(route) => Ok(route),
            other => Err(unexpected("port route", other)),
        }
    }

    async fn push_image(&self, _service: &str, _image: &str) -> DtlResult<bool> {
        match self.next("push")? {
            Answer::Push(push) => Ok(push),
            other => Err(unexpected("push", other)),
        }
    }

    async fn registry(&self) -> DtlResult<RegistryAnswer> {
        match self.next("registry")? {
            Answer::Registry(answer) => Ok(answer),
            other => Err(unexpected("registry", other)),
        }
    }

    async fn text(&self, field: &str, _prompt: &str, _default: Option<&str>) -> DtlResult<String> {
        match self.next(field)? {
            Answer::Text(text) => Ok(text),
            other => Err(unexpected(field, other)),
        }
    }

    async fn confirm(&self, field: &str, _prompt: &str, _default: bool) -> DtlResult<bool> {
        match self.next(field)? {
            Answer::Confirm(yes) => Ok(yes),
            other => Err(unexpected(field, other)),
        }
    }

    async fn select_file(
        &self,
        field: &str,
        _prompt: &str,
        _choices: &[String],
    ) -> DtlResult<String> {
        match self.next(field)? {
            Answer::Select(choice) => Ok(choice),
            other => Err(unexpected(field, other)),
        }
    }
}

/// Records image operations instead of running them
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation named `op` (`pull`, `tag`, `push`, `build`)
    pub fn failing_on(op: &'static str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(op),
        }
    }

    /// Invocations so far, as `op args...`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, call: String) -> DtlResult<()> {
        self.calls.lock().unwrap().push(call.clone());
        if self.fail_on == Some(op) {
            return Err(DtlError::ExternalProcess {
                command: call,
                code: Some(1),
                output: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageExecutor for RecordingExecutor {
    async fn pull(
        &self,
        image: &str,
        _on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DtlResult<()> {
        self.record("pull", format!("pull {image}"))
    }

    async fn tag(&self, source: &str, target: &str) -> DtlResult<()> {
        self.record("tag", format!("tag {source} {target}"))
    }

    async fn push(
        &self,
        image: &str,
        _on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DtlResult<()> {
        self.record("push", format!("push {image}"))
    }

    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> DtlResult<()> {
        on_output(format!("building {}", request.tag));
        let mut call = format!("build {} {}", request.tag, request.context.display());
        if let Some(ref dockerfile) = request.dockerfile {
            call.push(' ');
            call.push_str(&dockerfile.display().to_string());
        }
        self.record("build", call)
    }

    fn executor_name(&self) -> &str {
        "recording"
    }
}

/// Fixed set of paths that exist
pub struct StaticProbe {
    existing: HashSet<PathBuf>,
}

impl StaticProbe {
    pub fn new(existing: &[&str]) -> Self {
        Self {
            existing: existing.iter().map(PathBuf::from).collect(),
        }
    }
}

impl PathProbe for StaticProbe {
    fn exists(&self, path: &Path) -> bool {
        self.existing.contains(path)
    }
}
