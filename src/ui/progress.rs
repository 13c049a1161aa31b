//! Progress indicators with CI fallback

use super::context::UiContext;
use crate::resolve::image::ImageProgress;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            println!("{} {}", style("✓").green(), message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else if self.interactive {
            println!("{} {}", style("✗").red(), message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

/// Progress of one image operation (pull, push or build).
///
/// Build output is parsed for steps, either BuildKit's plain progress
/// (`#5 [2/4] RUN ...`) or Podman's (`STEP 2/4: RUN ...`), and shown as
/// an indicatif bar in interactive mode, or plain text in CI.
pub struct ImageProgressBar {
    bar: Option<ProgressBar>,
}

impl ImageProgressBar {
    pub fn new(ctx: &UiContext, action: &str, label: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let template = if action == "Building" {
                "  {spinner:.blue} {prefix}  {bar:20.blue/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}"
            } else {
                "  {spinner:.blue} {prefix}  {msg:.dim}  {elapsed:.dim}"
            };
            let bar = ProgressBar::new(0);
            if let Ok(bar_style) = ProgressStyle::default_bar().template(template) {
                bar.set_style(
                    bar_style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .progress_chars("━╸─"),
                );
            }
            bar.set_prefix(format!("{} {}", action, label));
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("{} {}...", action, label);
            None
        };
        Self { bar }
    }

    /// Process one output line
    pub fn on_line(&self, line: String) {
        if let Some((n, total, instruction)) = parse_step_line(&line) {
            if let Some(ref bar) = self.bar {
                bar.set_length(total);
                bar.set_position(n);
                bar.set_message(instruction.to_string());
            } else {
                println!("  STEP {}/{}: {}", n, total, instruction);
            }
        } else if let Some(ref bar) = self.bar {
            let trimmed = line.trim();
            if !trimmed.is_empty() && !is_build_noise(trimmed) {
                bar.set_message(shorten(trimmed, 60));
            }
        }
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// [`ImageProgress`] shown in the terminal, one bar per operation
pub struct PipelineProgress {
    ctx: UiContext,
    current: Mutex<Option<ImageProgressBar>>,
}

impl PipelineProgress {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            ctx: ctx.clone(),
            current: Mutex::new(None),
        }
    }

    /// Clear any bar left by an operation that failed
    pub fn finish(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(bar) = current.take() {
                bar.finish();
            }
        }
    }
}

impl ImageProgress for PipelineProgress {
    fn begin(&self, service: &str, action: &str) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.take() {
                previous.finish();
            }
            *current = Some(ImageProgressBar::new(&self.ctx, action, service));
        }
    }

    fn line(&self, line: String) {
        if let Ok(current) = self.current.lock() {
            if let Some(ref bar) = *current {
                bar.on_line(line);
            }
        }
    }

    fn end(&self) {
        self.finish();
    }
}

fn shorten(line: &str, max: usize) -> String {
    if line.chars().count() > max {
        let head: String = line.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}

/// Filter out builder internals that aren't useful to display
fn is_build_noise(line: &str) -> bool {
    line.starts_with("--->")
        || line.starts_with("-->")
        || line.starts_with("Removing intermediate")
        || line.starts_with("COMMIT")
        || (line.starts_with('#') && (line.ends_with("DONE") || line.contains(" DONE ")))
}

/// Parse a build step line into `(step, total, instruction)`
fn parse_step_line(line: &str) -> Option<(u64, u64, &str)> {
    parse_podman_step(line).or_else(|| parse_buildkit_step(line))
}

/// `STEP N/M: INSTRUCTION args...`
fn parse_podman_step(line: &str) -> Option<(u64, u64, &str)> {
    let rest = line.strip_prefix("STEP ")?;
    let slash = rest.find('/')?;
    let colon = rest.find(':')?;
    if colon <= slash {
        return None;
    }
    let n: u64 = rest[..slash].parse().ok()?;
    let total: u64 = rest[slash + 1..colon].parse().ok()?;
    let instruction = rest[colon + 1..].trim();
    Some((n, total, instruction))
}

/// `#7 [stage N/M] INSTRUCTION args...`, the stage name being optional
fn parse_buildkit_step(line: &str) -> Option<(u64, u64, &str)> {
    let rest = line.strip_prefix('#')?;
    let (id, rest) = rest.split_once(' ')?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let rest = rest.strip_prefix('[')?;
    let (bracket, instruction) = rest.split_once(']')?;
    let (n, total) = bracket.rsplit(' ').next()?.split_once('/')?;
    let n: u64 = n.parse().ok()?;
    let total: u64 = total.parse().ok()?;
    Some((n, total, instruction.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Testing...");
        spinner.stop("Done");
    }

    #[test]
    fn parse_podman_step_line() {
        let (n, m, instr) = parse_step_line("STEP 3/13: RUN chmod +x /tmp/install.sh").unwrap();
        assert_eq!((n, m), (3, 13));
        assert_eq!(instr, "RUN chmod +x /tmp/install.sh");
    }

    #[test]
    fn parse_buildkit_step_line() {
        let (n, m, instr) = parse_step_line("#5 [2/4] RUN apt-get update").unwrap();
        assert_eq!((n, m), (2, 4));
        assert_eq!(instr, "RUN apt-get update");

        let (n, m, instr) = parse_step_line("#9 [builder 3/6] COPY . .").unwrap();
        assert_eq!((n, m), (3, 6));
        assert_eq!(instr, "COPY . .");
    }

    #[test]
    fn parse_step_line_not_a_step() {
        assert!(parse_step_line("---> abc123def").is_none());
        assert!(parse_step_line("#5 DONE 0.3s").is_none());
        assert!(parse_step_line("#1 [internal] load build definition").is_none());
        assert!(parse_step_line("").is_none());
    }

    #[test]
    fn build_noise() {
        assert!(is_build_noise("---> abc123def"));
        assert!(is_build_noise("COMMIT app-abc123"));
        assert!(is_build_noise("#5 DONE 0.3s"));
        assert!(!is_build_noise("#5 0.512 Get:1 http://deb.debian.org"));
        assert!(!is_build_noise("downloading rustup-init"));
    }

    #[test]
    fn shorten_respects_char_boundaries() {
        let line = "é".repeat(80);
        let short = shorten(&line, 60);
        assert_eq!(short.chars().count(), 60);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn pipeline_progress_non_interactive() {
        let ctx = UiContext::non_interactive();
        let progress = PipelineProgress::new(&ctx);
        progress.begin("web", "Building");
        progress.line("#5 [1/2] FROM nginx".to_string());
        progress.line("#5 DONE 0.1s".to_string());
        progress.end();
        progress.line("after end".to_string());
        progress.finish();
    }
}
