//! Terminal UI
//!
//! Uses `cliclack` for interactive prompts with automatic fallback to
//! plain output in CI/non-interactive environments. The resolvers reach
//! the terminal only through the [`Prompter`](crate::resolve::Prompter)
//! implementations in [`prompter`].
//!
//! # Example
//!
//! ```rust,ignore
//! use lzc_dtl::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect().with_non_interactive(args.non_interactive);
//!
//! ui::intro(&ctx, "lzc-dtl");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Packaging...");
//! // ... do work ...
//! spinner.stop("Package written");
//!
//! ui::outro_success(&ctx, "Done");
//! ```

mod context;
mod output;
mod progress;
pub mod prompter;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{intro, key_value, note, outro_success, step_info, step_ok, step_ok_detail, step_warn};
pub use progress::{ImageProgressBar, PipelineProgress, TaskSpinner};
pub use prompter::{InteractivePrompter, NonInteractivePrompter};
pub use prompts::confirm;
pub use theme::{init_theme, DtlTheme};
